use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(
    example = json!({
        "id": 17,
        "admissionNumber": "21BIET0417",
        "firstName": "Asha",
        "lastName": "Reddy",
        "email": "asha@example.edu",
        "phone": null,
        "collegeId": 1,
        "departmentId": 4,
        "year": 3,
        "semester": 5,
        "gender": "Female",
        "isActive": true
    })
)]
pub struct Student {
    pub id: u64,
    pub admission_number: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub college_id: u64,
    pub department_id: u64,
    /// 1..=4
    pub year: u8,
    /// 1..=8
    pub semester: u8,
    pub gender: Option<String>,
    pub is_active: bool,
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
