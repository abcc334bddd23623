use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Faculty {
    pub id: u64,
    #[schema(example = "FAC-0031")]
    pub faculty_number: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub college_id: u64,
    pub department_id: u64,
    #[schema(example = "Associate Professor")]
    pub designation: Option<String>,
    #[schema(example = 2015)]
    pub joined_year: u16,
    pub is_active: bool,
}
