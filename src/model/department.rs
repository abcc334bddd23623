use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    #[schema(example = 4)]
    pub id: u64,
    #[schema(example = 1)]
    pub college_id: u64,
    #[schema(example = "Computer Science and Engineering")]
    pub name: String,
    #[schema(example = "CSE")]
    pub short_name: String,
    /// User id of the head of department, if assigned.
    pub hod_id: Option<u64>,
    pub is_active: bool,
}
