use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(
    example = json!({
        "id": 1,
        "name": "Bharat Institute of Engineering and Technology",
        "shortName": "BIET",
        "address": null,
        "principalName": null,
        "isActive": true,
        "createdAt": "2026-01-01T00:00:00"
    })
)]
pub struct College {
    pub id: u64,
    pub name: String,
    pub short_name: String,
    pub address: Option<String>,
    pub principal_name: Option<String>,
    pub is_active: bool,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}
