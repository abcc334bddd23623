use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};
use utoipa::ToSchema;

/// Action tags written to `audit_logs.action`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum AuditAction {
    StudentLookup,
    AttendanceUpload,
    MarksUpload,
    DataExport,
}

/// A stored audit entry. Rows are only ever inserted.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: u64,
    pub user_id: u64,
    #[schema(example = "student_lookup")]
    pub action: String,
    #[schema(example = "student")]
    pub entity_type: Option<String>,
    pub entity_id: Option<u64>,
    #[schema(value_type = Object)]
    pub details: sqlx::types::Json<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewAuditLog {
    pub user_id: u64,
    pub action: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<u64>,
    pub details: serde_json::Value,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}
