use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    auth::context::RequestContext,
    error::AppResult,
    model::{audit_log::AuditLogEntry, role::Role},
    policy,
    service::audit,
    store::MySqlStore,
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuditLogQuery {
    /// Only entries written by this user.
    #[serde(alias = "userId")]
    pub user_id: Option<u64>,
    /// Defaults to 50, at most 500.
    #[param(example = 50)]
    pub limit: Option<u32>,
}

/// Newest-first audit trail. Chairman only.
#[utoipa::path(
    get,
    path = "/api/audit-logs",
    params(AuditLogQuery),
    responses(
        (status = 200, description = "Audit entries", body = [AuditLogEntry]),
        (status = 403, description = "Insufficient permissions")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Audit"
)]
pub async fn list(
    ctx: RequestContext,
    store: web::Data<MySqlStore>,
    query: web::Query<AuditLogQuery>,
) -> AppResult<impl Responder> {
    policy::require_role(&ctx, &[Role::Chairman])?;

    let logs = audit::recent(store.get_ref(), query.user_id, query.limit).await?;

    Ok(HttpResponse::Ok().json(logs))
}
