use actix_web::{HttpResponse, Responder, web};
use chrono::Local;

use crate::{
    auth::context::RequestContext,
    error::{AppError, AppResult},
    policy::{self, Scope},
    service::aggregation::{self, DashboardKpis},
    store::{MySqlStore, Store},
};

/* =========================
Dashboard KPIs
========================= */
/// Today's attendance counts and the overall pass percentage for the
/// requester's scope, optionally narrowed by college or department.
#[utoipa::path(
    get,
    path = "/api/dashboard/kpis",
    params(Scope),
    responses(
        (status = 200, description = "KPIs for the resolved scope", body = DashboardKpis),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Filter outside the requester's scope")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Dashboard"
)]
pub async fn kpis(
    ctx: RequestContext,
    store: web::Data<MySqlStore>,
    query: web::Query<Scope>,
) -> AppResult<impl Responder> {
    let scope = policy::resolve_scope(&ctx, query.into_inner())?;
    let today = Local::now().date_naive();

    let kpis = aggregation::dashboard_kpis(store.get_ref(), &scope, today).await?;

    Ok(HttpResponse::Ok().json(kpis))
}

/// KPIs for a single college.
#[utoipa::path(
    get,
    path = "/api/colleges/{college_id}/kpis",
    params(
        ("college_id" = u64, Path, description = "College to aggregate")
    ),
    responses(
        (status = 200, description = "KPIs for the college", body = DashboardKpis),
        (status = 403, description = "College outside the requester's scope"),
        (status = 404, description = "College not found", body = Object, example = json!({
            "message": "College not found"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Dashboard"
)]
pub async fn college_kpis(
    ctx: RequestContext,
    store: web::Data<MySqlStore>,
    path: web::Path<u64>,
) -> AppResult<impl Responder> {
    let college_id = path.into_inner();

    let scope = policy::resolve_scope(&ctx, Scope::college(college_id))?;

    store
        .college(college_id)
        .await?
        .filter(|c| c.is_active)
        .ok_or_else(|| AppError::not_found("College not found"))?;

    let today = Local::now().date_naive();
    let kpis = aggregation::dashboard_kpis(store.get_ref(), &scope, today).await?;

    Ok(HttpResponse::Ok().json(kpis))
}
