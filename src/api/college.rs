use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    auth::context::RequestContext,
    error::AppResult,
    model::{college::College, department::Department},
    policy::{self, Scope},
    store::{MySqlStore, Store},
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DepartmentFilter {
    /// Limit the listing to one college.
    #[serde(alias = "collegeId")]
    pub college_id: Option<u64>,
}

/// Active colleges visible to the requester.
#[utoipa::path(
    get,
    path = "/api/colleges",
    responses(
        (status = 200, description = "Visible colleges", body = [College]),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "College"
)]
pub async fn colleges(
    ctx: RequestContext,
    store: web::Data<MySqlStore>,
) -> AppResult<impl Responder> {
    let scope = policy::reach_scope(&ctx)?;
    let colleges = store.active_colleges(&scope).await?;

    Ok(HttpResponse::Ok().json(colleges))
}

/// Active departments within the resolved scope.
#[utoipa::path(
    get,
    path = "/api/departments",
    params(DepartmentFilter),
    responses(
        (status = 200, description = "Visible departments", body = [Department]),
        (status = 403, description = "College outside the requester's scope")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "College"
)]
pub async fn departments(
    ctx: RequestContext,
    store: web::Data<MySqlStore>,
    query: web::Query<DepartmentFilter>,
) -> AppResult<impl Responder> {
    let requested = Scope {
        college_id: query.college_id,
        department_id: None,
    };
    let scope = policy::resolve_scope(&ctx, requested)?;
    let departments = store.active_departments(&scope).await?;

    Ok(HttpResponse::Ok().json(departments))
}
