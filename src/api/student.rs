use actix_web::{HttpResponse, Responder, web};
use serde_json::json;

use crate::{
    auth::context::RequestContext,
    error::AppResult,
    model::audit_log::AuditAction,
    service::{
        aggregation::{self, StudentProfile},
        audit::{self, AuditEvent},
    },
    store::MySqlStore,
};

/// Student profile with attendance rate, CGPA and recent records.
///
/// Every successful lookup is written to the audit log.
#[utoipa::path(
    get,
    path = "/api/students/{admission_number}",
    params(
        ("admission_number" = String, Path, description = "Admission number", example = "21BIET0417")
    ),
    responses(
        (status = 200, description = "Student profile", body = StudentProfile),
        (status = 403, description = "Student outside the requester's scope", body = Object, example = json!({
            "message": "Access denied to this record"
        })),
        (status = 404, description = "Unknown admission number", body = Object, example = json!({
            "message": "Student not found"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Student"
)]
pub async fn profile(
    ctx: RequestContext,
    store: web::Data<MySqlStore>,
    path: web::Path<String>,
) -> AppResult<impl Responder> {
    let admission_number = path.into_inner();

    let profile =
        aggregation::scoped_student_profile(store.get_ref(), &ctx, admission_number.trim()).await?;

    audit::record(
        store.get_ref(),
        &ctx,
        AuditEvent::new(
            AuditAction::StudentLookup,
            json!({
                "admissionNumber": profile.student.admission_number,
                "studentName": profile.student.full_name(),
            }),
        )
        .entity("student", Some(profile.student.id)),
    )
    .await;

    Ok(HttpResponse::Ok().json(profile))
}
