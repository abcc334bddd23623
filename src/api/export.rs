use actix_web::{HttpResponse, Responder, http::header, web};
use chrono::Local;
use serde_json::json;

use crate::{
    auth::context::RequestContext,
    error::AppResult,
    model::audit_log::AuditAction,
    service::{
        audit::{self, AuditEvent},
        export::{self, ExportOptions},
    },
    store::MySqlStore,
};

/// Packs the selected data kinds into a ZIP of XLSX workbooks.
#[utoipa::path(
    post,
    path = "/api/export",
    request_body = ExportOptions,
    responses(
        (status = 200, description = "ZIP archive", content_type = "application/zip", body = Vec<u8>),
        (status = 400, description = "No data type selected"),
        (status = 403, description = "Filter outside the requester's scope")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Export"
)]
pub async fn export_data(
    ctx: RequestContext,
    store: web::Data<MySqlStore>,
    payload: web::Json<ExportOptions>,
) -> AppResult<impl Responder> {
    let options = payload.into_inner();
    let today = Local::now().date_naive();

    let archive = export::export(store.get_ref(), &ctx, &options, today).await?;

    audit::record(
        store.get_ref(),
        &ctx,
        AuditEvent::new(
            AuditAction::DataExport,
            json!({
                "dataTypes": options.data_types,
                "scope": archive.scope,
                "dateRange": options.date_range,
                "rowCounts": archive.row_counts,
            }),
        ),
    )
    .await;

    let filename = format!("campus-export-{}.zip", today.format("%Y-%m-%d"));

    Ok(HttpResponse::Ok()
        .content_type("application/zip")
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        ))
        .body(archive.bytes))
}
