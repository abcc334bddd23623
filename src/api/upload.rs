use actix_multipart::{Field, Multipart};
use actix_web::{HttpRequest, HttpResponse, Responder, http::header, web};
use futures::{Stream, TryStreamExt};
use serde_json::json;

use crate::{
    auth::context::RequestContext,
    config::Config,
    error::{AppError, AppResult},
    model::audit_log::AuditAction,
    service::{
        audit::{self, AuditEvent},
        export,
        import::{self, ImportSummary},
    },
    store::MySqlStore,
    utils::sheet::{SheetFormat, SheetRow},
};

const FILE_FIELD: &str = "file";

fn content_type(req: &HttpRequest) -> &str {
    req.headers()
        .get("Content-Type")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("application/json")
}

async fn read_limited<S, E>(mut stream: S, limit: usize) -> AppResult<Vec<u8>>
where
    S: Stream<Item = Result<web::Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    let mut body = Vec::new();
    while let Some(chunk) = stream
        .try_next()
        .await
        .map_err(|e| AppError::validation(format!("Failed to read upload: {e}")))?
    {
        if body.len() + chunk.len() > limit {
            return Err(AppError::validation(format!(
                "Upload exceeds the {limit} byte limit"
            )));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

// Browsers label .csv files as application/vnd.ms-excel, so the extension wins.
fn field_format(field: &Field) -> Option<SheetFormat> {
    field
        .content_disposition()
        .get_filename()
        .and_then(SheetFormat::from_filename)
        .or_else(|| {
            field
                .content_type()
                .and_then(|mime| SheetFormat::from_content_type(mime.essence_str()))
        })
}

/// Pulls the `file` part out of a multipart form; other parts are skipped.
async fn read_form(
    req: &HttpRequest,
    payload: web::Payload,
    limit: usize,
) -> AppResult<(SheetFormat, Vec<u8>)> {
    let bad_form = |e: actix_multipart::MultipartError| {
        AppError::validation(format!("Invalid multipart upload: {e}"))
    };

    let mut form = Multipart::new(req.headers(), payload);
    while let Some(mut field) = form.try_next().await.map_err(bad_form)? {
        if field.content_disposition().get_name() != Some(FILE_FIELD) {
            while field.try_next().await.map_err(bad_form)?.is_some() {}
            continue;
        }
        let format = field_format(&field).ok_or_else(|| {
            AppError::validation("File must be .xlsx, .xls, .ods, .csv or .json")
        })?;
        let body = read_limited(field, limit).await?;
        return Ok((format, body));
    }

    Err(AppError::validation("No file uploaded"))
}

async fn read_sheet(
    req: &HttpRequest,
    payload: web::Payload,
    config: &Config,
) -> AppResult<Vec<SheetRow>> {
    let limit = config.upload_limit_bytes;
    let (format, body) = if content_type(req).starts_with("multipart/form-data") {
        read_form(req, payload, limit).await?
    } else {
        let format = SheetFormat::from_content_type(content_type(req)).ok_or_else(|| {
            AppError::validation(
                "Upload must be multipart/form-data, text/csv, application/json or a spreadsheet",
            )
        })?;
        (format, read_limited(payload, limit).await?)
    };

    format.parse(&body).map_err(|e| {
        tracing::info!(error = %e, "Rejected upload body");
        AppError::validation(format!("Invalid file format: {e:#}"))
    })
}

fn audit_details(summary: &ImportSummary) -> serde_json::Value {
    json!({
        "recordsProcessed": summary.records_processed,
        "recordsCreated": summary.records_created,
        "errors": summary.errors.len(),
    })
}

/* =========================
Attendance upload
========================= */
#[utoipa::path(
    post,
    path = "/api/upload/attendance",
    request_body(
        content = String,
        description = "Sheet with admissionNumber or facultyNumber, date, isPresent and optional remarks. \
            Sent as a multipart `file` part (.xlsx, .xls, .ods, .csv, .json) or as a raw CSV, JSON or workbook body.",
        content_type = "multipart/form-data"
    ),
    responses(
        (status = 200, description = "Import finished; per-row problems are listed", body = Object, example = json!({
            "message": "Attendance data uploaded",
            "summary": {
                "recordsProcessed": 3,
                "recordsCreated": 2,
                "errors": [{"row": 2, "message": "Row 2: Student not found with admission number 21X"}]
            }
        })),
        (status = 400, description = "Body is not a readable sheet or exceeds the upload limit"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Upload"
)]
pub async fn attendance(
    ctx: RequestContext,
    store: web::Data<MySqlStore>,
    config: web::Data<Config>,
    req: HttpRequest,
    payload: web::Payload,
) -> AppResult<impl Responder> {
    let rows = read_sheet(&req, payload, &config).await?;

    let summary = import::import_attendance(store.get_ref(), &ctx, &rows).await?;

    audit::record(
        store.get_ref(),
        &ctx,
        AuditEvent::new(AuditAction::AttendanceUpload, audit_details(&summary))
            .entity("attendance", None),
    )
    .await;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Attendance data uploaded",
        "summary": summary,
    })))
}

/* =========================
Marks upload
========================= */
#[utoipa::path(
    post,
    path = "/api/upload/marks",
    request_body(
        content = String,
        description = "Sheet with admissionNumber, subject, semester, marksObtained, totalMarks and optional grade. \
            Sent as a multipart `file` part or as a raw body, like the attendance upload.",
        content_type = "multipart/form-data"
    ),
    responses(
        (status = 200, description = "Import finished; per-row problems are listed", body = Object, example = json!({
            "message": "Marks data uploaded",
            "summary": {"recordsProcessed": 1, "recordsCreated": 1, "errors": []}
        })),
        (status = 400, description = "Body is not a readable sheet or exceeds the upload limit"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Upload"
)]
pub async fn marks(
    ctx: RequestContext,
    store: web::Data<MySqlStore>,
    config: web::Data<Config>,
    req: HttpRequest,
    payload: web::Payload,
) -> AppResult<impl Responder> {
    let rows = read_sheet(&req, payload, &config).await?;

    let summary = import::import_marks(store.get_ref(), &ctx, &rows).await?;

    audit::record(
        store.get_ref(),
        &ctx,
        AuditEvent::new(AuditAction::MarksUpload, audit_details(&summary)).entity("marks", None),
    )
    .await;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Marks data uploaded",
        "summary": summary,
    })))
}

/* =========================
Upload templates
========================= */
#[utoipa::path(
    get,
    path = "/api/upload/templates",
    responses(
        (status = 200, description = "ZIP with attendance and marks template workbooks and a README", content_type = "application/zip", body = Vec<u8>),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Upload"
)]
pub async fn templates(_ctx: RequestContext) -> AppResult<impl Responder> {
    let bytes = export::templates()?;

    Ok(HttpResponse::Ok()
        .content_type("application/zip")
        .insert_header((
            header::CONTENT_DISPOSITION,
            "attachment; filename=\"upload-templates.zip\"",
        ))
        .body(bytes))
}
