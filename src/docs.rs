use crate::auth::handlers::LoginResponse;
use crate::model::{
    attendance::AttendanceRecord, audit_log::AuditLogEntry, college::College,
    department::Department, marks::MarksRecord, role::Role, student::Student,
};
use crate::models::{LoginReqDto, RegisterReq};
use crate::policy::Scope;
use crate::service::{
    aggregation::{AttendanceStats, DashboardKpis, StudentProfile},
    export::{ExportKind, ExportOptions},
    import::{ImportSummary, RowError},
};
use crate::store::DateRange;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Campus Dashboard API",
        version = "1.0.0",
        description = r#"
## Campus Dashboard

Academic dashboard for a group of colleges. Every read is confined to the
requester's scope:

- **Chairman**: all colleges
- **Staff**: one college
- **HOD**: one department

### Key Features
- **Dashboard KPIs**: today's attendance and the pass percentage
- **Student profile**: attendance rate, CGPA, credits and recent records
- **Bulk upload**: attendance and marks from XLSX, CSV or JSON sheets, with downloadable templates
- **Export**: XLSX workbooks packed into a ZIP archive
- **Audit log**: lookups, uploads and exports are recorded

### Security
All `/api` endpoints require a **JWT Bearer** access token from `/auth/login`.
"#,
    ),
    paths(
        crate::auth::handlers::register,
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,

        crate::api::dashboard::kpis,
        crate::api::dashboard::college_kpis,

        crate::api::college::colleges,
        crate::api::college::departments,

        crate::api::student::profile,

        crate::api::upload::attendance,
        crate::api::upload::marks,
        crate::api::upload::templates,

        crate::api::audit::list,

        crate::api::export::export_data
    ),
    components(
        schemas(
            RegisterReq,
            LoginReqDto,
            LoginResponse,
            Role,
            Scope,
            DateRange,
            College,
            Department,
            Student,
            AttendanceRecord,
            MarksRecord,
            AttendanceStats,
            DashboardKpis,
            StudentProfile,
            ImportSummary,
            RowError,
            AuditLogEntry,
            ExportKind,
            ExportOptions
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login, token rotation and user registration"),
        (name = "Dashboard", description = "Scoped KPI aggregation"),
        (name = "College", description = "Colleges and departments"),
        (name = "Student", description = "Student academic profile"),
        (name = "Upload", description = "Bulk attendance and marks import"),
        (name = "Audit", description = "Audit trail of sensitive actions"),
        (name = "Export", description = "Bulk data export"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
