use crate::{
    api::{audit, college, dashboard, export, student, upload},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

// Helper to build per-route limiter
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);

    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_default();
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config) {
    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let register_limiter = Arc::new(build_limiter(config.rate_register_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(register_limiter)
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter)
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter)
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            // /dashboard/kpis
            .service(web::resource("/dashboard/kpis").route(web::get().to(dashboard::kpis)))
            // /colleges
            .service(
                web::scope("/colleges")
                    .service(web::resource("").route(web::get().to(college::colleges)))
                    .service(
                        web::resource("/{college_id}/kpis")
                            .route(web::get().to(dashboard::college_kpis)),
                    ),
            )
            // /departments
            .service(web::resource("/departments").route(web::get().to(college::departments)))
            // /students/{admission_number}
            .service(
                web::resource("/students/{admission_number}")
                    .route(web::get().to(student::profile)),
            )
            // /upload/attendance, /upload/marks, /upload/templates
            .service(
                web::scope("/upload")
                    .service(web::resource("/templates").route(web::get().to(upload::templates)))
                    .service(web::resource("/attendance").route(web::post().to(upload::attendance)))
                    .service(web::resource("/marks").route(web::post().to(upload::marks))),
            )
            .service(web::resource("/audit-logs").route(web::get().to(audit::list)))
            .service(web::resource("/export").route(web::post().to(export::export_data))),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns new access_token + rotated refresh_token
