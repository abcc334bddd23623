use crate::{
    auth::{
        context::RequestContext,
        jwt::{TokenSubject, generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    error::{AppError, AppResult},
    model::role::Role,
    models::{Claims, LoginReqDto, RegisterReq, TokenType, UserSql},
    policy,
};
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};
use utoipa::ToSchema;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    access_token: String,
    refresh_token: String,
}

fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

fn token_error(e: jsonwebtoken::errors::Error) -> AppError {
    AppError::Internal(anyhow::Error::new(e).context("failed to sign token"))
}

/// Affiliation a new account is stored with. HODs take their college from
/// the department row.
async fn affiliation_for(
    user: &RegisterReq,
    pool: &MySqlPool,
) -> AppResult<(Option<u64>, Option<u64>)> {
    match user.role {
        Role::Chairman => Ok((None, None)),
        Role::Staff => {
            let college_id = user
                .college_id
                .ok_or_else(|| AppError::validation("Staff accounts need a college"))?;
            let found = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM colleges WHERE id = ? AND is_active = TRUE",
            )
            .bind(college_id)
            .fetch_one(pool)
            .await?;
            if found == 0 {
                return Err(AppError::not_found("College not found"));
            }
            Ok((Some(college_id), None))
        }
        Role::Hod => {
            let department_id = user
                .department_id
                .ok_or_else(|| AppError::validation("HOD accounts need a department"))?;
            let college_id = sqlx::query_scalar::<_, u64>(
                "SELECT college_id FROM departments WHERE id = ? AND is_active = TRUE",
            )
            .bind(department_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::not_found("Department not found"))?;

            if user.college_id.is_some_and(|c| c != college_id) {
                return Err(AppError::validation(
                    "Department does not belong to the given college",
                ));
            }
            Ok((Some(college_id), Some(department_id)))
        }
    }
}

/// User registration handler.
///
/// Needs a chairman's access token, except for the very first account,
/// which must itself be a chairman.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterReq,
    responses(
        (status = 201, description = "User registered", body = Object, example = json!({
            "message": "User registered successfully"
        })),
        (status = 400, description = "Missing or inconsistent fields"),
        (status = 403, description = "Only a chairman may register users"),
        (status = 409, description = "Username already exists")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_register", skip_all, fields(username = %user.username, role = %user.role))]
pub async fn register(
    ctx: Option<RequestContext>,
    user: web::Json<RegisterReq>,
    pool: web::Data<MySqlPool>,
) -> AppResult<impl Responder> {
    let username = user.username.trim().to_lowercase();
    if username.is_empty() || user.password.is_empty() {
        return Err(AppError::validation("Username and password must not be empty"));
    }

    match &ctx {
        Some(ctx) => policy::require_role(ctx, &[Role::Chairman])?,
        None => {
            let users = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
                .fetch_one(pool.get_ref())
                .await?;
            if users > 0 {
                return Err(AppError::Unauthorized("Missing token".into()));
            }
            if user.role != Role::Chairman {
                return Err(AppError::validation("The first account must be a chairman"));
            }
            info!("Bootstrapping first chairman account");
        }
    }

    let (college_id, department_id) = affiliation_for(&user, pool.get_ref()).await?;

    let hashed = hash_password(&user.password)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to hash password: {e}")))?;

    let result = sqlx::query(
        r#"
        INSERT INTO users (username, password, role, first_name, last_name, email, college_id, department_id)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&username)
    .bind(&hashed)
    .bind(user.role.as_ref())
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.email)
    .bind(college_id)
    .bind(department_id)
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(done) => {
            info!(user_id = done.last_insert_id(), "User registered");
            Ok(HttpResponse::Created().json(json!({
                "message": "User registered successfully"
            })))
        }
        Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23000") => {
            Ok(HttpResponse::Conflict().json(json!({
                "message": "Username already exists"
            })))
        }
        Err(e) => Err(e.into()),
    }
}

async fn store_refresh_token(pool: &MySqlPool, claims: &Claims) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(claims.user_id)
    .bind(&claims.jti)
    .bind(claims.exp as i64)
    .execute(pool)
    .await
    .map(|_| ())
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Token pair issued", body = LoginResponse),
        (status = 400, description = "Username or password missing"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(username = %user.username)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> AppResult<impl Responder> {
    info!("Login request received");

    // 1. Basic validation
    if user.username.trim().is_empty() || user.password.is_empty() {
        info!("Validation failed: empty username or password");
        return Err(AppError::validation("Username or password required"));
    }

    // 2. Fetch user
    debug!("Fetching user from database");
    let db_user = sqlx::query_as::<_, UserSql>(
        r#"
        SELECT id, username, password, role, college_id, department_id, is_active
        FROM users
        WHERE username = ?
        "#,
    )
    .bind(user.username.trim().to_lowercase())
    .fetch_optional(pool.get_ref())
    .await?;

    let db_user = match db_user {
        Some(u) if u.is_active => u,
        Some(_) => {
            info!("Invalid credentials: account disabled");
            return Err(AppError::Unauthorized("Invalid credentials".into()));
        }
        None => {
            info!("Invalid credentials: user not found");
            return Err(AppError::Unauthorized("Invalid credentials".into()));
        }
    };

    // 3. Verify password
    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }

    let role = Role::from_name(&db_user.role).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!("user {} has unknown role {:?}", db_user.id, db_user.role))
    })?;

    let subject = TokenSubject {
        user_id: db_user.id,
        username: db_user.username.clone(),
        role,
        college_id: db_user.college_id,
        department_id: db_user.department_id,
    };

    // 4. Issue tokens
    let access_token =
        generate_access_token(&subject, &config.jwt_secret, config.access_token_ttl)
            .map_err(token_error)?;
    let (refresh_token, refresh_claims) =
        generate_refresh_token(&subject, &config.jwt_secret, config.refresh_token_ttl)
            .map_err(token_error)?;

    // 5. Store refresh token
    debug!(user_id = db_user.id, jti = %refresh_claims.jti, "Storing refresh token");
    store_refresh_token(pool.get_ref(), &refresh_claims).await?;

    // 6. Update last_login_at (non-fatal)
    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to update last_login_at");
    }

    info!(user_id = db_user.id, role = %role, "Login successful");

    Ok(HttpResponse::Ok().json(LoginResponse {
        access_token,
        refresh_token,
    }))
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "Rotated token pair", body = LoginResponse),
        (status = 401, description = "Refresh token missing, invalid or revoked")
    ),
    tag = "Auth",
    security(("bearer_auth" = []))
)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> AppResult<impl Responder> {
    let unauthorized = || AppError::Unauthorized("Invalid refresh token".into());

    let token = bearer(&req).ok_or_else(|| AppError::Unauthorized("No token".into()))?;

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) if c.token_type == TokenType::Refresh => c,
        _ => return Err(unauthorized()),
    };

    // Revoke the presented token; only a live one may be rotated.
    let revoked = sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET revoked = TRUE
        WHERE jti = ? AND revoked = FALSE AND expires_at > NOW()
        "#,
    )
    .bind(&claims.jti)
    .execute(pool.get_ref())
    .await?;

    if revoked.rows_affected() == 0 {
        info!(user_id = claims.user_id, "Refresh token reused or unknown");
        return Err(unauthorized());
    }

    let subject = TokenSubject::from(&claims);

    let (new_refresh_token, new_claims) =
        generate_refresh_token(&subject, &config.jwt_secret, config.refresh_token_ttl)
            .map_err(token_error)?;
    store_refresh_token(pool.get_ref(), &new_claims).await?;

    let access_token =
        generate_access_token(&subject, &config.jwt_secret, config.access_token_ttl)
            .map_err(token_error)?;

    debug!(user_id = claims.user_id, "Refresh token rotated");

    Ok(HttpResponse::Ok().json(LoginResponse {
        access_token,
        refresh_token: new_refresh_token,
    }))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Refresh token revoked (idempotent)")),
    tag = "Auth",
    security(("bearer_auth" = []))
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    let claims = match bearer(&req).map(|t| verify_token(t, &config.jwt_secret)) {
        Some(Ok(c)) if c.token_type == TokenType::Refresh => c,
        _ => return HttpResponse::NoContent().finish(),
    };

    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to revoke refresh token");
    }

    HttpResponse::NoContent().finish()
}
