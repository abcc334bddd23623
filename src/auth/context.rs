use crate::{
    auth::jwt::verify_token,
    config::Config,
    model::role::Role,
    models::{Claims, TokenType},
};
use actix_web::{
    FromRequest, HttpMessage, HttpRequest, dev::Payload, error::ErrorUnauthorized, web::Data,
};
use futures::future::{Ready, ready};

/// The authenticated requester, passed explicitly into every policy and
/// aggregation call.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestContext {
    pub actor_id: u64,
    pub username: String,
    pub role: Role,
    pub college_id: Option<u64>,
    pub department_id: Option<u64>,

    /// Request metadata recorded with audit entries.
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestContext {
    pub fn from_claims(claims: Claims, req: &HttpRequest) -> Self {
        Self {
            actor_id: claims.user_id,
            username: claims.sub,
            role: claims.role,
            college_id: claims.college_id,
            department_id: claims.department_id,
            ip_address: req
                .connection_info()
                .realip_remote_addr()
                .map(str::to_string),
            user_agent: req
                .headers()
                .get("User-Agent")
                .and_then(|h| h.to_str().ok())
                .map(str::to_string),
        }
    }
}

impl FromRequest for RequestContext {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // Already resolved by the auth middleware on protected scopes.
        if let Some(ctx) = req.extensions().get::<RequestContext>() {
            return ready(Ok(ctx.clone()));
        }

        let token = match req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
        {
            Some(t) => t,
            None => return ready(Err(ErrorUnauthorized("Missing token"))),
        };

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => {
                return ready(Err(
                    actix_web::error::ErrorInternalServerError("Config missing"),
                ))
            }
        };

        let claims = match verify_token(token, &config.jwt_secret) {
            Ok(c) if c.token_type == TokenType::Access => c,
            _ => return ready(Err(ErrorUnauthorized("Invalid token"))),
        };

        ready(Ok(RequestContext::from_claims(claims, req)))
    }
}
