use actix_web::error::{ErrorForbidden, ErrorUnauthorized};
use actix_web::{Error, HttpRequest};

use super::jwt::validate_token;
use super::model::Claims;
use crate::db::AppState;
use crate::users::UserDirectory;

/// Extract token from Authorization header
fn extract_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|auth| {
            if auth.starts_with("Bearer ") {
                Some(auth[7..].to_string())
            } else {
                None
            }
        })
}

/// Validate token from HttpRequest and return claims
pub fn validate_request_token(req: &HttpRequest) -> Result<Claims, Error> {
    let token =
        extract_token(req).ok_or_else(|| ErrorUnauthorized("Missing authorization token"))?;

    let claims = validate_token(&token).map_err(|e| {
        log::warn!("Token validation failed: {:?}", e);
        ErrorUnauthorized("Invalid or expired token")
    })?;

    if claims.token_type != "access" {
        return Err(ErrorUnauthorized("Invalid token type"));
    }

    Ok(claims)
}

/// Validate the token and require the admin capability. The directory is
/// consulted on every request, so revoking a role takes effect at once.
pub async fn require_admin(req: &HttpRequest, state: &AppState) -> Result<Claims, Error> {
    let claims = validate_request_token(req)?;
    let is_admin = state.users.is_admin(&claims.sub).await.map_err(|e| {
        log::error!("Admin capability check failed for {}: {}", claims.sub, e);
        ErrorForbidden("Admin access required")
    })?;
    if !is_admin {
        return Err(ErrorForbidden("Admin access required"));
    }
    Ok(claims)
}

/// Validate the token and require that the caller is `owner_id` or an
/// admin. Guards per-user resources like purchase listings.
pub async fn require_owner_or_admin(
    req: &HttpRequest,
    state: &AppState,
    owner_id: &str,
) -> Result<Claims, Error> {
    let claims = validate_request_token(req)?;
    if claims.sub == owner_id {
        return Ok(claims);
    }
    let is_admin = state
        .users
        .is_admin(&claims.sub)
        .await
        .unwrap_or(false);
    if is_admin {
        return Ok(claims);
    }
    Err(ErrorForbidden("Not the resource owner"))
}
