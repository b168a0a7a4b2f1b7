//! Admin token middleware

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};

use crate::{AppError, AppState};

/// Middleware: require `Authorization: Bearer <ADMIN_TOKEN>` when a token is
/// configured; open otherwise
pub async fn require_admin(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(expected) = state.config.admin_token.as_deref() else {
        return Ok(next.run(req).await);
    };

    let token = extract_bearer_token(&req)?;

    // Compare digests, never the raw tokens
    if hash_token(&token) != hash_token(expected) {
        tracing::warn!("Rejected admin request to {} with invalid token", req.uri().path());
        return Err(AppError::Unauthorized);
    }

    Ok(next.run(req).await)
}

/// Extract bearer token from Authorization header
fn extract_bearer_token(req: &Request) -> Result<String, AppError> {
    let auth_header = req
        .headers()
        .get(AUTHORIZATION)
        .ok_or(AppError::Unauthorized)?
        .to_str()
        .map_err(|_| AppError::Unauthorized)?;

    auth_header
        .strip_prefix("Bearer ")
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or(AppError::Unauthorized)
}

fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
