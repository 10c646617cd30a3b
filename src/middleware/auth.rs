use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::app::AppState;
use crate::auth::Identity;
use crate::error::ApiError;

/// Verified caller context injected into request extensions
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub identity: Identity,
    /// The long token the identity was decoded from.
    pub token: String,
}

/// Rejects the request unless it carries a valid long token.
pub async fn long_token_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token_from_headers(&headers).ok_or(ApiError::Unauthorized)?;
    let auth_user = verify(&state, token)?;
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

/// Like [`long_token_middleware`], but a request without any token passes
/// through anonymously. A token that is present must still verify.
pub async fn optional_long_token_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(token) = extract_token_from_headers(&headers) {
        let auth_user = verify(&state, token)?;
        request.extensions_mut().insert(auth_user);
    }

    Ok(next.run(request).await)
}

fn verify(state: &AppState, token: &str) -> Result<AuthUser, ApiError> {
    match state.tokens.verify_long_token(token) {
        Some(identity) => Ok(AuthUser {
            identity,
            token: token.to_string(),
        }),
        None => {
            tracing::debug!("Rejected long token");
            Err(ApiError::Unauthorized)
        }
    }
}

/// Long token from the `token` header, falling back to
/// `Authorization: Bearer <token>`.
pub fn extract_token_from_headers(headers: &HeaderMap) -> Option<&str> {
    if let Some(token) = headers.get("token").and_then(|v| v.to_str().ok()) {
        let token = token.trim();
        if !token.is_empty() {
            return Some(token);
        }
    }

    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
