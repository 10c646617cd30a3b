// handlers/protected/token.rs - POST /api/token/createShortToken

use axum::{extract::State, http::HeaderMap, Extension};
use serde::Serialize;

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::types::{Entity, Operation};

#[derive(Debug, Serialize)]
pub struct ShortTokenResponse {
    #[serde(rename = "shortToken")]
    pub short_token: String,
}

/// Derives a device token from the caller's long token. The device is
/// identified by its `User-Agent`.
pub async fn create_short_token(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    headers: HeaderMap,
) -> ApiResult<ShortTokenResponse> {
    state.authz.authorize(&auth.identity, Entity::Token, Operation::Create)?;

    let device = headers
        .get(axum::http::header::USER_AGENT)
        .map(|v| v.as_bytes())
        .unwrap_or_default();
    let short_token = state.tokens.create_short_token(&auth.token, device)?;
    Ok(ApiResponse::success(ShortTokenResponse { short_token }))
}
