// handlers/public/user.rs - user bootstrap and login

use axum::{extract::State, Extension};

use crate::app::AppState;
use crate::middleware::{ApiJson, ApiResponse, ApiResult, AuthUser};
use crate::models::{CreateUserRequest, LoginRequest};
use crate::services::user_service::Session;

/// POST /api/user/createUser
///
/// Open while no user exists (first super admin bootstrap), otherwise
/// requires a super admin token.
pub async fn create_user(
    State(state): State<AppState>,
    caller: Option<Extension<AuthUser>>,
    ApiJson(body): ApiJson<CreateUserRequest>,
) -> ApiResult<Session> {
    let identity = caller.as_ref().map(|Extension(user)| &user.identity);
    let session = state.users.create_user(identity, body).await?;
    Ok(ApiResponse::created(session))
}

/// POST /api/user/login
pub async fn login(State(state): State<AppState>, ApiJson(body): ApiJson<LoginRequest>) -> ApiResult<Session> {
    Ok(ApiResponse::success(state.users.login(body).await?))
}
