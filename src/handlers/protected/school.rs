use axum::{
    extract::{Path, State},
    Extension,
};

use crate::app::AppState;
use crate::middleware::{ApiJson, ApiResponse, ApiResult, AuthUser};
use crate::models::{School, SchoolRequest};

/// POST /api/school/create
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiJson(body): ApiJson<SchoolRequest>,
) -> ApiResult<School> {
    Ok(ApiResponse::created(state.schools.create(&auth.identity, body).await?))
}

/// GET /api/school/getAll
pub async fn get_all(State(state): State<AppState>, Extension(auth): Extension<AuthUser>) -> ApiResult<Vec<School>> {
    Ok(ApiResponse::success(state.schools.list(&auth.identity).await?))
}

/// GET /api/school/getByID/:id
pub async fn get_by_id(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<School> {
    Ok(ApiResponse::success(state.schools.get(&auth.identity, &id).await?))
}

/// PUT /api/school/update/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<SchoolRequest>,
) -> ApiResult<School> {
    Ok(ApiResponse::success(state.schools.update(&auth.identity, &id, body).await?))
}

/// DELETE /api/school/delete/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<School> {
    Ok(ApiResponse::success(state.schools.delete(&auth.identity, &id).await?))
}
