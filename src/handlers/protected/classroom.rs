use axum::{
    extract::{Path, State},
    Extension,
};

use crate::app::AppState;
use crate::middleware::{ApiJson, ApiResponse, ApiResult, AuthUser};
use crate::models::{Classroom, ClassroomChanges, CreateClassroomRequest, Student};

/// POST /api/classroom/create
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiJson(body): ApiJson<CreateClassroomRequest>,
) -> ApiResult<Classroom> {
    Ok(ApiResponse::created(state.classrooms.create(&auth.identity, body).await?))
}

/// GET /api/classroom/getAll
pub async fn get_all(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Vec<Classroom>> {
    Ok(ApiResponse::success(state.classrooms.list(&auth.identity).await?))
}

/// GET /api/classroom/getByID/:id
pub async fn get_by_id(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Classroom> {
    Ok(ApiResponse::success(state.classrooms.get(&auth.identity, &id).await?))
}

/// GET /api/classroom/getStudents/:id
pub async fn get_students(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Vec<Student>> {
    Ok(ApiResponse::success(state.classrooms.students(&auth.identity, &id).await?))
}

/// PUT /api/classroom/update/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<ClassroomChanges>,
) -> ApiResult<Classroom> {
    Ok(ApiResponse::success(state.classrooms.update(&auth.identity, &id, body).await?))
}

/// DELETE /api/classroom/delete/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Classroom> {
    Ok(ApiResponse::success(state.classrooms.delete(&auth.identity, &id).await?))
}
