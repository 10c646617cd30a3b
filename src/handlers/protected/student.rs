use axum::{
    extract::{Path, Query, State},
    Extension,
};
use serde::Deserialize;

use crate::app::AppState;
use crate::middleware::{ApiJson, ApiResponse, ApiResult, AuthUser};
use crate::models::{CreateStudentRequest, Student, UpdateStudentRequest};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(rename = "classroomID", alias = "classroomId")]
    pub classroom_id: Option<String>,
}

/// POST /api/student/create
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiJson(body): ApiJson<CreateStudentRequest>,
) -> ApiResult<Student> {
    Ok(ApiResponse::created(state.students.create(&auth.identity, body).await?))
}

/// GET /api/student/getAll?classroomID=
pub async fn get_all(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Student>> {
    let classroom_id = query.classroom_id.as_deref().filter(|id| !id.is_empty());
    Ok(ApiResponse::success(state.students.list(&auth.identity, classroom_id).await?))
}

/// GET /api/student/getByID/:id
pub async fn get_by_id(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Student> {
    Ok(ApiResponse::success(state.students.get(&auth.identity, &id).await?))
}

/// PUT /api/student/update/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateStudentRequest>,
) -> ApiResult<Student> {
    Ok(ApiResponse::success(state.students.update(&auth.identity, &id, body).await?))
}

/// DELETE /api/student/delete/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Student> {
    Ok(ApiResponse::success(state.students.delete(&auth.identity, &id).await?))
}
