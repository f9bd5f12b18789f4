//! Course and enrollment endpoints
//!
//! - GET /api/v1/courses - Published courses, filterable
//! - GET /api/v1/courses/mine - Courses of the caller's institution
//! - GET /api/v1/courses/{slug} - Course detail
//! - POST, PUT, DELETE /api/v1/courses[/{id}] - Institution management
//! - PUT /api/v1/courses/{id}/status - Publish or archive
//! - GET /api/v1/courses/{id}/enrollments - Learners of a course
//! - POST /api/v1/courses/{id}/enroll - Youth enrollment
//! - /api/v1/enrollments/... - The learner's own enrollments

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::PaginationQuery;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, OptionalUser};
use crate::models::{
    Course, CourseFilter, CourseInput, CourseStatus, Enrollment, EnrollmentWithCourse, PagedResult,
};

#[derive(Debug, Deserialize)]
pub struct CourseStatusRequest {
    pub status: CourseStatus,
}

#[derive(Debug, Deserialize)]
pub struct ProgressRequest {
    pub progress: i64,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/mine", get(list_mine))
        .route("/{slug}", get(get_by_slug).put(update).delete(delete))
        .route("/{id}/status", put(set_status))
        .route("/{id}/enrollments", get(list_enrollments))
        .route("/{id}/enroll", post(enroll))
}

pub fn enrollments_router() -> Router<AppState> {
    Router::new()
        .route("/mine", get(my_enrollments))
        .route("/{id}/progress", put(update_progress))
        .route("/{id}/drop", post(drop_enrollment))
}

async fn list(
    State(state): State<AppState>,
    Query(filter): Query<CourseFilter>,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<PagedResult<Course>>, ApiError> {
    Ok(Json(
        state
            .course_service
            .list_published(&filter, &page.into())
            .await?,
    ))
}

async fn list_mine(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Course>>, ApiError> {
    Ok(Json(state.course_service.list_mine(&user.0).await?))
}

async fn get_by_slug(
    State(state): State<AppState>,
    viewer: OptionalUser,
    Path(slug): Path<String>,
) -> Result<Json<Course>, ApiError> {
    Ok(Json(state.course_service.get_by_slug(viewer.user(), &slug).await?))
}

async fn create(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CourseInput>,
) -> Result<impl IntoResponse, ApiError> {
    let course = state.course_service.create(&user.0, body).await?;
    Ok((StatusCode::CREATED, Json(course)))
}

async fn update(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<CourseInput>,
) -> Result<Json<Course>, ApiError> {
    Ok(Json(state.course_service.update(&user.0, id, body).await?))
}

async fn set_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<CourseStatusRequest>,
) -> Result<Json<Course>, ApiError> {
    Ok(Json(
        state
            .course_service
            .set_status(&user.0, id, body.status)
            .await?,
    ))
}

async fn delete(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.course_service.delete(&user.0, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_enrollments(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Enrollment>>, ApiError> {
    Ok(Json(
        state
            .enrollment_service
            .list_for_course(&user.0, id)
            .await?,
    ))
}

async fn enroll(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let enrollment = state.enrollment_service.enroll(&user.0, id).await?;
    state.recommendation_service.invalidate(user.0.id);
    Ok((StatusCode::CREATED, Json(enrollment)))
}

async fn my_enrollments(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<EnrollmentWithCourse>>, ApiError> {
    Ok(Json(state.enrollment_service.list_mine(&user.0).await?))
}

async fn update_progress(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<ProgressRequest>,
) -> Result<Json<Enrollment>, ApiError> {
    Ok(Json(
        state
            .enrollment_service
            .update_progress(&user.0, id, body.progress)
            .await?,
    ))
}

async fn drop_enrollment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Enrollment>, ApiError> {
    let enrollment = state.enrollment_service.drop_enrollment(&user.0, id).await?;
    state.recommendation_service.invalidate(user.0.id);
    Ok(Json(enrollment))
}
