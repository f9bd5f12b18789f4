//! Job posting and application endpoints
//!
//! - GET /api/v1/jobs - Open, unexpired jobs, filterable
//! - GET /api/v1/jobs/mine - Jobs of the caller's company
//! - GET /api/v1/jobs/{slug} - Job detail
//! - POST, PUT, DELETE /api/v1/jobs[/{id}] - Company management
//! - PUT /api/v1/jobs/{id}/status - Open, close or back to draft
//! - GET /api/v1/jobs/{id}/applications - Applicants, optional `?status=`
//! - POST /api/v1/jobs/{id}/apply - Youth application
//! - /api/v1/applications/... - Status changes and the applicant's list

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
    Application, ApplicationStatus, ApplicationWithJob, Job, JobFilter, JobInput, JobStatus,
    PagedResult,
};

#[derive(Debug, Deserialize)]
pub struct JobStatusRequest {
    pub status: JobStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApplyRequest {
    #[serde(default)]
    pub cover_letter: String,
    #[serde(default)]
    pub resume_asset_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ApplicationStatusRequest {
    pub status: ApplicationStatus,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApplicationsQuery {
    pub status: Option<ApplicationStatus>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/mine", get(list_mine))
        .route("/{slug}", get(get_by_slug).put(update).delete(delete))
        .route("/{id}/status", put(set_status))
        .route("/{id}/applications", get(list_applications))
        .route("/{id}/apply", post(apply))
}

pub fn applications_router() -> Router<AppState> {
    Router::new()
        .route("/mine", get(my_applications))
        .route("/{id}/status", put(update_application_status))
        .route("/{id}/withdraw", post(withdraw))
}

async fn list(
    State(state): State<AppState>,
    Query(filter): Query<JobFilter>,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<PagedResult<Job>>, ApiError> {
    Ok(Json(state.job_service.list_open(&filter, &page.into()).await?))
}

async fn list_mine(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Job>>, ApiError> {
    Ok(Json(state.job_service.list_mine(&user.0).await?))
}

async fn get_by_slug(
    State(state): State<AppState>,
    viewer: OptionalUser,
    Path(slug): Path<String>,
) -> Result<Json<Job>, ApiError> {
    Ok(Json(state.job_service.get_by_slug(viewer.user(), &slug).await?))
}

async fn create(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<JobInput>,
) -> Result<impl IntoResponse, ApiError> {
    let job = state.job_service.create(&user.0, body).await?;
    Ok((StatusCode::CREATED, Json(job)))
}

async fn update(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<JobInput>,
) -> Result<Json<Job>, ApiError> {
    Ok(Json(state.job_service.update(&user.0, id, body).await?))
}

async fn set_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<JobStatusRequest>,
) -> Result<Json<Job>, ApiError> {
    Ok(Json(state.job_service.set_status(&user.0, id, body.status).await?))
}

async fn delete(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.job_service.delete(&user.0, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_applications(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Query(query): Query<ApplicationsQuery>,
) -> Result<Json<Vec<Application>>, ApiError> {
    Ok(Json(
        state
            .application_service
            .list_for_job(&user.0, id, query.status)
            .await?,
    ))
}

async fn apply(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<ApplyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let application = state
        .application_service
        .apply(&user.0, id, &body.cover_letter, body.resume_asset_id)
        .await?;
    state.recommendation_service.invalidate(user.0.id);
    Ok((StatusCode::CREATED, Json(application)))
}

async fn my_applications(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<ApplicationWithJob>>, ApiError> {
    Ok(Json(state.application_service.list_mine(&user.0).await?))
}

async fn update_application_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<ApplicationStatusRequest>,
) -> Result<Json<Application>, ApiError> {
    Ok(Json(
        state
            .application_service
            .update_status(&user.0, id, body.status, body.note.as_deref())
            .await?,
    ))
}

async fn withdraw(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Application>, ApiError> {
    Ok(Json(state.application_service.withdraw(&user.0, id).await?))
}
