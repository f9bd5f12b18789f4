//! Admin API endpoints
//!
//! Every route here sits behind `require_admin`.
//!
//! - GET /api/v1/admin/analytics - Platform overview
//! - GET /api/v1/admin/users, PUT /api/v1/admin/users/{id}/status
//! - PUT /api/v1/admin/organizations/{id}/verify
//! - GET /api/v1/admin/startups, PUT /api/v1/admin/startups/{id}/review
//! - GET /api/v1/admin/reports, PUT /api/v1/admin/reports/{id}

use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::PaginationQuery;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::db::repositories::{ReportFilter, UserFilter};
use crate::models::{
    Organization, PagedResult, Report, ReportStatus, Startup, StartupFilter, StartupStatus, User,
    UserStatus,
};
use crate::services::AdminOverview;

#[derive(Debug, Deserialize)]
pub struct UserStatusRequest {
    pub status: UserStatus,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub verified: bool,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub approve: bool,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReportUpdateRequest {
    pub status: ReportStatus,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StartupStatusQuery {
    pub status: Option<StartupStatus>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/analytics", get(overview))
        .route("/users", get(list_users))
        .route("/users/{id}/status", put(set_user_status))
        .route("/organizations/{id}/verify", put(verify_organization))
        .route("/startups", get(list_startups))
        .route("/startups/{id}/review", put(review_startup))
        .route("/reports", get(list_reports))
        .route("/reports/{id}", put(update_report))
}

async fn overview(State(state): State<AppState>) -> Result<Json<AdminOverview>, ApiError> {
    Ok(Json(state.analytics_service.admin_overview().await?))
}

async fn list_users(
    State(state): State<AppState>,
    Query(filter): Query<UserFilter>,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<PagedResult<User>>, ApiError> {
    Ok(Json(state.user_service.list_users(&filter, &page.into()).await?))
}

/// Suspend or reactivate. Suspension signs the user out.
async fn set_user_status(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UserStatusRequest>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(
        state
            .user_service
            .set_status(&admin.0, id, body.status)
            .await?,
    ))
}

async fn verify_organization(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<VerifyRequest>,
) -> Result<Json<Organization>, ApiError> {
    Ok(Json(
        state
            .organization_service
            .set_verified(id, body.verified)
            .await?,
    ))
}

/// All startups, pending ones included
async fn list_startups(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    Query(query): Query<StartupStatusQuery>,
    Query(filter): Query<StartupFilter>,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<PagedResult<Startup>>, ApiError> {
    let filter = StartupFilter {
        status: query.status,
        ..filter
    };
    Ok(Json(
        state
            .startup_service
            .list(Some(&admin.0), filter, &page.into())
            .await?,
    ))
}

async fn review_startup(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<ReviewRequest>,
) -> Result<Json<Startup>, ApiError> {
    Ok(Json(
        state
            .startup_service
            .review(id, body.approve, body.note.as_deref())
            .await?,
    ))
}

async fn list_reports(
    State(state): State<AppState>,
    Query(filter): Query<ReportFilter>,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<PagedResult<Report>>, ApiError> {
    Ok(Json(state.report_service.list(&filter, &page.into()).await?))
}

async fn update_report(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<ReportUpdateRequest>,
) -> Result<Json<Report>, ApiError> {
    Ok(Json(
        state
            .report_service
            .transition(&admin.0, id, body.status, body.note.as_deref())
            .await?,
    ))
}
