//! Personalized recommendation endpoints
//!
//! `GET /api/v1/recommendations/{courses|startups|jobs}?limit=` ranks
//! candidates against the caller's profile. Each entry carries its score
//! and the components behind it.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{Course, Job, Startup};
use crate::services::Recommendation;

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/courses", get(courses))
        .route("/startups", get(startups))
        .route("/jobs", get(jobs))
}

async fn courses(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<Recommendation<Course>>>, ApiError> {
    Ok(Json(
        state
            .recommendation_service
            .courses(&user.0, query.limit)
            .await?,
    ))
}

async fn startups(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<Recommendation<Startup>>>, ApiError> {
    Ok(Json(
        state
            .recommendation_service
            .startups(&user.0, query.limit)
            .await?,
    ))
}

async fn jobs(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<Recommendation<Job>>>, ApiError> {
    Ok(Json(
        state
            .recommendation_service
            .jobs(&user.0, query.limit)
            .await?,
    ))
}
