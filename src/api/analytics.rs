//! Organization dashboards

use axum::{extract::State, routing::get, Json, Router};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::services::{CompanyAnalytics, InstitutionAnalytics};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/company", get(company))
        .route("/institution", get(institution))
}

async fn company(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<CompanyAnalytics>, ApiError> {
    Ok(Json(state.analytics_service.company(&user.0).await?))
}

async fn institution(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<InstitutionAnalytics>, ApiError> {
    Ok(Json(state.analytics_service.institution(&user.0).await?))
}
