//! Content reports filed by users

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::services::ReportInput;

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(file_report))
}

async fn file_report(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<ReportInput>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state.report_service.file(&user.0, body).await?;
    Ok((StatusCode::CREATED, Json(report)))
}
