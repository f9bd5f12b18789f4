//! Youth profile endpoints

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{Profile, ProfileInput};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_mine).put(upsert_mine))
        .route("/{user_id}", get(get_public))
}

/// GET /api/v1/profiles/me - `null` until the profile is first saved
async fn get_mine(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Option<Profile>>, ApiError> {
    Ok(Json(state.profile_service.get(user.0.id).await?))
}

/// PUT /api/v1/profiles/me
async fn upsert_mine(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<ProfileInput>,
) -> Result<Json<Profile>, ApiError> {
    let profile = state.profile_service.upsert(&user.0, body).await?;
    // skills and interests feed the rankings
    state.recommendation_service.invalidate(user.0.id);
    Ok(Json(profile))
}

async fn get_public(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Profile>, ApiError> {
    Ok(Json(state.profile_service.get_public(user_id).await?))
}
