//! Startup showcase endpoints
//!
//! Anyone may browse approved startups; signed-in youth register their own
//! and any signed-in user may support one.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::api::common::PaginationQuery;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, OptionalUser};
use crate::models::{PagedResult, Startup, StartupFilter, StartupInput};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/mine", get(list_mine))
        .route("/{slug}", get(view).put(update))
        .route("/{id}/support", post(support).delete(unsupport))
}

async fn list(
    State(state): State<AppState>,
    viewer: OptionalUser,
    Query(filter): Query<StartupFilter>,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<PagedResult<Startup>>, ApiError> {
    Ok(Json(
        state
            .startup_service
            .list(viewer.user(), filter, &page.into())
            .await?,
    ))
}

async fn list_mine(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<PagedResult<Startup>>, ApiError> {
    Ok(Json(
        state
            .startup_service
            .list_mine(&user.0, &page.into())
            .await?,
    ))
}

async fn view(
    State(state): State<AppState>,
    viewer: OptionalUser,
    Path(slug): Path<String>,
) -> Result<Json<Startup>, ApiError> {
    Ok(Json(state.startup_service.view(viewer.user(), &slug).await?))
}

async fn create(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<StartupInput>,
) -> Result<impl IntoResponse, ApiError> {
    let startup = state.startup_service.create(&user.0, body).await?;
    Ok((StatusCode::CREATED, Json(startup)))
}

async fn update(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<StartupInput>,
) -> Result<Json<Startup>, ApiError> {
    Ok(Json(state.startup_service.update(&user.0, id, body).await?))
}

async fn support(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Startup>, ApiError> {
    Ok(Json(state.startup_service.support(&user.0, id).await?))
}

async fn unsupport(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Startup>, ApiError> {
    Ok(Json(state.startup_service.unsupport(&user.0, id).await?))
}
