//! Direct message endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::PaginationQuery;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{Conversation, Message, PagedResult};

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub recipient_id: i64,
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct UnreadResponse {
    pub count: i64,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(conversations).post(send))
        .route("/unread", get(unread))
        .route("/with/{user_id}", get(thread))
}

/// GET /api/v1/messages - One entry per counterpart, newest first
async fn conversations(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Conversation>>, ApiError> {
    Ok(Json(state.message_service.conversations(&user.0).await?))
}

async fn unread(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<UnreadResponse>, ApiError> {
    let count = state.message_service.unread_count(&user.0).await?;
    Ok(Json(UnreadResponse { count }))
}

/// GET /api/v1/messages/with/{user_id} - Oldest first; marks incoming as read
async fn thread(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(other_id): Path<i64>,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<PagedResult<Message>>, ApiError> {
    Ok(Json(
        state
            .message_service
            .thread(&user.0, other_id, &page.into())
            .await?,
    ))
}

async fn send(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let message = state
        .message_service
        .send(&user.0, body.recipient_id, &body.body)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}
