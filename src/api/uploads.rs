//! Upload API endpoints
//!
//! - POST /api/v1/uploads - multipart/form-data with a `file` field and a
//!   `purpose` field (avatar, logo, resume, pitch_deck, course_media)
//! - GET /api/v1/uploads/mine - The caller's files
//! - GET /api/v1/uploads/{id}/url - Download URL (owner or admin)
//! - DELETE /api/v1/uploads/{id}

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{Asset, AssetPurpose};
use crate::services::Upload;

/// Room for the multipart framing and the `purpose` field
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub asset: Asset,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct UrlResponse {
    pub url: String,
}

pub fn router(max_file_size: u64) -> Router<AppState> {
    let limit = usize::try_from(max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);
    Router::new()
        .route("/", post(upload).layer(DefaultBodyLimit::max(limit)))
        .route("/mine", get(list_mine))
        .route("/{id}/url", get(file_url))
        .route("/{id}", delete(delete_file))
}

/// POST /api/v1/uploads
async fn upload(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut purpose: Option<AssetPurpose> = None;
    let mut file: Option<(String, String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation_error(format!("Malformed multipart body: {}", e)))?
    {
        match field.name().unwrap_or("") {
            "purpose" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::validation_error(format!("Failed to read purpose: {}", e)))?;
                purpose = Some(
                    text.parse::<AssetPurpose>()
                        .map_err(|_| ApiError::validation_error(format!("Unknown purpose: {}", text.trim())))?,
                );
            }
            "file" => {
                let name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::validation_error(format!("Failed to read file: {}", e)))?;
                file = Some((name, content_type, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let purpose = purpose.ok_or_else(|| ApiError::validation_error("Missing purpose field"))?;
    let (original_name, content_type, bytes) =
        file.ok_or_else(|| ApiError::validation_error("No file provided"))?;

    let asset = state
        .asset_service
        .upload(
            &user.0,
            Upload {
                purpose,
                content_type,
                original_name,
                bytes,
            },
        )
        .await?;
    let url = state.asset_service.url(&user.0, asset.id).await?;
    Ok((StatusCode::CREATED, Json(UploadResponse { asset, url })))
}

async fn list_mine(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Asset>>, ApiError> {
    Ok(Json(state.asset_service.list_mine(&user.0).await?))
}

async fn file_url(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<UrlResponse>, ApiError> {
    let url = state.asset_service.url(&user.0, id).await?;
    Ok(Json(UrlResponse { url }))
}

async fn delete_file(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.asset_service.delete(&user.0, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
