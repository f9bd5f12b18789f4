//! Organization endpoints
//!
//! Companies and institutions each own one organization. The `{slug}`
//! segment doubles as the numeric id for updates.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::PaginationQuery;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{Organization, OrganizationInput, OrganizationKind, PagedResult};

#[derive(Debug, Default, Deserialize)]
pub struct ListOrganizationsQuery {
    pub kind: Option<OrganizationKind>,
    #[serde(default)]
    pub verified: bool,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/mine", get(get_mine))
        .route("/{slug}", get(get_by_slug).put(update))
}

async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListOrganizationsQuery>,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<PagedResult<Organization>>, ApiError> {
    let result = state
        .organization_service
        .list(query.kind, query.verified, &page.into())
        .await?;
    Ok(Json(result))
}

async fn create(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<OrganizationInput>,
) -> Result<impl IntoResponse, ApiError> {
    let org = state.organization_service.create(&user.0, body).await?;
    Ok((StatusCode::CREATED, Json(org)))
}

async fn get_mine(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Option<Organization>>, ApiError> {
    Ok(Json(state.organization_service.find_mine(&user.0).await?))
}

async fn get_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Organization>, ApiError> {
    Ok(Json(state.organization_service.get_by_slug(&slug).await?))
}

async fn update(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<OrganizationInput>,
) -> Result<Json<Organization>, ApiError> {
    Ok(Json(state.organization_service.update(&user.0, id, body).await?))
}
