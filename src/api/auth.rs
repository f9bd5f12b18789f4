//! Authentication API endpoints
//!
//! - POST /api/v1/auth/register - Create an account and sign in
//! - POST /api/v1/auth/login - Sign in
//! - POST /api/v1/auth/logout - Sign out
//! - GET /api/v1/auth/me - Current user
//! - PUT /api/v1/auth/password - Change password (signs out everywhere)

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{session_token, ApiError, AppState, AuthenticatedUser, ClientIp, SESSION_COOKIE};
use crate::models::{Session, User};
use crate::services::{LoginInput, RegisterInput};

/// Response for successful authentication
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
    pub expires_at: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(get_current_user))
        .route("/password", put(change_password))
}

fn session_cookie(state: &AppState, value: &str, max_age: i64) -> Result<HeaderMap, ApiError> {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, value, max_age
    );
    if state.config.session.cookie_secure {
        cookie.push_str("; Secure");
    }
    let value = HeaderValue::from_str(&cookie)
        .map_err(|e| ApiError::internal(&anyhow::Error::new(e).context("Invalid cookie value")))?;
    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, value);
    Ok(headers)
}

fn signed_in(state: &AppState, session: Session, user: User) -> Result<(HeaderMap, Json<AuthResponse>), ApiError> {
    let headers = session_cookie(
        state,
        &session.id,
        state.user_service.session_days() * 24 * 60 * 60,
    )?;
    Ok((
        headers,
        Json(AuthResponse {
            user,
            token: session.id,
            expires_at: session.expires_at.to_rfc3339(),
        }),
    ))
}

/// POST /api/v1/auth/register
///
/// The first account becomes the admin. Responds 201 with a session.
async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterInput>,
) -> Result<impl IntoResponse, ApiError> {
    let password = body.password.clone();
    let user = state.user_service.register(body).await?;
    let (session, user) = state
        .user_service
        .login(LoginInput {
            email: user.email,
            password,
        })
        .await?;
    let (headers, body) = signed_in(&state, session, user)?;
    Ok((StatusCode::CREATED, headers, body))
}

/// POST /api/v1/auth/login
///
/// Throttled per client address before credentials are checked.
async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(body): Json<LoginInput>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(ip) = ip {
        if !state.user_service.rate_limiter().check_ip(ip).await {
            tracing::warn!(%ip, "Login rate limit hit");
            return Err(ApiError::rate_limited("Too many login requests, slow down"));
        }
    }
    let (session, user) = state.user_service.login(body).await?;
    signed_in(&state, session, user)
}

/// POST /api/v1/auth/logout
async fn logout(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = session_token(&headers) {
        state.user_service.logout(&token).await?;
    }
    Ok((StatusCode::NO_CONTENT, session_cookie(&state, "", 0)?))
}

/// GET /api/v1/auth/me
async fn get_current_user(user: AuthenticatedUser) -> Json<User> {
    Json(user.0)
}

/// PUT /api/v1/auth/password
async fn change_password(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .user_service
        .change_password(user.0.id, &body.current_password, &body.new_password)
        .await?;
    Ok((StatusCode::NO_CONTENT, session_cookie(&state, "", 0)?))
}
