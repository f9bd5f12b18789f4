//! API middleware
//!
//! Contains:
//! - Shared application state
//! - The JSON error envelope and its HTTP status mapping
//! - Authentication extractors (session cookie or bearer token)
//! - Admin authorization middleware
//! - Request statistics

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::SharedCache;
use crate::config::Config;
use crate::db::repositories::{
    SqlxApplicationRepository, SqlxAssetRepository, SqlxCourseRepository,
    SqlxEnrollmentRepository, SqlxJobRepository, SqlxMessageRepository,
    SqlxOrganizationRepository, SqlxProfileRepository, SqlxReportRepository,
    SqlxSessionRepository, SqlxStartupRepository, SqlxStatsRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::User;
use crate::services::{
    AnalyticsService, ApplicationService, AssetService, CourseService, EnrollmentService,
    JobService, LoginRateLimiter, MessageService, Notifier, OrganizationService, ProfileService,
    RecommendationService, ReportService, ReportTargets, ServiceError, StartupService,
    UserService, UserServiceError,
};
use crate::storage::DynObjectStore;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "session";

// ============================================================================
// Request Statistics
// ============================================================================

/// Lightweight request statistics using atomic operations (no locks)
pub struct RequestStats {
    total_requests: AtomicU64,
    /// Sum of response times in microseconds
    total_response_time_us: AtomicU64,
    start_time: Instant,
}

impl RequestStats {
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            total_response_time_us: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record(&self, duration_us: u64) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_response_time_us
            .fetch_add(duration_us, Ordering::Relaxed);
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn avg_response_time_us(&self) -> f64 {
        let total = self.total_requests.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        self.total_response_time_us.load(Ordering::Relaxed) as f64 / total as f64
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl Default for RequestStats {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Application State
// ============================================================================

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub user_service: Arc<UserService>,
    pub profile_service: Arc<ProfileService>,
    pub organization_service: Arc<OrganizationService>,
    pub course_service: Arc<CourseService>,
    pub enrollment_service: Arc<EnrollmentService>,
    pub job_service: Arc<JobService>,
    pub application_service: Arc<ApplicationService>,
    pub message_service: Arc<MessageService>,
    pub startup_service: Arc<StartupService>,
    pub report_service: Arc<ReportService>,
    pub asset_service: Arc<AssetService>,
    pub recommendation_service: Arc<RecommendationService>,
    pub analytics_service: Arc<AnalyticsService>,
    pub request_stats: Arc<RequestStats>,
}

impl AppState {
    /// Wire repositories and services over the given infrastructure
    pub fn new(
        config: Config,
        pool: DynDatabasePool,
        cache: SharedCache,
        store: DynObjectStore,
        notifier: Notifier,
    ) -> Self {
        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let session_repo = SqlxSessionRepository::boxed(pool.clone());
        let profile_repo = SqlxProfileRepository::boxed(pool.clone());
        let org_repo = SqlxOrganizationRepository::boxed(pool.clone());
        let course_repo = SqlxCourseRepository::boxed(pool.clone());
        let enrollment_repo = SqlxEnrollmentRepository::boxed(pool.clone());
        let job_repo = SqlxJobRepository::boxed(pool.clone());
        let application_repo = SqlxApplicationRepository::boxed(pool.clone());
        let message_repo = SqlxMessageRepository::boxed(pool.clone());
        let startup_repo = SqlxStartupRepository::boxed(pool.clone());
        let report_repo = SqlxReportRepository::boxed(pool.clone());
        let asset_repo = SqlxAssetRepository::boxed(pool.clone());
        let stats_repo = SqlxStatsRepository::boxed(pool);

        let user_service = UserService::with_session_days(
            user_repo.clone(),
            session_repo,
            Arc::new(LoginRateLimiter::new()),
            config.session.ttl_days,
        );
        let application_service = ApplicationService::new(
            application_repo.clone(),
            job_repo.clone(),
            org_repo.clone(),
            user_repo.clone(),
            asset_repo.clone(),
            notifier.clone(),
        );
        let report_service = ReportService::new(
            report_repo,
            ReportTargets {
                users: user_repo.clone(),
                jobs: job_repo.clone(),
                courses: course_repo.clone(),
                startups: startup_repo.clone(),
                messages: message_repo.clone(),
            },
        );
        let asset_service = AssetService::new(
            asset_repo.clone(),
            store,
            config.upload.max_file_size,
            Duration::from_secs(config.storage.presign_ttl_seconds),
        );
        let recommendation_service = RecommendationService::new(
            profile_repo.clone(),
            course_repo.clone(),
            job_repo.clone(),
            startup_repo.clone(),
            cache.clone(),
            config.recommendation.clone(),
        );

        Self {
            user_service: Arc::new(user_service),
            profile_service: Arc::new(ProfileService::new(profile_repo, asset_repo.clone())),
            organization_service: Arc::new(OrganizationService::new(
                org_repo.clone(),
                asset_repo,
            )),
            course_service: Arc::new(CourseService::new(
                course_repo.clone(),
                enrollment_repo.clone(),
                org_repo.clone(),
            )),
            enrollment_service: Arc::new(EnrollmentService::new(
                enrollment_repo,
                course_repo.clone(),
                org_repo.clone(),
            )),
            job_service: Arc::new(JobService::new(
                job_repo,
                application_repo,
                org_repo.clone(),
            )),
            application_service: Arc::new(application_service),
            message_service: Arc::new(MessageService::new(message_repo, user_repo, notifier)),
            startup_service: Arc::new(StartupService::new(startup_repo)),
            report_service: Arc::new(report_service),
            asset_service: Arc::new(asset_service),
            recommendation_service: Arc::new(recommendation_service),
            analytics_service: Arc::new(AnalyticsService::new(
                stats_repo,
                org_repo,
                course_repo,
                cache,
            )),
            request_stats: Arc::new(RequestStats::new()),
            config: Arc::new(config),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new("RATE_LIMITED", message)
    }

    /// Log the full error chain and hide it from the client
    pub fn internal(err: &anyhow::Error) -> Self {
        tracing::error!("Internal error: {:#}", err);
        Self::new("INTERNAL_ERROR", "Internal server error")
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "CONFLICT" => StatusCode::CONFLICT,
            "RATE_LIMITED" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(msg) => Self::not_found(msg),
            ServiceError::Validation(msg) => Self::validation_error(msg),
            ServiceError::Conflict(msg) => Self::conflict(msg),
            ServiceError::Forbidden(msg) => Self::forbidden(msg),
            ServiceError::Internal(e) => Self::internal(&e),
        }
    }
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::AuthenticationError(msg) => Self::unauthorized(msg),
            UserServiceError::ValidationError(msg) => Self::validation_error(msg),
            UserServiceError::UserExists(msg) => Self::conflict(msg),
            UserServiceError::RateLimited => {
                Self::rate_limited("Too many failed login attempts, try again later")
            }
            UserServiceError::InternalError(e) => Self::internal(&e),
        }
    }
}

// ============================================================================
// Authentication
// ============================================================================

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// The caller if a valid session came with the request
#[derive(Debug, Clone)]
pub struct OptionalUser(pub Option<User>);

impl OptionalUser {
    pub fn user(&self) -> Option<&User> {
        self.0.as_ref()
    }
}

/// Session token from `Authorization: Bearer` or the session cookie
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return Some(token.trim().to_string());
    }

    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies
        .split(';')
        .filter_map(|c| c.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|v| !v.is_empty())
}

async fn resolve_user(state: &AppState, headers: &HeaderMap) -> Result<User, ApiError> {
    let token = session_token(headers)
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;
    state
        .user_service
        .validate_session(&token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>() {
            return Ok(user.clone());
        }
        let user = AuthenticatedUser(resolve_user(state, &parts.headers).await?);
        parts.extensions.insert(user.clone());
        Ok(user)
    }
}

impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>() {
            return Ok(OptionalUser(Some(user.0.clone())));
        }
        if session_token(&parts.headers).is_none() {
            return Ok(OptionalUser(None));
        }
        match resolve_user(state, &parts.headers).await {
            Ok(user) => Ok(OptionalUser(Some(user))),
            Err(e) if e.status() == StatusCode::UNAUTHORIZED => Ok(OptionalUser(None)),
            Err(e) => Err(e),
        }
    }
}

/// Admin authorization middleware.
///
/// Resolves the session and stores the user in the request extensions for
/// the `AuthenticatedUser` extractor.
pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = resolve_user(&state, request.headers()).await?;
    if !user.is_admin() {
        return Err(ApiError::forbidden("Admin privileges required"));
    }
    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Client address: proxy headers first, then the socket peer
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub Option<IpAddr>);

impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .or_else(|| parts.headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
            .and_then(|ip| ip.trim().parse::<IpAddr>().ok());

        let ip = forwarded.or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        });
        Ok(ClientIp(ip))
    }
}

/// Request statistics middleware
pub async fn request_stats_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let response = next.run(request).await;
    state
        .request_stats
        .record(start.elapsed().as_micros() as u64);
    response
}
