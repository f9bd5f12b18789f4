//! User service
//!
//! Registration, login and session handling, plus the admin operations on
//! accounts. The first account ever registered becomes the admin.

use crate::db::repositories::{SessionRepository, UserFilter, UserRepository};
use crate::models::{ListParams, PagedResult, Session, User, UserRole, UserStatus};
use crate::services::error::{is_unique_violation, ServiceError, ServiceResult};
use crate::services::password::{hash_password, is_acceptable, verify_password, MIN_PASSWORD_LEN};
use crate::services::rate_limiter::LoginRateLimiter;
use anyhow::Context;
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

const DEFAULT_SESSION_DAYS: i64 = 7;
const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("Too many failed login attempts, try again later")]
    RateLimited,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub display_name: String,
    #[serde(default)]
    pub role: UserRole,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    rate_limiter: Arc<LoginRateLimiter>,
    session_days: i64,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        rate_limiter: Arc<LoginRateLimiter>,
    ) -> Self {
        Self::with_session_days(user_repo, session_repo, rate_limiter, DEFAULT_SESSION_DAYS)
    }

    pub fn with_session_days(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        rate_limiter: Arc<LoginRateLimiter>,
        session_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            rate_limiter,
            session_days,
        }
    }

    pub fn rate_limiter(&self) -> &Arc<LoginRateLimiter> {
        &self.rate_limiter
    }

    pub fn session_days(&self) -> i64 {
        self.session_days
    }

    /// Register an account.
    ///
    /// The very first account becomes `admin` whatever role was asked for.
    /// Afterwards `admin` cannot be requested.
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        let email = input.email.trim().to_lowercase();
        let display_name = input.display_name.trim().to_string();

        if display_name.is_empty() {
            return Err(UserServiceError::ValidationError(
                "Display name cannot be empty".to_string(),
            ));
        }
        if display_name.chars().count() > 100 {
            return Err(UserServiceError::ValidationError(
                "Display name is too long".to_string(),
            ));
        }
        if !is_plausible_email(&email) {
            return Err(UserServiceError::ValidationError(
                "Invalid email format".to_string(),
            ));
        }
        if !is_acceptable(&input.password) {
            return Err(UserServiceError::ValidationError(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        if self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Email '{}' is already registered",
                email
            )));
        }

        let hash = hash_password(&input.password)?;
        let user = User::new(email.clone(), hash, input.role, display_name);
        match self.user_repo.create_account(&user).await {
            Ok(Some(created)) => {
                tracing::info!(user_id = created.id, role = %created.role, "User registered");
                Ok(created)
            }
            Ok(None) => Err(UserServiceError::ValidationError(
                "Role must be company, institution or youth".to_string(),
            )),
            Err(e) if is_unique_violation(&e) => Err(UserServiceError::UserExists(format!(
                "Email '{}' is already registered",
                email
            ))),
            Err(e) => Err(e.context("Failed to create user").into()),
        }
    }

    /// Check credentials and open a session.
    ///
    /// Unknown email and wrong password produce the same error. Failures
    /// count toward the per-email throttle.
    pub async fn login(&self, input: LoginInput) -> Result<(Session, User), UserServiceError> {
        let email = input.email.trim().to_lowercase();

        if self.rate_limiter.is_email_limited(&email).await {
            return Err(UserServiceError::RateLimited);
        }

        let user = match self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to look up user")?
        {
            Some(user) => user,
            None => {
                self.rate_limiter.record_failure(&email).await;
                return Err(UserServiceError::AuthenticationError(
                    INVALID_CREDENTIALS.to_string(),
                ));
            }
        };

        if !verify_password(&input.password, &user.password_hash)? {
            self.rate_limiter.record_failure(&email).await;
            return Err(UserServiceError::AuthenticationError(
                INVALID_CREDENTIALS.to_string(),
            ));
        }

        if user.is_suspended() {
            return Err(UserServiceError::AuthenticationError(
                "This account is suspended".to_string(),
            ));
        }

        self.rate_limiter.clear_email(&email).await;
        let session = self.create_session(user.id).await?;
        tracing::debug!(user_id = user.id, "User logged in");
        Ok((session, user))
    }

    pub async fn logout(&self, token: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(token)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Resolve a session token to its user.
    ///
    /// Unknown and expired tokens yield `None`; an expired session is
    /// removed. Suspended users have no valid sessions.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let session = match self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        {
            Some(s) => s,
            None => return Ok(None),
        };

        if session.is_expired() {
            if let Err(e) = self.session_repo.delete(token).await {
                tracing::warn!("Failed to delete expired session: {:#}", e);
            }
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get session user")?;

        Ok(user.filter(User::is_active))
    }

    /// Change the password and sign out every session of the user
    pub async fn change_password(
        &self,
        user_id: i64,
        current: &str,
        new: &str,
    ) -> Result<(), UserServiceError> {
        let mut user = self
            .user_repo
            .get_by_id(user_id)
            .await
            .context("Failed to get user")?
            .ok_or_else(|| UserServiceError::AuthenticationError("Unknown user".to_string()))?;

        if !verify_password(current, &user.password_hash)? {
            return Err(UserServiceError::AuthenticationError(
                "Current password is incorrect".to_string(),
            ));
        }
        if !is_acceptable(new) {
            return Err(UserServiceError::ValidationError(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        user.password_hash = hash_password(new)?;
        self.user_repo
            .update(&user)
            .await
            .context("Failed to update password")?;
        self.session_repo
            .delete_by_user(user_id)
            .await
            .context("Failed to revoke sessions")?;
        tracing::info!(user_id, "Password changed, sessions revoked");
        Ok(())
    }

    pub async fn get_by_id(&self, id: i64) -> ServiceResult<User> {
        self.user_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User"))
    }

    pub async fn list_users(
        &self,
        filter: &UserFilter,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<User>> {
        let (users, total) = self.user_repo.list(filter, params).await?;
        Ok(PagedResult::new(users, total, params))
    }

    /// Suspend or reactivate an account. Suspension revokes its sessions.
    pub async fn set_status(
        &self,
        admin: &User,
        user_id: i64,
        status: UserStatus,
    ) -> ServiceResult<User> {
        if admin.id == user_id {
            return Err(ServiceError::forbidden("Admins cannot change their own status"));
        }
        let target = self.get_by_id(user_id).await?;
        if target.is_admin() && status == UserStatus::Suspended {
            return Err(ServiceError::forbidden("Admin accounts cannot be suspended"));
        }

        self.user_repo.set_status(user_id, status).await?;
        if status == UserStatus::Suspended {
            self.session_repo.delete_by_user(user_id).await?;
        }
        tracing::info!(admin_id = admin.id, user_id, %status, "User status changed");
        self.get_by_id(user_id).await
    }

    /// Delete expired sessions; returns how many were removed
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, UserServiceError> {
        let removed = self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?;
        Ok(removed)
    }

    async fn create_session(&self, user_id: i64) -> Result<Session, UserServiceError> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id,
            expires_at: now + Duration::days(self.session_days),
            created_at: now,
        };
        let created = self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;
        Ok(created)
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}
