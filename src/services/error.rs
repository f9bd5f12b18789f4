//! Error type shared by the domain services

/// Failure of a service operation.
///
/// The first four variants carry a message that is safe to show to the
/// client. `Internal` wraps infrastructure failures and is never shown.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{} not found", what))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }
}

/// Whether a repository error was caused by a UNIQUE or PRIMARY KEY violation
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<sqlx::Error>(),
            Some(sqlx::Error::Database(db)) if db.is_unique_violation()
        )
    })
}

/// Convert a repository error, turning unique violations into `Conflict(msg)`
pub fn conflict_on_unique(err: anyhow::Error, msg: &str) -> ServiceError {
    if is_unique_violation(&err) {
        ServiceError::Conflict(msg.to_string())
    } else {
        ServiceError::Internal(err)
    }
}
