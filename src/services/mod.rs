//! Services layer
//!
//! Business rules live here. Each service owns the repositories it needs
//! and returns `ServiceError` for anything the client should hear about.

pub mod analytics;
pub mod application;
pub mod asset;
pub mod course;
pub mod enrollment;
pub mod error;
pub mod job;
pub mod message;
pub mod notification;
pub mod organization;
pub mod password;
pub mod profile;
pub mod rate_limiter;
pub mod recommendation;
pub mod report;
pub mod slug;
pub mod startup;
pub mod terms;
pub mod user;

pub use analytics::{AdminOverview, AnalyticsService, CompanyAnalytics, InstitutionAnalytics};
pub use application::ApplicationService;
pub use asset::{AssetService, Upload};
pub use course::CourseService;
pub use enrollment::EnrollmentService;
pub use error::{ServiceError, ServiceResult};
pub use job::JobService;
pub use message::MessageService;
pub use notification::Notifier;
pub use organization::OrganizationService;
pub use password::{hash_password, verify_password};
pub use profile::ProfileService;
pub use rate_limiter::LoginRateLimiter;
pub use recommendation::{Recommendation, RecommendationKind, RecommendationService};
pub use report::{ReportInput, ReportService, ReportTargets};
pub use startup::StartupService;
pub use user::{LoginInput, RegisterInput, UserService, UserServiceError};
