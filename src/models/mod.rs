//! Data models
//!
//! Database entities, their status enums, and the input types the service
//! layer accepts. Enums are stored as lowercase strings.

/// Define a string-backed enum with `as_str`, `Display` and `FromStr`.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = anyhow::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(anyhow::anyhow!(concat!("Invalid ", stringify!($name), ": {}"), s)),
                }
            }
        }
    };
}

mod asset;
mod course;
mod job;
mod message;
mod organization;
mod pagination;
mod profile;
mod report;
mod session;
mod startup;
mod user;

pub use asset::{Asset, AssetPurpose};
pub use course::{
    Course, CourseFilter, CourseInput, CourseLevel, CourseMode, CourseStatus, Enrollment,
    EnrollmentStatus, EnrollmentWithCourse,
};
pub use job::{
    Application, ApplicationStatus, ApplicationWithJob, EmploymentType, Job, JobFilter, JobInput,
    JobStatus,
};
pub use message::{Conversation, Message};
pub use organization::{Organization, OrganizationInput, OrganizationKind};
pub use pagination::{ListParams, PagedResult};
pub use profile::{Profile, ProfileInput};
pub use report::{Report, ReportStatus, ReportTarget};
pub use session::Session;
pub use startup::{Startup, StartupFilter, StartupInput, StartupStage, StartupStatus};
pub use user::{User, UserRole, UserStatus};
