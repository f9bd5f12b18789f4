//! Job posting and application models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

string_enum! {
    pub enum EmploymentType {
        FullTime => "full_time",
        PartTime => "part_time",
        Internship => "internship",
        Contract => "contract",
        Apprenticeship => "apprenticeship",
    }
}

string_enum! {
    pub enum JobStatus {
        Draft => "draft",
        Open => "open",
        Closed => "closed",
    }
}

string_enum! {
    /// Hiring pipeline position of an application
    pub enum ApplicationStatus {
        Pending => "pending",
        Reviewed => "reviewed",
        Shortlisted => "shortlisted",
        Interview => "interview",
        Accepted => "accepted",
        Rejected => "rejected",
        Withdrawn => "withdrawn",
    }
}

impl ApplicationStatus {
    /// No further transitions leave a final status
    pub fn is_final(self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected | Self::Withdrawn)
    }

    /// Position on the main pipeline, `None` for the side exits
    fn rank(self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Reviewed => Some(1),
            Self::Shortlisted => Some(2),
            Self::Interview => Some(3),
            Self::Accepted => Some(4),
            Self::Rejected | Self::Withdrawn => None,
        }
    }

    /// Whether the hiring company may move an application from `self` to `next`.
    ///
    /// Forward moves along the pipeline may skip steps; rejection is allowed
    /// from any non-final status. Withdrawal belongs to the applicant.
    pub fn company_can_move_to(self, next: Self) -> bool {
        if self.is_final() {
            return false;
        }
        match (self.rank(), next.rank()) {
            (Some(from), Some(to)) => to > from,
            _ => next == Self::Rejected,
        }
    }

    /// Whether the applicant may withdraw from this status
    pub fn can_withdraw(self) -> bool {
        !self.is_final()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub organization_id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub location: String,
    pub employment_type: EmploymentType,
    pub remote: bool,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub skills: Vec<String>,
    pub status: JobStatus,
    pub deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Open and not past its deadline
    pub fn accepts_applications(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Open && self.deadline.map_or(true, |d| d > now)
    }
}

/// Create/update input for a job posting
#[derive(Debug, Clone, Deserialize)]
pub struct JobInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    pub employment_type: EmploymentType,
    #[serde(default)]
    pub remote: bool,
    #[serde(default)]
    pub salary_min: Option<i64>,
    #[serde(default)]
    pub salary_max: Option<i64>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
}

/// Public job listing filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobFilter {
    pub employment_type: Option<EmploymentType>,
    pub remote: Option<bool>,
    /// Substring of the location
    pub location: Option<String>,
    pub skill: Option<String>,
    pub q: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: i64,
    pub job_id: i64,
    pub applicant_id: i64,
    pub cover_letter: String,
    pub resume_asset_id: Option<i64>,
    pub status: ApplicationStatus,
    pub status_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Application joined with the job title, for the applicant's dashboard
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationWithJob {
    #[serde(flatten)]
    pub application: Application,
    pub job_title: String,
    pub job_slug: String,
}
