//! Course and enrollment models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

string_enum! {
    pub enum CourseLevel {
        Beginner => "beginner",
        Intermediate => "intermediate",
        Advanced => "advanced",
    }
}

string_enum! {
    /// How a course is delivered
    pub enum CourseMode {
        Online => "online",
        InPerson => "in_person",
        Hybrid => "hybrid",
    }
}

string_enum! {
    /// Publication state; only published courses are listed publicly
    pub enum CourseStatus {
        Draft => "draft",
        Published => "published",
        Archived => "archived",
    }
}

string_enum! {
    pub enum EnrollmentStatus {
        Active => "active",
        Completed => "completed",
        Dropped => "dropped",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    pub organization_id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub category: String,
    pub tags: Vec<String>,
    pub level: CourseLevel,
    pub mode: CourseMode,
    pub duration_weeks: i64,
    /// Maximum number of active enrollments, unlimited when absent
    pub capacity: Option<i64>,
    pub status: CourseStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create/update input for a course
#[derive(Debug, Clone, Deserialize)]
pub struct CourseInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub level: CourseLevel,
    pub mode: CourseMode,
    #[serde(default)]
    pub duration_weeks: i64,
    #[serde(default)]
    pub capacity: Option<i64>,
}

/// Public course listing filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CourseFilter {
    pub category: Option<String>,
    pub level: Option<CourseLevel>,
    pub mode: Option<CourseMode>,
    pub tag: Option<String>,
    /// Free text over title and description
    pub q: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: i64,
    pub course_id: i64,
    pub user_id: i64,
    pub status: EnrollmentStatus,
    /// Percentage, 0..=100
    pub progress: i64,
    pub enrolled_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Enrollment joined with its course title, for the learner's dashboard
#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentWithCourse {
    #[serde(flatten)]
    pub enrollment: Enrollment,
    pub course_title: String,
    pub course_slug: String,
}
