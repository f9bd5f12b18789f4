//! Moderation report model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

string_enum! {
    /// Kind of entity a report points at
    pub enum ReportTarget {
        User => "user",
        Job => "job",
        Course => "course",
        Startup => "startup",
        Message => "message",
    }
}

string_enum! {
    pub enum ReportStatus {
        Open => "open",
        Reviewing => "reviewing",
        Resolved => "resolved",
        Dismissed => "dismissed",
    }
}

impl ReportStatus {
    pub fn is_final(self) -> bool {
        matches!(self, Self::Resolved | Self::Dismissed)
    }

    /// open -> reviewing -> resolved | dismissed, and open -> resolved | dismissed
    pub fn can_move_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Open, Self::Reviewing)
                | (Self::Open | Self::Reviewing, Self::Resolved | Self::Dismissed)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: i64,
    pub reporter_id: i64,
    pub target_type: ReportTarget,
    pub target_id: i64,
    pub reason: String,
    pub details: Option<String>,
    pub status: ReportStatus,
    pub resolution_note: Option<String>,
    pub resolved_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
