//! Startup (entrepreneurship) model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

string_enum! {
    pub enum StartupStage {
        Idea => "idea",
        Prototype => "prototype",
        EarlyRevenue => "early_revenue",
        Growth => "growth",
    }
}

string_enum! {
    /// Moderation state; only approved startups are public
    pub enum StartupStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Startup {
    pub id: i64,
    pub founder_id: i64,
    pub name: String,
    pub slug: String,
    pub pitch: String,
    pub sector: String,
    pub stage: StartupStage,
    pub tags: Vec<String>,
    pub funding_goal: Option<i64>,
    pub status: StartupStatus,
    pub review_note: Option<String>,
    pub view_count: i64,
    /// Number of supporters; filled on reads
    #[serde(default)]
    pub supporters: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartupInput {
    pub name: String,
    #[serde(default)]
    pub pitch: String,
    #[serde(default)]
    pub sector: String,
    pub stage: StartupStage,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub funding_goal: Option<i64>,
}

/// Startup listing filter. `status` and `founder_id` are set by the service
/// according to who is asking.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartupFilter {
    #[serde(skip)]
    pub status: Option<StartupStatus>,
    #[serde(skip)]
    pub founder_id: Option<i64>,
    pub sector: Option<String>,
    pub stage: Option<StartupStage>,
    pub tag: Option<String>,
    pub q: Option<String>,
}
