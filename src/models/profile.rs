//! Youth profile model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Youth profile, one per user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: i64,
    pub full_name: String,
    pub headline: String,
    pub bio: String,
    pub location: String,
    pub education_level: String,
    pub skills: Vec<String>,
    pub interests: Vec<String>,
    pub avatar_asset_id: Option<i64>,
    pub resume_asset_id: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Terms matched against course and startup tags
    pub fn all_terms(&self) -> Vec<String> {
        self.skills
            .iter()
            .chain(self.interests.iter())
            .cloned()
            .collect()
    }
}

/// Create-or-replace input for a profile
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProfileInput {
    pub full_name: String,
    pub headline: String,
    pub bio: String,
    pub location: String,
    pub education_level: String,
    pub skills: Vec<String>,
    pub interests: Vec<String>,
    pub avatar_asset_id: Option<i64>,
    pub resume_asset_id: Option<i64>,
}
