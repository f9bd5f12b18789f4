//! Organization model (companies and institutions)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UserRole;

string_enum! {
    /// What an organization publishes: jobs or courses
    pub enum OrganizationKind {
        Company => "company",
        Institution => "institution",
    }
}

impl OrganizationKind {
    /// The organization kind a user of this role may own
    pub fn for_role(role: UserRole) -> Option<Self> {
        match role {
            UserRole::Company => Some(Self::Company),
            UserRole::Institution => Some(Self::Institution),
            UserRole::Admin | UserRole::Youth => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: i64,
    pub owner_id: i64,
    pub kind: OrganizationKind,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub industry: String,
    pub location: String,
    pub website: String,
    pub logo_asset_id: Option<i64>,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create/update input for an organization
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OrganizationInput {
    pub name: String,
    pub description: String,
    pub industry: String,
    pub location: String,
    pub website: String,
    pub logo_asset_id: Option<i64>,
}
