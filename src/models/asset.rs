//! Uploaded object model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

string_enum! {
    /// What an upload is for; decides the accepted content types
    pub enum AssetPurpose {
        Avatar => "avatar",
        Resume => "resume",
        Logo => "logo",
        CourseMedia => "course_media",
        PitchDeck => "pitch_deck",
    }
}

const IMAGES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];
const PDF: &str = "application/pdf";
const WORD: &[&str] = &[
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];
const MP4: &str = "video/mp4";

impl AssetPurpose {
    /// Whether an upload of this content type is accepted for the purpose
    pub fn allows(self, content_type: &str) -> bool {
        let ct = content_type.trim().to_lowercase();
        let ct = ct.as_str();
        let image = IMAGES.contains(&ct);
        match self {
            Self::Avatar | Self::Logo => image,
            Self::Resume => ct == PDF || WORD.contains(&ct),
            Self::PitchDeck => ct == PDF || image,
            Self::CourseMedia => image || ct == MP4 || ct == PDF,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub id: i64,
    pub owner_id: i64,
    /// Object-store key, `<purpose>/<owner_id>/<uuid>.<ext>`
    pub key: String,
    pub purpose: AssetPurpose,
    pub content_type: String,
    pub size: i64,
    pub original_name: String,
    pub created_at: DateTime<Utc>,
}
