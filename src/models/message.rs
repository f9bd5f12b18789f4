//! Direct message model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub body: String,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Inbox entry: one per counterpart
#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub counterpart_id: i64,
    pub counterpart_name: String,
    pub last_message: Message,
    /// Messages from the counterpart not yet read
    pub unread: i64,
}
