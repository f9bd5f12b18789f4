//! Direct message repository

use crate::db::DynDatabasePool;
use crate::models::{Conversation, ListParams, Message};
use crate::with_pool;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::collections::HashMap;
use std::sync::Arc;

use crate::db::InsertId;

const MESSAGE_COLUMNS: &str = "m.id, m.sender_id, m.recipient_id, m.body, m.read_at, m.created_at";

macro_rules! row_to_message {
    ($row:expr) => {{
        let row = $row;
        Message {
            id: row.get("id"),
            sender_id: row.get("sender_id"),
            recipient_id: row.get("recipient_id"),
            body: row.get("body"),
            read_at: row.get("read_at"),
            created_at: row.get("created_at"),
        }
    }};
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn create(&self, sender_id: i64, recipient_id: i64, body: &str) -> Result<Message>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Message>>;

    /// Messages exchanged between two users, oldest first
    async fn thread(
        &self,
        user_id: i64,
        other_id: i64,
        params: &ListParams,
    ) -> Result<(Vec<Message>, i64)>;

    /// Mark everything `sender_id` sent to `recipient_id` as read
    async fn mark_read(&self, recipient_id: i64, sender_id: i64) -> Result<u64>;

    async fn unread_count(&self, user_id: i64) -> Result<i64>;

    /// One entry per counterpart, most recent conversation first
    async fn conversations(&self, user_id: i64) -> Result<Vec<Conversation>>;
}

pub struct SqlxMessageRepository {
    pool: DynDatabasePool,
}

impl SqlxMessageRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn MessageRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl MessageRepository for SqlxMessageRepository {
    async fn create(&self, sender_id: i64, recipient_id: i64, body: &str) -> Result<Message> {
        let id = with_pool!(self.pool, |p| {
            sqlx::query(
                "INSERT INTO messages (sender_id, recipient_id, body, read_at, created_at) \
                 VALUES (?, ?, ?, NULL, ?)",
            )
            .bind(sender_id)
            .bind(recipient_id)
            .bind(body)
            .bind(Utc::now())
            .execute(p)
            .await
            .context("Failed to create message")?
            .inserted_id()
        });

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Message not found after insert"))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Message>> {
        let sql = format!("SELECT {} FROM messages m WHERE m.id = ?", MESSAGE_COLUMNS);
        with_pool!(self.pool, |p| {
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get message")?;
            Ok(row.map(|row| row_to_message!(&row)))
        })
    }

    async fn thread(
        &self,
        user_id: i64,
        other_id: i64,
        params: &ListParams,
    ) -> Result<(Vec<Message>, i64)> {
        let pair = "(m.sender_id = ? AND m.recipient_id = ?) OR (m.sender_id = ? AND m.recipient_id = ?)";
        let list_sql = format!(
            "SELECT {} FROM messages m WHERE {} ORDER BY m.created_at ASC, m.id ASC LIMIT ? OFFSET ?",
            MESSAGE_COLUMNS, pair
        );
        let count_sql = format!("SELECT COUNT(*) AS count FROM messages m WHERE {}", pair);

        with_pool!(self.pool, |p| {
            let rows = sqlx::query(&list_sql)
                .bind(user_id)
                .bind(other_id)
                .bind(other_id)
                .bind(user_id)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(p)
                .await
                .context("Failed to load thread")?;
            let total: i64 = sqlx::query(&count_sql)
                .bind(user_id)
                .bind(other_id)
                .bind(other_id)
                .bind(user_id)
                .fetch_one(p)
                .await
                .context("Failed to count thread")?
                .get("count");
            Ok((rows.iter().map(|row| row_to_message!(row)).collect(), total))
        })
    }

    async fn mark_read(&self, recipient_id: i64, sender_id: i64) -> Result<u64> {
        with_pool!(self.pool, |p| {
            let result = sqlx::query(
                "UPDATE messages SET read_at = ? \
                 WHERE recipient_id = ? AND sender_id = ? AND read_at IS NULL",
            )
            .bind(Utc::now())
            .bind(recipient_id)
            .bind(sender_id)
            .execute(p)
            .await
            .context("Failed to mark messages read")?;
            Ok(result.rows_affected())
        })
    }

    async fn unread_count(&self, user_id: i64) -> Result<i64> {
        with_pool!(self.pool, |p| {
            let row = sqlx::query(
                "SELECT COUNT(*) AS count FROM messages WHERE recipient_id = ? AND read_at IS NULL",
            )
            .bind(user_id)
            .fetch_one(p)
            .await
            .context("Failed to count unread messages")?;
            Ok(row.get("count"))
        })
    }

    async fn conversations(&self, user_id: i64) -> Result<Vec<Conversation>> {
        let sql = format!(
            r#"
            SELECT {}, u.id AS counterpart_id, u.display_name AS counterpart_name
            FROM messages m
            JOIN users u ON u.id = CASE WHEN m.sender_id = ? THEN m.recipient_id ELSE m.sender_id END
            WHERE m.sender_id = ? OR m.recipient_id = ?
            ORDER BY m.created_at DESC, m.id DESC
            "#,
            MESSAGE_COLUMNS
        );
        let rows: Vec<(Message, i64, String)> = with_pool!(self.pool, |p| {
            let rows = sqlx::query(&sql)
                .bind(user_id)
                .bind(user_id)
                .bind(user_id)
                .fetch_all(p)
                .await
                .context("Failed to load conversations")?;
            rows.iter()
                .map(|row| {
                    (
                        row_to_message!(row),
                        row.get::<i64, _>("counterpart_id"),
                        row.get::<String, _>("counterpart_name"),
                    )
                })
                .collect()
        });

        // Rows arrive newest first, so the first row per counterpart is its latest message.
        let mut index: HashMap<i64, usize> = HashMap::new();
        let mut out: Vec<Conversation> = Vec::new();
        for (message, counterpart_id, counterpart_name) in rows {
            let unread = i64::from(message.recipient_id == user_id && message.read_at.is_none());
            match index.get(&counterpart_id) {
                Some(&i) => out[i].unread += unread,
                None => {
                    index.insert(counterpart_id, out.len());
                    out.push(Conversation {
                        counterpart_id,
                        counterpart_name,
                        last_message: message,
                        unread,
                    });
                }
            }
        }
        Ok(out)
    }
}
