//! Direct messaging between users

use crate::db::repositories::{MessageRepository, UserRepository};
use crate::models::{Conversation, ListParams, Message, PagedResult, User};
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::notification::Notifier;
use std::sync::Arc;

pub const MAX_MESSAGE_LEN: usize = 5000;

pub struct MessageService {
    message_repo: Arc<dyn MessageRepository>,
    user_repo: Arc<dyn UserRepository>,
    notifier: Notifier,
}

impl MessageService {
    pub fn new(
        message_repo: Arc<dyn MessageRepository>,
        user_repo: Arc<dyn UserRepository>,
        notifier: Notifier,
    ) -> Self {
        Self {
            message_repo,
            user_repo,
            notifier,
        }
    }

    pub async fn send(&self, sender: &User, recipient_id: i64, body: &str) -> ServiceResult<Message> {
        let body = body.trim();
        if body.is_empty() {
            return Err(ServiceError::validation("Message cannot be empty"));
        }
        if body.chars().count() > MAX_MESSAGE_LEN {
            return Err(ServiceError::validation(format!(
                "Message cannot exceed {} characters",
                MAX_MESSAGE_LEN
            )));
        }
        if recipient_id == sender.id {
            return Err(ServiceError::validation("You cannot message yourself"));
        }

        let recipient = self
            .user_repo
            .get_by_id(recipient_id)
            .await?
            .filter(User::is_active)
            .ok_or_else(|| ServiceError::not_found("Recipient"))?;

        let message = self.message_repo.create(sender.id, recipient.id, body).await?;
        tracing::debug!(message_id = message.id, sender_id = sender.id, recipient_id, "Message sent");

        self.notifier
            .new_message(&recipient.email, &recipient.display_name, &sender.display_name);
        Ok(message)
    }

    pub async fn conversations(&self, user: &User) -> ServiceResult<Vec<Conversation>> {
        Ok(self.message_repo.conversations(user.id).await?)
    }

    /// Messages between `user` and `other`, oldest first.
    ///
    /// Messages addressed to `user` are marked read before the page is loaded.
    pub async fn thread(
        &self,
        user: &User,
        other_id: i64,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<Message>> {
        if self.user_repo.get_by_id(other_id).await?.is_none() {
            return Err(ServiceError::not_found("User"));
        }
        self.message_repo.mark_read(user.id, other_id).await?;
        let (items, total) = self.message_repo.thread(user.id, other_id, params).await?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn unread_count(&self, user: &User) -> ServiceResult<i64> {
        Ok(self.message_repo.unread_count(user.id).await?)
    }
}
