//! Contact messages sent through the public form

use crate::db::repositories::MessageRepository;
use crate::models::{CreateMessageInput, ListParams, Message, PagedResult};
use anyhow::Context;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum MessageServiceError {
    #[error("Message not found")]
    NotFound,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct MessageService {
    repo: Arc<dyn MessageRepository>,
}

impl MessageService {
    pub fn new(repo: Arc<dyn MessageRepository>) -> Self {
        Self { repo }
    }

    pub async fn submit(&self, input: CreateMessageInput) -> Result<Message, MessageServiceError> {
        let message = self.repo.create(&input).await.context("Failed to store message")?;
        tracing::info!(id = message.id, "Contact message received");
        Ok(message)
    }

    pub async fn list(
        &self,
        read: Option<bool>,
        params: &ListParams,
    ) -> Result<PagedResult<Message>, MessageServiceError> {
        let (messages, total) = self.repo.list(read, params).await.context("Failed to list messages")?;
        Ok(PagedResult::new(messages, total, params))
    }

    /// Fetch a message for reading; opening it marks it read
    pub async fn open(&self, id: i64) -> Result<Message, MessageServiceError> {
        let mut message = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get message")?
            .ok_or(MessageServiceError::NotFound)?;

        if !message.is_read {
            self.repo.set_read(id, true).await.context("Failed to mark message read")?;
            message.is_read = true;
        }
        Ok(message)
    }

    pub async fn set_read(&self, id: i64, read: bool) -> Result<Message, MessageServiceError> {
        let mut message = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get message")?
            .ok_or(MessageServiceError::NotFound)?;

        if message.is_read != read {
            self.repo.set_read(id, read).await.context("Failed to update message")?;
            message.is_read = read;
        }
        Ok(message)
    }

    pub async fn delete(&self, id: i64) -> Result<(), MessageServiceError> {
        if !self.repo.delete(id).await.context("Failed to delete message")? {
            return Err(MessageServiceError::NotFound);
        }
        Ok(())
    }
}
