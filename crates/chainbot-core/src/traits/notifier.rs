//! Outbound user notifications.

use crate::error::NotifyError;
use async_trait::async_trait;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `text` to a chat.
    async fn notify(&self, chat_id: i64, text: &str) -> Result<(), NotifyError>;
}
