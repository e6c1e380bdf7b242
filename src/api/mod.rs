pub mod client;
pub mod events;
pub mod memory;
pub mod models;
pub mod realtime;
pub mod socket;

use async_trait::async_trait;

use crate::error::Result;
use models::{ChatMessage, Conversation, ConversationId, Page, SendMessageRequest, UserId};

/// The REST surface the chat layer talks to.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn conversations(&self, user_id: UserId) -> Result<Vec<Conversation>>;

    async fn messages(&self, chat_id: ConversationId, page: u32, size: u32) -> Result<Page<ChatMessage>>;

    async fn send_message(&self, chat_id: ConversationId, request: SendMessageRequest) -> Result<ChatMessage>;

    async fn mark_read(&self, chat_id: ConversationId) -> Result<()>;

    /// Full-text search, optionally scoped to one chat.
    async fn search(&self, query: &str, chat_id: Option<ConversationId>) -> Result<Vec<ChatMessage>>;
}
