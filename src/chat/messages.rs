use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;

use crate::api::ChatBackend;
use crate::api::models::{ChatMessage, ConversationId};

pub const DEFAULT_PAGE_SIZE: u32 = 50;

#[derive(Default)]
struct MessageState {
    conversation_id: Option<ConversationId>,
    messages: Vec<ChatMessage>,
    // bumped by every load; responses carrying an older value are stale
    generation: u64,
    retired: bool,
}

/// History of the open conversation, in arrival order.
#[derive(Clone)]
pub struct MessageStore {
    backend: Arc<dyn ChatBackend>,
    page_size: u32,
    state: Arc<Mutex<MessageState>>,
}

impl MessageStore {
    pub fn new(backend: Arc<dyn ChatBackend>, page_size: u32) -> Self {
        Self {
            backend,
            page_size: page_size.max(1),
            state: Arc::new(Mutex::new(MessageState::default())),
        }
    }

    /// Replaces the history with the first page for `conversation_id`.
    ///
    /// The old history is dropped as soon as the load starts. Messages appended
    /// while the fetch is in flight stay after the fetched page. Errors leave
    /// only those; a response overtaken by a newer load is dropped.
    pub async fn load(&self, conversation_id: ConversationId) {
        let ticket = {
            let mut state = self.state.lock();
            state.generation += 1;
            state.conversation_id = Some(conversation_id);
            state.messages.clear();
            state.generation
        };

        let fetched = self.backend.messages(conversation_id, 0, self.page_size).await;
        let mut messages = match fetched {
            Ok(page) => page.content,
            Err(e) => {
                warn!("Failed to load messages for conversation {}: {}", conversation_id, e);
                Vec::new()
            }
        };

        let mut state = self.state.lock();
        if state.retired || state.generation != ticket {
            debug!("dropping stale history for conversation {}", conversation_id);
            return;
        }
        messages.append(&mut state.messages);
        state.messages = messages;
    }

    /// Pushes onto the end. No ordering fix-up, no duplicate check.
    pub fn append(&self, message: ChatMessage) {
        self.state.lock().messages.push(message);
    }

    pub fn contains(&self, id: i64) -> bool {
        self.state.lock().messages.iter().any(|m| m.id == id)
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.state.lock().messages.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn conversation_id(&self) -> Option<ConversationId> {
        self.state.lock().conversation_id
    }

    pub fn retire(&self) {
        self.state.lock().retired = true;
    }

    /// Accepts fetch results again after `retire`.
    pub fn revive(&self) {
        self.state.lock().retired = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::memory::InMemoryBackend;
    use crate::api::models::{Conversation, MessageKind, Page, SendMessageRequest};
    use crate::error::Result;
    use chrono::Utc;

    fn store(backend: InMemoryBackend) -> MessageStore {
        MessageStore::new(Arc::new(backend), DEFAULT_PAGE_SIZE)
    }

    fn local(id: i64) -> ChatMessage {
        ChatMessage {
            id,
            sender_id: 2,
            sender_name: "Jane Doe".into(),
            content: "same".into(),
            timestamp: Utc::now(),
            conversation_id: 1,
            kind: MessageKind::Text,
        }
    }

    #[tokio::test]
    async fn load_replaces_history() {
        let messages = store(InMemoryBackend::demo());
        messages.append(local(1));
        messages.load(1).await;
        let ids: Vec<_> = messages.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![101, 102, 103]);
        assert_eq!(messages.conversation_id(), Some(1));
    }

    #[tokio::test]
    async fn missing_conversation_loads_empty() {
        let messages = store(InMemoryBackend::demo());
        messages.load(999).await;
        assert!(messages.is_empty());
        assert_eq!(messages.conversation_id(), Some(999));
    }

    #[tokio::test]
    async fn network_failure_loads_empty() {
        let backend = InMemoryBackend::demo();
        backend.set_offline(true);
        let messages = store(backend);
        messages.load(1).await;
        assert!(messages.is_empty());
    }

    #[test]
    fn append_keeps_duplicates() {
        let messages = store(InMemoryBackend::new());
        messages.append(local(7));
        messages.append(local(7));
        assert_eq!(messages.len(), 2);
        assert!(messages.contains(7));
    }

    /// Holds history requests for conversation 1 until released.
    struct Gated {
        inner: InMemoryBackend,
        gate: tokio::sync::Notify,
    }

    #[async_trait::async_trait]
    impl ChatBackend for Gated {
        async fn conversations(&self, user_id: i64) -> Result<Vec<Conversation>> {
            self.inner.conversations(user_id).await
        }

        async fn messages(
            &self,
            chat_id: ConversationId,
            page: u32,
            size: u32,
        ) -> Result<Page<ChatMessage>> {
            if chat_id == 1 {
                self.gate.notified().await;
            }
            self.inner.messages(chat_id, page, size).await
        }

        async fn send_message(
            &self,
            chat_id: ConversationId,
            request: SendMessageRequest,
        ) -> Result<ChatMessage> {
            self.inner.send_message(chat_id, request).await
        }

        async fn mark_read(&self, chat_id: ConversationId) -> Result<()> {
            self.inner.mark_read(chat_id).await
        }

        async fn search(
            &self,
            query: &str,
            chat_id: Option<ConversationId>,
        ) -> Result<Vec<ChatMessage>> {
            self.inner.search(query, chat_id).await
        }
    }

    #[tokio::test]
    async fn overtaken_load_is_dropped() {
        let backend = Arc::new(Gated {
            inner: InMemoryBackend::demo(),
            gate: tokio::sync::Notify::new(),
        });
        let messages = MessageStore::new(backend.clone(), DEFAULT_PAGE_SIZE);

        let slow = {
            let messages = messages.clone();
            tokio::spawn(async move { messages.load(1).await })
        };
        tokio::task::yield_now().await;
        messages.load(2).await;
        backend.gate.notify_one();
        slow.await.unwrap();

        assert_eq!(messages.conversation_id(), Some(2));
        let ids: Vec<_> = messages.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![201]);
    }

    #[tokio::test]
    async fn switching_conversations_never_mixes_histories() {
        let backend = Arc::new(Gated {
            inner: InMemoryBackend::demo(),
            gate: tokio::sync::Notify::new(),
        });
        let messages = MessageStore::new(backend.clone(), DEFAULT_PAGE_SIZE);
        messages.load(2).await;
        assert_eq!(messages.len(), 1);

        let pending = {
            let messages = messages.clone();
            tokio::spawn(async move { messages.load(1).await })
        };
        tokio::task::yield_now().await;
        assert_eq!(messages.conversation_id(), Some(1));
        assert!(messages.is_empty());

        let mut optimistic = local(1_700_000_000_000);
        optimistic.content = "Thanks for the advice!".into();
        messages.append(optimistic.clone());

        backend.gate.notify_one();
        pending.await.unwrap();

        let history = messages.messages();
        let ids: Vec<_> = history.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![101, 102, 103, optimistic.id]);
        assert!(history.iter().all(|m| m.conversation_id == 1));
    }

    #[tokio::test]
    async fn retired_store_ignores_loads() {
        let messages = store(InMemoryBackend::demo());
        messages.retire();
        messages.load(1).await;
        assert!(messages.is_empty());
    }
}
