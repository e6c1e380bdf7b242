use std::sync::Arc;

use chrono::Utc;
use log::{debug, warn};
use parking_lot::Mutex;

use crate::api::ChatBackend;
use crate::api::models::{ChatMessage, MessageKind, Participant, SendMessageRequest};
use crate::api::realtime::RealtimeChannel;
use crate::chat::conversations::ConversationStore;
use crate::chat::messages::MessageStore;
use crate::utils::IdClock;

/// Input box of the chat view.
///
/// A submit shows the message right away, then hands it to the backend and
/// the realtime channel without waiting for either. Neither result is
/// matched back to the local copy.
#[derive(Clone)]
pub struct Composer {
    me: Participant,
    draft: Arc<Mutex<String>>,
    clock: Arc<IdClock>,
    conversations: ConversationStore,
    messages: MessageStore,
    channel: RealtimeChannel,
    backend: Arc<dyn ChatBackend>,
}

impl Composer {
    pub fn new(
        me: Participant,
        conversations: ConversationStore,
        messages: MessageStore,
        channel: RealtimeChannel,
        backend: Arc<dyn ChatBackend>,
    ) -> Self {
        Self {
            me,
            draft: Arc::new(Mutex::new(String::new())),
            clock: Arc::new(IdClock::new()),
            conversations,
            messages,
            channel,
            backend,
        }
    }

    pub fn set_draft(&self, text: impl Into<String>) {
        *self.draft.lock() = text.into();
    }

    pub fn draft(&self) -> String {
        self.draft.lock().clone()
    }

    pub fn submit_draft(&self) -> Option<ChatMessage> {
        let text = self.draft();
        self.submit(&text)
    }

    /// Returns the optimistic message, or `None` when nothing was sent
    /// (blank text, or no conversation open).
    pub fn submit(&self, text: &str) -> Option<ChatMessage> {
        let content = text.trim();
        if content.is_empty() {
            return None;
        }
        let Some(conversation_id) = self.conversations.selected() else {
            debug!("no conversation open, ignoring submit");
            return None;
        };

        let message = ChatMessage {
            id: self.clock.next(),
            sender_id: self.me.id,
            sender_name: self.me.name.clone(),
            content: content.to_string(),
            timestamp: Utc::now(),
            conversation_id,
            kind: MessageKind::Text,
        };
        self.messages.append(message.clone());
        self.draft.lock().clear();

        let backend = self.backend.clone();
        let request = SendMessageRequest::text(content);
        crate::utils::spawn_async(async move {
            if let Err(e) = backend.send_message(conversation_id, request).await {
                warn!("Failed to send message to conversation {}: {}", conversation_id, e);
            }
        });
        self.channel.send_message(conversation_id, message.clone());
        self.channel.stop_typing(conversation_id);

        Some(message)
    }
}
