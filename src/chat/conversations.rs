use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;

use crate::api::ChatBackend;
use crate::api::models::{ChatMessage, Conversation, ConversationId, LastMessage, UserId};

#[derive(Default)]
struct ConversationState {
    conversations: Vec<Conversation>,
    selected: Option<ConversationId>,
    typing: HashMap<ConversationId, BTreeSet<UserId>>,
    retired: bool,
}

/// The signed-in user's conversation list, as shown in the chat sidebar.
#[derive(Clone)]
pub struct ConversationStore {
    backend: Arc<dyn ChatBackend>,
    state: Arc<Mutex<ConversationState>>,
}

impl ConversationStore {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            state: Arc::new(Mutex::new(ConversationState::default())),
        }
    }

    /// Replaces the whole list. A failed fetch leaves an empty list behind.
    pub async fn load(&self, user_id: UserId) {
        let conversations = match self.backend.conversations(user_id).await {
            Ok(list) => list,
            Err(e) => {
                warn!("Failed to load conversations for user {}: {}", user_id, e);
                Vec::new()
            }
        };
        let mut state = self.state.lock();
        if state.retired {
            debug!("conversation store retired, dropping late response");
            return;
        }
        state.conversations = conversations;
    }

    /// Records `message` as the latest in its conversation. Unread goes up by
    /// one unless that conversation is the open one.
    pub fn upsert_last_message(&self, conversation_id: ConversationId, message: &ChatMessage) {
        let mut state = self.state.lock();
        let is_open = state.selected == Some(conversation_id);
        let Some(conv) = state.conversations.iter_mut().find(|c| c.id == conversation_id) else {
            debug!("message for unknown conversation {}", conversation_id);
            return;
        };
        conv.last_message = Some(LastMessage::from(message));
        if !is_open {
            conv.unread_count += 1;
        }
    }

    pub fn select(&self, conversation_id: ConversationId) {
        let mut state = self.state.lock();
        state.selected = Some(conversation_id);
        if let Some(conv) = state.conversations.iter_mut().find(|c| c.id == conversation_id) {
            conv.unread_count = 0;
        }
    }

    pub fn close_selection(&self) {
        self.state.lock().selected = None;
    }

    pub fn selected(&self) -> Option<ConversationId> {
        self.state.lock().selected
    }

    pub fn get(&self, conversation_id: ConversationId) -> Option<Conversation> {
        self.state
            .lock()
            .conversations
            .iter()
            .find(|c| c.id == conversation_id)
            .cloned()
    }

    pub fn conversations(&self) -> Vec<Conversation> {
        self.state.lock().conversations.clone()
    }

    pub fn total_unread(&self) -> u32 {
        self.state.lock().conversations.iter().map(|c| c.unread_count).sum()
    }

    pub fn set_typing(&self, conversation_id: ConversationId, user_id: UserId, typing: bool) {
        let mut state = self.state.lock();
        if typing {
            state.typing.entry(conversation_id).or_default().insert(user_id);
        } else if let Some(users) = state.typing.get_mut(&conversation_id) {
            users.remove(&user_id);
            if users.is_empty() {
                state.typing.remove(&conversation_id);
            }
        }
    }

    pub fn typing_in(&self, conversation_id: ConversationId) -> Vec<UserId> {
        self.state
            .lock()
            .typing
            .get(&conversation_id)
            .map(|users| users.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Stops accepting fetch results; used when the owning view goes away.
    pub fn retire(&self) {
        self.state.lock().retired = true;
    }

    /// Accepts fetch results again after `retire`.
    pub fn revive(&self) {
        self.state.lock().retired = false;
    }
}
