use std::sync::Arc;

use log::{debug, info, warn};

use crate::api::ChatBackend;
use crate::api::models::{ChatMessage, ConversationId, Participant};
use crate::api::realtime::RealtimeChannel;
use crate::chat::composer::Composer;
use crate::chat::conversations::ConversationStore;
use crate::chat::meeting::MeetingRoom;
use crate::chat::messages::{DEFAULT_PAGE_SIZE, MessageStore};

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub page_size: u32,
    /// Drop inbound messages whose id is already in the open history.
    pub suppress_own_echo: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            suppress_own_echo: false,
        }
    }
}

/// Everything the chat screen needs for one signed-in user.
#[derive(Clone)]
pub struct ChatSession {
    me: Participant,
    backend: Arc<dyn ChatBackend>,
    channel: RealtimeChannel,
    conversations: ConversationStore,
    messages: MessageStore,
    composer: Composer,
    options: SessionOptions,
}

impl ChatSession {
    pub fn new(
        me: Participant,
        backend: Arc<dyn ChatBackend>,
        channel: RealtimeChannel,
        options: SessionOptions,
    ) -> Self {
        let conversations = ConversationStore::new(backend.clone());
        let messages = MessageStore::new(backend.clone(), options.page_size);
        let composer = Composer::new(
            me.clone(),
            conversations.clone(),
            messages.clone(),
            channel.clone(),
            backend.clone(),
        );
        Self {
            me,
            backend,
            channel,
            conversations,
            messages,
            composer,
            options,
        }
    }

    pub fn me(&self) -> &Participant {
        &self.me
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    pub fn messages(&self) -> &MessageStore {
        &self.messages
    }

    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    pub fn channel(&self) -> &RealtimeChannel {
        &self.channel
    }

    /// Connects the channel, claims its chat slots and loads the conversation list.
    /// Also restarts a session that was closed.
    pub async fn start(&self) {
        self.conversations.revive();
        self.messages.revive();
        self.channel.connect(self.me.id);
        self.register_handlers();
        self.conversations.load(self.me.id).await;
        info!(
            "chat session started for {} with {} conversations",
            self.me.name,
            self.conversations.conversations().len()
        );
    }

    fn register_handlers(&self) {
        let conversations = self.conversations.clone();
        let messages = self.messages.clone();
        let suppress = self.options.suppress_own_echo;
        self.channel
            .on_message(move |message| deliver(&conversations, &messages, suppress, message));

        let me = self.me.id;
        let conversations = self.conversations.clone();
        self.channel.on_typing_start(move |t| {
            if t.user_id != me {
                conversations.set_typing(t.conversation_id, t.user_id, true);
            }
        });
        let conversations = self.conversations.clone();
        self.channel.on_typing_stop(move |t| {
            conversations.set_typing(t.conversation_id, t.user_id, false);
        });
    }

    pub fn deliver(&self, message: ChatMessage) {
        let suppress = self.options.suppress_own_echo;
        deliver(&self.conversations, &self.messages, suppress, message);
    }

    /// Selects the conversation, marks it read on the server and loads its history.
    pub async fn open(&self, conversation_id: ConversationId) {
        self.conversations.select(conversation_id);
        let backend = self.backend.clone();
        crate::utils::spawn_async(async move {
            if let Err(e) = backend.mark_read(conversation_id).await {
                warn!("Failed to mark conversation {} read: {}", conversation_id, e);
            }
        });
        self.messages.load(conversation_id).await;
    }

    pub fn close_conversation(&self) {
        if let Some(id) = self.conversations.selected() {
            self.channel.stop_typing(id);
        }
        self.conversations.close_selection();
    }

    pub fn send(&self, text: &str) -> Option<ChatMessage> {
        self.composer.submit(text)
    }

    pub fn typing(&self, active: bool) {
        let Some(id) = self.conversations.selected() else { return };
        if active {
            self.channel.start_typing(id);
        } else {
            self.channel.stop_typing(id);
        }
    }

    /// Matching messages, or nothing when the query is blank or the search fails.
    pub async fn search(&self, query: &str, scope: Option<ConversationId>) -> Vec<ChatMessage> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }
        match self.backend.search(query, scope).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!("Search for {:?} failed: {}", query, e);
                Vec::new()
            }
        }
    }

    /// Meeting rooms share this session's channel, so joining one takes over the meeting slots.
    pub fn meeting(&self, meeting_id: ConversationId) -> MeetingRoom {
        MeetingRoom::new(meeting_id, self.me.clone(), self.channel.clone())
    }

    /// Disconnects and stops the stores from applying responses still in flight.
    pub fn close(&self) {
        self.channel.disconnect();
        self.conversations.retire();
        self.messages.retire();
    }
}

/// Inbound chat message: shown if it belongs to the open conversation, and
/// always recorded as that conversation's latest.
fn deliver(
    conversations: &ConversationStore,
    messages: &MessageStore,
    suppress_own_echo: bool,
    message: ChatMessage,
) {
    let conversation_id = message.conversation_id;
    let is_open = conversations.selected() == Some(conversation_id)
        && messages.conversation_id() == Some(conversation_id);
    conversations.upsert_last_message(conversation_id, &message);
    if !is_open {
        return;
    }
    if suppress_own_echo && messages.contains(message.id) {
        debug!("suppressing echo of message {}", message.id);
        return;
    }
    messages.append(message);
}
