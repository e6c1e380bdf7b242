//! Offline backend with the demo mentorship data. Used when no server is
//! configured, and by the tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;

use crate::api::ChatBackend;
use crate::api::models::{
    ChatMessage, Conversation, ConversationId, LastMessage, MessageKind, Page, Participant, Presence,
    Role, SendMessageRequest, UserId,
};
use crate::error::{ChatError, Result};

#[derive(Default)]
pub struct InMemoryBackend {
    conversations: Mutex<Vec<Conversation>>,
    messages: Mutex<HashMap<ConversationId, Vec<ChatMessage>>>,
    sent: Mutex<Vec<(ConversationId, SendMessageRequest)>>,
    read: Mutex<Vec<ConversationId>>,
    next_id: Mutex<i64>,
    offline: AtomicBool,
    // author of messages posted through this backend
    acting_as: Mutex<Option<Participant>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// John (mentor, 1) and Jane (mentee, 2) in conversation 1, Jane and
    /// Sarah (mentor, 3) in conversation 2.
    pub fn demo() -> Self {
        let john = participant(1, "John Smith", Role::Mentor, Presence::Online);
        let jane = participant(2, "Jane Doe", Role::Mentee, Presence::Online);
        let sarah = participant(3, "Sarah Wilson", Role::Mentor, Presence::Away);
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).single().unwrap_or_else(Utc::now);

        let backend = Self::new();
        backend.insert_conversation(Conversation {
            id: 1,
            participants: vec![john.clone(), jane.clone()],
            last_message: None,
            unread_count: 0,
        });
        backend.insert_conversation(Conversation {
            id: 2,
            participants: vec![jane.clone(), sarah.clone()],
            last_message: None,
            unread_count: 1,
        });
        backend.insert_message(message(101, &john, 1, "Hi Jane! How is the internship search going?", t0));
        backend.insert_message(message(
            102,
            &jane,
            1,
            "Pretty well, I have two interviews next week.",
            t0 + Duration::minutes(4),
        ));
        backend.insert_message(message(
            103,
            &john,
            1,
            "Great. Prepare a couple of project stories and you will be fine.",
            t0 + Duration::minutes(6),
        ));
        backend.insert_message(message(
            201,
            &sarah,
            2,
            "Our meeting is confirmed for Thursday at 4pm.",
            t0 + Duration::hours(2),
        ));
        *backend.next_id.lock() = 1000;
        backend
    }

    /// Demo data, with posted messages attributed to `me`.
    pub fn demo_as(me: &Participant) -> Self {
        let backend = Self::demo();
        backend.act_as(me.clone());
        backend
    }

    pub fn act_as(&self, me: Participant) {
        *self.acting_as.lock() = Some(me);
    }

    pub fn insert_conversation(&self, conversation: Conversation) {
        self.messages.lock().entry(conversation.id).or_default();
        self.conversations.lock().push(conversation);
    }

    /// Appends to history and refreshes the conversation summary.
    pub fn insert_message(&self, message: ChatMessage) {
        if let Some(conv) = self
            .conversations
            .lock()
            .iter_mut()
            .find(|c| c.id == message.conversation_id)
        {
            conv.last_message = Some(LastMessage::from(&message));
        }
        self.messages
            .lock()
            .entry(message.conversation_id)
            .or_default()
            .push(message);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(ConversationId, SendMessageRequest)> {
        self.sent.lock().clone()
    }

    pub fn marked_read(&self) -> Vec<ConversationId> {
        self.read.lock().clone()
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(ChatError::Offline)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ChatBackend for InMemoryBackend {
    async fn conversations(&self, user_id: UserId) -> Result<Vec<Conversation>> {
        self.check_online()?;
        Ok(self
            .conversations
            .lock()
            .iter()
            .filter(|c| c.participants.iter().any(|p| p.id == user_id))
            .cloned()
            .collect())
    }

    async fn messages(&self, chat_id: ConversationId, page: u32, size: u32) -> Result<Page<ChatMessage>> {
        self.check_online()?;
        let messages = self.messages.lock();
        let Some(all) = messages.get(&chat_id) else {
            return Ok(Page::empty());
        };
        let size = size.max(1) as usize;
        let total_pages = all.len().div_ceil(size) as u32;
        let content = all
            .iter()
            .skip(page as usize * size)
            .take(size)
            .cloned()
            .collect();
        Ok(Page {
            content,
            total_elements: all.len() as u64,
            total_pages,
            first: page == 0,
            last: page + 1 >= total_pages,
        })
    }

    async fn send_message(&self, chat_id: ConversationId, request: SendMessageRequest) -> Result<ChatMessage> {
        self.check_online()?;
        self.sent.lock().push((chat_id, request.clone()));
        let id = {
            let mut next = self.next_id.lock();
            *next += 1;
            *next
        };
        let (sender_id, sender_name) = match self.acting_as.lock().as_ref() {
            Some(me) => (me.id, me.name.clone()),
            None => (0, String::new()),
        };
        let stored = ChatMessage {
            id,
            sender_id,
            sender_name,
            content: request.content,
            timestamp: Utc::now(),
            conversation_id: chat_id,
            kind: request.kind,
        };
        self.insert_message(stored.clone());
        Ok(stored)
    }

    async fn mark_read(&self, chat_id: ConversationId) -> Result<()> {
        self.check_online()?;
        self.read.lock().push(chat_id);
        if let Some(conv) = self.conversations.lock().iter_mut().find(|c| c.id == chat_id) {
            conv.unread_count = 0;
        }
        Ok(())
    }

    async fn search(&self, query: &str, chat_id: Option<ConversationId>) -> Result<Vec<ChatMessage>> {
        self.check_online()?;
        let needle = query.to_lowercase();
        let messages = self.messages.lock();
        let mut hits: Vec<ChatMessage> = messages
            .iter()
            .filter(|(id, _)| chat_id.is_none_or(|scope| scope == **id))
            .flat_map(|(_, list)| list.iter())
            .filter(|m| m.content.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        hits.sort_by_key(|m| (m.timestamp, m.id));
        Ok(hits)
    }
}

fn participant(id: UserId, name: &str, role: Role, status: Presence) -> Participant {
    Participant {
        id,
        name: name.to_string(),
        role,
        status,
    }
}

fn message(id: i64, sender: &Participant, chat: ConversationId, content: &str, at: DateTime<Utc>) -> ChatMessage {
    ChatMessage {
        id,
        sender_id: sender.id,
        sender_name: sender.name.clone(),
        content: content.to_string(),
        timestamp: at,
        conversation_id: chat,
        kind: MessageKind::Text,
    }
}
