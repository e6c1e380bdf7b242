use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type ConversationId = i64;
pub type MessageId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Mentor,
    Mentee,
    Alumni,
    Admin,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Presence as reported by the server. Nothing refreshes it, so treat it as a hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    Online,
    Away,
    #[default]
    #[serde(other)]
    Offline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: UserId,
    pub name: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub status: Presence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMessage {
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub sender_id: UserId,
}

impl From<&ChatMessage> for LastMessage {
    fn from(message: &ChatMessage) -> Self {
        Self {
            content: message.content.clone(),
            timestamp: message.timestamp,
            sender_id: message.sender_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: ConversationId,
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub last_message: Option<LastMessage>,
    #[serde(default)]
    pub unread_count: u32,
}

impl Conversation {
    /// The first participant that is not `me`, used as the conversation title.
    pub fn peer(&self, me: UserId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id != me)
    }

    pub fn title(&self, me: UserId) -> String {
        self.peer(me)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| format!("Conversation {}", self.id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    #[default]
    Text,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: MessageId,
    pub sender_id: UserId,
    #[serde(default)]
    pub sender_name: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Chat id for conversation messages, meeting id for meeting-room messages.
    #[serde(alias = "chatId", alias = "meetingId")]
    pub conversation_id: ConversationId,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
}

/// Spring-style page wrapper returned by the history endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    #[serde(default)]
    pub total_elements: u64,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub first: bool,
    #[serde(default)]
    pub last: bool,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            content: Vec::new(),
            total_elements: 0,
            total_pages: 0,
            first: true,
            last: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
}

impl SendMessageRequest {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            kind: MessageKind::Text,
        }
    }
}
