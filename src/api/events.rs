use serde::{Deserialize, Serialize};

use crate::api::models::{ChatMessage, ConversationId, UserId};

/// Slot names of the realtime channel's listener table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelEvent {
    Message,
    MeetingMessage,
    UserJoined,
    UserLeft,
    TypingStart,
    TypingStop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingIndicator {
    pub conversation_id: ConversationId,
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingPresence {
    pub meeting_id: ConversationId,
    pub user_id: UserId,
}

/// One realtime event, framed on the wire as `{"event_type": ..., "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", content = "data", rename_all = "kebab-case")]
pub enum RealtimeEvent {
    Message(ChatMessage),
    MeetingMessage(ChatMessage),
    UserJoined(MeetingPresence),
    UserLeft(MeetingPresence),
    TypingStart(TypingIndicator),
    TypingStop(TypingIndicator),
}

impl RealtimeEvent {
    pub fn slot(&self) -> ChannelEvent {
        match self {
            RealtimeEvent::Message(_) => ChannelEvent::Message,
            RealtimeEvent::MeetingMessage(_) => ChannelEvent::MeetingMessage,
            RealtimeEvent::UserJoined(_) => ChannelEvent::UserJoined,
            RealtimeEvent::UserLeft(_) => ChannelEvent::UserLeft,
            RealtimeEvent::TypingStart(_) => ChannelEvent::TypingStart,
            RealtimeEvent::TypingStop(_) => ChannelEvent::TypingStop,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn typing_frame_shape() {
        let event = RealtimeEvent::TypingStart(TypingIndicator {
            conversation_id: 1,
            user_id: 2,
        });
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"event_type": "typing-start", "data": {"conversationId": 1, "userId": 2}})
        );
        assert_eq!(event.slot(), ChannelEvent::TypingStart);
    }

    #[test]
    fn unknown_event_type_is_rejected() {
        let frame = json!({"event_type": "presence", "data": {}});
        assert!(serde_json::from_value::<RealtimeEvent>(frame).is_err());
    }
}
