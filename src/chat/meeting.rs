use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use log::debug;
use parking_lot::Mutex;

use crate::api::models::{ChatMessage, ConversationId, MessageKind, Participant, UserId};
use crate::api::realtime::RealtimeChannel;
use crate::utils::IdClock;

#[derive(Default)]
struct MeetingState {
    joined: bool,
    messages: Vec<ChatMessage>,
    roster: BTreeSet<UserId>,
}

/// Side chat of a video call. History lives only as long as the room.
#[derive(Clone)]
pub struct MeetingRoom {
    meeting_id: ConversationId,
    me: Participant,
    channel: RealtimeChannel,
    clock: Arc<IdClock>,
    state: Arc<Mutex<MeetingState>>,
}

impl MeetingRoom {
    pub fn new(meeting_id: ConversationId, me: Participant, channel: RealtimeChannel) -> Self {
        Self {
            meeting_id,
            me,
            channel,
            clock: Arc::new(IdClock::new()),
            state: Arc::new(Mutex::new(MeetingState::default())),
        }
    }

    /// Takes over the channel's meeting slots and announces us to the room.
    pub fn join(&self) {
        let meeting_id = self.meeting_id;

        let state = self.state.clone();
        self.channel.on_meeting_message(move |message| {
            if message.conversation_id == meeting_id {
                state.lock().messages.push(message);
            }
        });
        let state = self.state.clone();
        self.channel.on_user_joined(move |presence| {
            if presence.meeting_id == meeting_id {
                state.lock().roster.insert(presence.user_id);
            }
        });
        let state = self.state.clone();
        self.channel.on_user_left(move |presence| {
            if presence.meeting_id == meeting_id {
                state.lock().roster.remove(&presence.user_id);
            }
        });

        {
            let mut state = self.state.lock();
            state.joined = true;
            state.roster.insert(self.me.id);
        }
        self.channel.join_meeting(meeting_id);
    }

    pub fn leave(&self) {
        {
            let mut state = self.state.lock();
            state.joined = false;
            state.roster.remove(&self.me.id);
        }
        self.channel.leave_meeting(self.meeting_id);
    }

    pub fn send(&self, text: &str) -> Option<ChatMessage> {
        let content = text.trim();
        if content.is_empty() {
            return None;
        }
        if !self.is_joined() {
            debug!("not in meeting {}, ignoring send", self.meeting_id);
            return None;
        }
        let message = ChatMessage {
            id: self.clock.next(),
            sender_id: self.me.id,
            sender_name: self.me.name.clone(),
            content: content.to_string(),
            timestamp: Utc::now(),
            conversation_id: self.meeting_id,
            kind: MessageKind::Text,
        };
        self.state.lock().messages.push(message.clone());
        self.channel.send_meeting_message(self.meeting_id, message.clone());
        Some(message)
    }

    pub fn is_joined(&self) -> bool {
        self.state.lock().joined
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.state.lock().messages.clone()
    }

    pub fn roster(&self) -> Vec<UserId> {
        self.state.lock().roster.iter().copied().collect()
    }
}
