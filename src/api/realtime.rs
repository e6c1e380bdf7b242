//! Realtime channel: a single-slot listener table in front of a transport.
//!
//! Each event kind has exactly one listener slot. Registering again replaces
//! whatever was there, and `disconnect` empties every slot. The default
//! transport is a mock that plays each published event back to the local
//! slots after a fixed delay.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{debug, trace};
use parking_lot::Mutex;
use tokio::runtime::Handle;

use crate::api::events::{ChannelEvent, MeetingPresence, RealtimeEvent, TypingIndicator};
use crate::api::models::{ChatMessage, ConversationId, UserId};

pub const DEFAULT_ECHO_DELAY: Duration = Duration::from_millis(1000);

pub type Listener = Arc<dyn Fn(RealtimeEvent) + Send + Sync>;

#[derive(Default)]
pub struct Listeners {
    slots: Mutex<HashMap<ChannelEvent, Listener>>,
}

impl Listeners {
    /// Returns true when an earlier listener was displaced.
    pub fn register(&self, slot: ChannelEvent, listener: Listener) -> bool {
        let replaced = self.slots.lock().insert(slot, listener).is_some();
        if replaced {
            debug!("replacing listener for {:?}", slot);
        }
        replaced
    }

    pub fn clear(&self) {
        self.slots.lock().clear();
    }

    pub fn is_registered(&self, slot: ChannelEvent) -> bool {
        self.slots.lock().contains_key(&slot)
    }

    /// Hands the event to whoever holds its slot right now. Returns false if nobody does.
    pub fn dispatch(&self, event: RealtimeEvent) -> bool {
        let slot = event.slot();
        let listener = self.slots.lock().get(&slot).cloned();
        match listener {
            Some(listener) => {
                listener(event);
                true
            }
            None => {
                trace!("no listener for {:?}, dropping event", slot);
                false
            }
        }
    }
}

pub trait Transport: Send + Sync {
    fn open(&self, user_id: UserId, listeners: &Arc<Listeners>);
    fn close(&self);
    fn publish(&self, event: RealtimeEvent, listeners: &Arc<Listeners>);
}

/// Loops every published event back to the local listeners after `delay`.
pub struct MockTransport {
    delay: Duration,
    handle: Handle,
}

impl MockTransport {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            handle: crate::utils::runtime_handle(),
        }
    }
}

impl Transport for MockTransport {
    fn open(&self, user_id: UserId, _listeners: &Arc<Listeners>) {
        debug!("mock realtime channel connected as user {}", user_id);
    }

    fn close(&self) {
        debug!("mock realtime channel disconnected");
    }

    fn publish(&self, event: RealtimeEvent, listeners: &Arc<Listeners>) {
        let listeners = listeners.clone();
        let delay = self.delay;
        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            listeners.dispatch(event);
        });
    }
}

struct ChannelInner {
    connected: AtomicBool,
    user_id: Mutex<Option<UserId>>,
    listeners: Arc<Listeners>,
    transport: Box<dyn Transport>,
}

#[derive(Clone)]
pub struct RealtimeChannel {
    inner: Arc<ChannelInner>,
}

impl RealtimeChannel {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                connected: AtomicBool::new(false),
                user_id: Mutex::new(None),
                listeners: Arc::new(Listeners::default()),
                transport,
            }),
        }
    }

    pub fn mock(delay: Duration) -> Self {
        Self::new(Box::new(MockTransport::new(delay)))
    }

    pub fn connect(&self, user_id: UserId) {
        if self.inner.connected.swap(true, Ordering::SeqCst) {
            debug!("realtime channel already connected");
            return;
        }
        *self.inner.user_id.lock() = Some(user_id);
        self.inner.transport.open(user_id, &self.inner.listeners);
    }

    pub fn disconnect(&self) {
        self.inner.connected.store(false, Ordering::SeqCst);
        *self.inner.user_id.lock() = None;
        self.inner.listeners.clear();
        self.inner.transport.close();
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    pub fn listeners(&self) -> &Arc<Listeners> {
        &self.inner.listeners
    }

    pub fn on_message<F>(&self, callback: F)
    where
        F: Fn(ChatMessage) + Send + Sync + 'static,
    {
        self.register(ChannelEvent::Message, move |event| {
            if let RealtimeEvent::Message(message) = event {
                callback(message);
            }
        });
    }

    pub fn on_meeting_message<F>(&self, callback: F)
    where
        F: Fn(ChatMessage) + Send + Sync + 'static,
    {
        self.register(ChannelEvent::MeetingMessage, move |event| {
            if let RealtimeEvent::MeetingMessage(message) = event {
                callback(message);
            }
        });
    }

    pub fn on_user_joined<F>(&self, callback: F)
    where
        F: Fn(MeetingPresence) + Send + Sync + 'static,
    {
        self.register(ChannelEvent::UserJoined, move |event| {
            if let RealtimeEvent::UserJoined(presence) = event {
                callback(presence);
            }
        });
    }

    pub fn on_user_left<F>(&self, callback: F)
    where
        F: Fn(MeetingPresence) + Send + Sync + 'static,
    {
        self.register(ChannelEvent::UserLeft, move |event| {
            if let RealtimeEvent::UserLeft(presence) = event {
                callback(presence);
            }
        });
    }

    pub fn on_typing_start<F>(&self, callback: F)
    where
        F: Fn(TypingIndicator) + Send + Sync + 'static,
    {
        self.register(ChannelEvent::TypingStart, move |event| {
            if let RealtimeEvent::TypingStart(typing) = event {
                callback(typing);
            }
        });
    }

    pub fn on_typing_stop<F>(&self, callback: F)
    where
        F: Fn(TypingIndicator) + Send + Sync + 'static,
    {
        self.register(ChannelEvent::TypingStop, move |event| {
            if let RealtimeEvent::TypingStop(typing) = event {
                callback(typing);
            }
        });
    }

    fn register<F>(&self, slot: ChannelEvent, listener: F)
    where
        F: Fn(RealtimeEvent) + Send + Sync + 'static,
    {
        self.inner.listeners.register(slot, Arc::new(listener));
    }

    /// Fire-and-forget. The message is not checked against anything already shown locally.
    pub fn send_message(&self, conversation_id: ConversationId, message: ChatMessage) {
        debug!("relaying message {} in conversation {}", message.id, conversation_id);
        self.publish(RealtimeEvent::Message(message));
    }

    pub fn send_meeting_message(&self, meeting_id: ConversationId, message: ChatMessage) {
        debug!("relaying meeting message {} in meeting {}", message.id, meeting_id);
        self.publish(RealtimeEvent::MeetingMessage(message));
    }

    pub fn join_meeting(&self, meeting_id: ConversationId) {
        if let Some(user_id) = self.current_user() {
            self.publish(RealtimeEvent::UserJoined(MeetingPresence { meeting_id, user_id }));
        }
    }

    pub fn leave_meeting(&self, meeting_id: ConversationId) {
        if let Some(user_id) = self.current_user() {
            self.publish(RealtimeEvent::UserLeft(MeetingPresence { meeting_id, user_id }));
        }
    }

    pub fn start_typing(&self, conversation_id: ConversationId) {
        if let Some(user_id) = self.current_user() {
            self.publish(RealtimeEvent::TypingStart(TypingIndicator { conversation_id, user_id }));
        }
    }

    pub fn stop_typing(&self, conversation_id: ConversationId) {
        if let Some(user_id) = self.current_user() {
            self.publish(RealtimeEvent::TypingStop(TypingIndicator { conversation_id, user_id }));
        }
    }

    fn current_user(&self) -> Option<UserId> {
        let user = *self.inner.user_id.lock();
        if user.is_none() {
            debug!("realtime channel not connected, dropping presence event");
        }
        user
    }

    fn publish(&self, event: RealtimeEvent) {
        self.inner.transport.publish(event, &self.inner.listeners);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::MessageKind;
    use chrono::Utc;
    use std::sync::atomic::AtomicUsize;

    fn msg(id: i64) -> ChatMessage {
        ChatMessage {
            id,
            sender_id: 2,
            sender_name: "Jane Doe".into(),
            content: "hello".into(),
            timestamp: Utc::now(),
            conversation_id: 1,
            kind: MessageKind::Text,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn echo_arrives_after_the_delay() {
        let channel = RealtimeChannel::mock(DEFAULT_ECHO_DELAY);
        let got = Arc::new(Mutex::new(Vec::new()));
        let sink = got.clone();
        channel.on_message(move |m| sink.lock().push(m));

        let sent = msg(5);
        channel.send_message(1, sent.clone());
        tokio::time::sleep(Duration::from_millis(999)).await;
        assert!(got.lock().is_empty());
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(*got.lock(), vec![sent]);
    }

    #[tokio::test(start_paused = true)]
    async fn second_registration_replaces_the_first() {
        let channel = RealtimeChannel::mock(DEFAULT_ECHO_DELAY);
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let f = first.clone();
        channel.on_message(move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        });
        let s = second.clone();
        channel.on_message(move |_| {
            s.fetch_add(1, Ordering::SeqCst);
        });

        channel.send_message(1, msg(1));
        tokio::time::sleep(DEFAULT_ECHO_DELAY * 2).await;
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_clears_every_slot() {
        let channel = RealtimeChannel::mock(DEFAULT_ECHO_DELAY);
        channel.connect(2);
        channel.connect(2);
        assert!(channel.is_connected());

        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        channel.on_message(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        channel.on_typing_start(|_| {});
        channel.send_message(1, msg(1));
        channel.disconnect();

        assert!(!channel.is_connected());
        assert!(!channel.listeners().is_registered(ChannelEvent::Message));
        assert!(!channel.listeners().is_registered(ChannelEvent::TypingStart));
        tokio::time::sleep(DEFAULT_ECHO_DELAY * 2).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn typing_needs_a_connected_user() {
        let channel = RealtimeChannel::mock(Duration::from_millis(10));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        channel.on_typing_start(move |t| sink.lock().push(t));

        channel.start_typing(1);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(seen.lock().is_empty());

        channel.connect(2);
        channel.on_typing_start({
            let sink = seen.clone();
            move |t| sink.lock().push(t)
        });
        channel.start_typing(1);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            *seen.lock(),
            vec![TypingIndicator {
                conversation_id: 1,
                user_id: 2
            }]
        );
    }
}
