//! End-to-end chat flows over the in-memory backend and the mock channel.

use std::sync::Arc;
use std::time::Duration;

use alumni_chat::api::events::{RealtimeEvent, TypingIndicator};
use alumni_chat::api::memory::InMemoryBackend;
use alumni_chat::api::models::{ChatMessage, MessageKind, Participant, Presence, Role};
use alumni_chat::api::realtime::{DEFAULT_ECHO_DELAY, RealtimeChannel};
use alumni_chat::chat::{ChatSession, SessionOptions};
use chrono::Utc;

fn jane() -> Participant {
    Participant {
        id: 2,
        name: "Jane Doe".into(),
        role: Role::Mentee,
        status: Presence::Online,
    }
}

async fn session_with(options: SessionOptions) -> (Arc<InMemoryBackend>, ChatSession) {
    let backend = Arc::new(InMemoryBackend::demo());
    let channel = RealtimeChannel::mock(DEFAULT_ECHO_DELAY);
    let session = ChatSession::new(jane(), backend.clone(), channel, options);
    session.start().await;
    (backend, session)
}

fn from_john(conversation_id: i64, content: &str) -> ChatMessage {
    ChatMessage {
        id: 5000,
        sender_id: 1,
        sender_name: "John Smith".into(),
        content: content.into(),
        timestamp: Utc::now(),
        conversation_id,
        kind: MessageKind::Text,
    }
}

#[tokio::test(start_paused = true)]
async fn jane_thanks_john_and_sees_the_echo_twice() {
    let (backend, session) = session_with(SessionOptions::default()).await;
    session.open(1).await;
    let history = session.messages().len();
    assert_eq!(history, 3);

    session.composer().set_draft("Thanks for the advice!");
    let sent = session.composer().submit_draft().unwrap();

    let after_submit = session.messages().messages();
    assert_eq!(after_submit.len(), history + 1);
    let local = after_submit.last().unwrap();
    assert_eq!(local.sender_id, 2);
    assert_eq!(local.content, "Thanks for the advice!");

    tokio::time::sleep(DEFAULT_ECHO_DELAY + Duration::from_millis(10)).await;

    // optimistic copy and echo are not reconciled
    let after_echo = session.messages().messages();
    assert_eq!(after_echo.len(), history + 2);
    assert_eq!(after_echo[history], sent);
    assert_eq!(after_echo[history + 1], sent);

    assert_eq!(backend.sent().len(), 1);
    let conv = session.conversations().get(1).unwrap();
    assert_eq!(conv.unread_count, 0);
    assert_eq!(conv.last_message.unwrap().content, "Thanks for the advice!");
}

#[tokio::test(start_paused = true)]
async fn suppressing_own_echo_keeps_one_copy() {
    let options = SessionOptions {
        suppress_own_echo: true,
        ..SessionOptions::default()
    };
    let (_backend, session) = session_with(options).await;
    session.open(1).await;
    session.send("Thanks for the advice!").unwrap();
    tokio::time::sleep(DEFAULT_ECHO_DELAY * 2).await;
    assert_eq!(session.messages().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn inbound_for_another_conversation_only_bumps_unread() {
    let (_backend, session) = session_with(SessionOptions::default()).await;
    session.open(1).await;
    let before = session.messages().messages();

    session.deliver(from_john(2, "Are you free Thursday?"));

    assert_eq!(session.messages().messages(), before);
    let other = session.conversations().get(2).unwrap();
    assert_eq!(other.unread_count, 2);
    assert_eq!(session.conversations().total_unread(), 2);
}

#[tokio::test(start_paused = true)]
async fn opening_marks_read_locally_and_on_the_server() {
    let (backend, session) = session_with(SessionOptions::default()).await;
    assert_eq!(session.conversations().get(2).unwrap().unread_count, 1);
    session.open(2).await;
    assert_eq!(session.conversations().get(2).unwrap().unread_count, 0);
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(backend.marked_read(), vec![2]);
}

#[tokio::test(start_paused = true)]
async fn offline_backend_degrades_to_empty_views() {
    let backend = Arc::new(InMemoryBackend::demo());
    backend.set_offline(true);
    let session = ChatSession::new(
        jane(),
        backend.clone(),
        RealtimeChannel::mock(DEFAULT_ECHO_DELAY),
        SessionOptions::default(),
    );
    session.start().await;
    assert!(session.conversations().conversations().is_empty());

    session.open(999).await;
    assert!(session.messages().is_empty());
    assert!(session.search("advice", None).await.is_empty());

    // composer still shows the message even though the POST fails
    assert!(session.send("anyone there?").is_some());
    assert_eq!(session.messages().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn typing_from_peers_is_tracked() {
    let (_backend, session) = session_with(SessionOptions::default()).await;
    session.open(1).await;

    let john_typing = TypingIndicator {
        conversation_id: 1,
        user_id: 1,
    };
    // John's indicator, as the transport would deliver it
    let slots = session.channel().listeners();
    assert!(slots.dispatch(RealtimeEvent::TypingStart(john_typing.clone())));
    assert_eq!(session.conversations().typing_in(1), vec![1]);

    // our own indicator echoes back but is not listed
    session.typing(true);
    tokio::time::sleep(DEFAULT_ECHO_DELAY * 2).await;
    assert_eq!(session.conversations().typing_in(1), vec![1]);

    assert!(slots.dispatch(RealtimeEvent::TypingStop(john_typing)));
    assert!(session.conversations().typing_in(1).is_empty());
}

#[tokio::test(start_paused = true)]
async fn search_spans_conversations_unless_scoped() {
    let (_backend, session) = session_with(SessionOptions::default()).await;
    let all = session.search("meeting", None).await;
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].conversation_id, 2);
    assert!(session.search("meeting", Some(1)).await.is_empty());
    assert!(session.search("   ", None).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn closed_session_ignores_late_echoes() {
    let (_backend, session) = session_with(SessionOptions::default()).await;
    session.open(1).await;
    session.send("last words").unwrap();
    session.close();
    tokio::time::sleep(DEFAULT_ECHO_DELAY * 2).await;
    assert_eq!(session.messages().len(), 4);
    assert!(!session.channel().is_connected());
}

#[tokio::test(start_paused = true)]
async fn closed_session_can_start_again() {
    let (_backend, session) = session_with(SessionOptions::default()).await;
    session.close();
    session.start().await;

    assert!(session.channel().is_connected());
    assert_eq!(session.conversations().conversations().len(), 2);
    session.open(1).await;
    assert_eq!(session.messages().len(), 3);

    session.send("back again").unwrap();
    tokio::time::sleep(DEFAULT_ECHO_DELAY * 2).await;
    assert_eq!(session.messages().len(), 5);
}
