use alumni_chat::api::models::ChatMessage;
use alumni_chat::app::{AppConfig, build_session};
use alumni_chat::chat::{ChatSession, MeetingRoom};
use alumni_chat::utils::RUNTIME;
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "\
/list              conversations
/open <id>         open a conversation
/close             close the open conversation
/history           messages of the open conversation
/search <text>     search all conversations
/meeting <id>      join a meeting chat (/leave to leave)
/quit
Anything else is sent to the open conversation (or the meeting, once joined).";

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::load();
    let session = match build_session(&config) {
        Ok(session) => session,
        Err(e) => {
            log::error!("Could not start chat session: {}", e);
            std::process::exit(1);
        }
    };
    RUNTIME.block_on(run(session));
}

async fn run(session: ChatSession) {
    session.start().await;
    print_conversations(&session);
    println!("{}", HELP);

    let mut meeting: Option<MeetingRoom> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                log::error!("stdin: {}", e);
                break;
            }
        };
        let (command, arg) = match line.trim().split_once(' ') {
            Some((c, a)) => (c, a.trim()),
            None => (line.trim(), ""),
        };
        match command {
            "/quit" => break,
            "/help" => println!("{}", HELP),
            "/list" => print_conversations(&session),
            "/open" => match arg.parse() {
                Ok(id) => {
                    session.open(id).await;
                    print_history(&session.messages().messages());
                }
                Err(_) => println!("usage: /open <id>"),
            },
            "/close" => session.close_conversation(),
            "/history" => print_history(&session.messages().messages()),
            "/search" => print_history(&session.search(arg, None).await),
            "/meeting" => match arg.parse() {
                Ok(id) => {
                    let room = session.meeting(id);
                    room.join();
                    println!("joined meeting {}", id);
                    meeting = Some(room);
                }
                Err(_) => println!("usage: /meeting <id>"),
            },
            "/leave" => {
                if let Some(room) = meeting.take() {
                    print_history(&room.messages());
                    room.leave();
                }
            }
            _ => {
                let sent = match &meeting {
                    Some(room) => room.send(&line),
                    None => session.send(&line),
                };
                if sent.is_none() && !line.trim().is_empty() {
                    println!("open a conversation first (/open <id>)");
                }
            }
        }
    }
    session.close();
}

fn print_conversations(session: &ChatSession) {
    let me = session.me().id;
    for conv in session.conversations().conversations() {
        let preview = conv
            .last_message
            .as_ref()
            .map(|m| m.content.as_str())
            .unwrap_or("");
        println!("[{}] {} ({} unread) {}", conv.id, conv.title(me), conv.unread_count, preview);
    }
}

fn print_history(messages: &[ChatMessage]) {
    for m in messages {
        println!("{} {}: {}", m.timestamp.format("%H:%M"), m.sender_name, m.content);
    }
}
