use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use crate::api::events::RealtimeEvent;
use crate::api::models::UserId;
use crate::api::realtime::{Listeners, Transport};
use crate::error::Result;

struct Connection {
    outbound: mpsc::UnboundedSender<RealtimeEvent>,
    task: JoinHandle<()>,
}

/// Carries realtime events as JSON text frames over a WebSocket.
pub struct WebSocketTransport {
    url: Url,
    handle: Handle,
    conn: Mutex<Option<Connection>>,
}

impl WebSocketTransport {
    pub fn new(ws_url: &str) -> Result<Self> {
        Ok(Self {
            url: Url::parse(ws_url)?,
            handle: crate::utils::runtime_handle(),
            conn: Mutex::new(None),
        })
    }
}

impl Transport for WebSocketTransport {
    fn open(&self, user_id: UserId, listeners: &Arc<Listeners>) {
        let mut url = self.url.clone();
        url.query_pairs_mut().append_pair("userId", &user_id.to_string());
        let (tx, rx) = mpsc::unbounded_channel();
        let task = self.handle.spawn(run(url, rx, listeners.clone()));
        if let Some(old) = self.conn.lock().replace(Connection { outbound: tx, task }) {
            old.task.abort();
        }
    }

    fn close(&self) {
        if let Some(conn) = self.conn.lock().take() {
            conn.task.abort();
        }
    }

    fn publish(&self, event: RealtimeEvent, _listeners: &Arc<Listeners>) {
        match self.conn.lock().as_ref() {
            Some(conn) => {
                if conn.outbound.send(event).is_err() {
                    warn!("WebSocket writer is gone, dropping event");
                }
            }
            None => debug!("WebSocket not open, dropping event"),
        }
    }
}

async fn run(url: Url, mut outbound: mpsc::UnboundedReceiver<RealtimeEvent>, listeners: Arc<Listeners>) {
    let (ws_stream, _) = match connect_async(url.as_str()).await {
        Ok(pair) => pair,
        Err(e) => {
            warn!("WebSocket connect to {} failed: {}", url, e);
            return;
        }
    };
    info!("WebSocket connected");
    let (mut sink, mut stream) = ws_stream.split();

    loop {
        tokio::select! {
            event = outbound.recv() => {
                let Some(event) = event else { break };
                match serde_json::to_string(&event) {
                    Ok(text) => {
                        if let Err(e) = sink.send(Message::Text(text)).await {
                            warn!("WebSocket send failed: {}", e);
                            break;
                        }
                    }
                    Err(e) => warn!("could not encode realtime event: {}", e),
                }
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<RealtimeEvent>(&text) {
                    Ok(event) => {
                        listeners.dispatch(event);
                    }
                    Err(e) => warn!("ignoring malformed realtime frame: {}", e),
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("WebSocket read failed: {}", e);
                    break;
                }
            }
        }
    }
    info!("WebSocket closed");
}
