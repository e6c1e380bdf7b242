use directories::BaseDirs;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::api::ChatBackend;
use crate::api::client::ApiClient;
use crate::api::memory::InMemoryBackend;
use crate::api::models::{Participant, Presence, Role, UserId};
use crate::api::realtime::RealtimeChannel;
use crate::api::socket::WebSocketTransport;
use crate::chat::{ChatSession, SessionOptions};
use crate::error::Result;
use crate::utils::normalize_url;

pub const CONFIG_ENV: &str = "ALUMNI_CHAT_CONFIG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Mock,
    Websocket,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Empty means offline demo mode.
    pub base_url: String,
    pub token: Option<String>,
    pub user_id: UserId,
    pub user_name: String,
    pub role: Role,
    pub transport: TransportKind,
    pub ws_url: Option<String>,
    pub echo_delay_ms: u64,
    pub page_size: u32,
    pub suppress_own_echo: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token: None,
            user_id: 2,
            user_name: "Jane Doe".to_string(),
            role: Role::Mentee,
            transport: TransportKind::Mock,
            ws_url: None,
            echo_delay_ms: 1000,
            page_size: crate::chat::messages::DEFAULT_PAGE_SIZE,
            suppress_own_echo: false,
        }
    }
}

impl AppConfig {
    pub fn config_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        let base = BaseDirs::new()?;
        Some(base.config_dir().join("alumni-chat.toml"))
    }

    /// Reads the config file, falling back to defaults when it is missing or broken.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring config at {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    pub fn save(&self) -> Result<()> {
        match Self::config_path() {
            Some(path) => self.save_to(&path),
            None => Err(std::io::Error::new(std::io::ErrorKind::NotFound, "No config dir").into()),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn me(&self) -> Participant {
        Participant {
            id: self.user_id,
            name: self.user_name.clone(),
            role: self.role,
            status: Presence::Online,
        }
    }

    /// Explicit `ws_url`, or `<base_url>/ws` with the scheme swapped to ws/wss.
    pub fn realtime_url(&self) -> Option<String> {
        if let Some(url) = &self.ws_url {
            return Some(url.clone());
        }
        if self.base_url.trim().is_empty() {
            return None;
        }
        let base = normalize_url(&self.base_url);
        let base = base.trim_end_matches('/');
        let ws = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base.to_string()
        };
        Some(format!("{}/ws", ws))
    }

    pub fn options(&self) -> SessionOptions {
        SessionOptions {
            page_size: self.page_size,
            suppress_own_echo: self.suppress_own_echo,
        }
    }
}

pub fn build_session(config: &AppConfig) -> Result<ChatSession> {
    let backend: Arc<dyn ChatBackend> = if config.base_url.trim().is_empty() {
        info!("No server configured, using demo conversations");
        Arc::new(InMemoryBackend::demo_as(&config.me()))
    } else {
        Arc::new(ApiClient::new(&normalize_url(&config.base_url), config.token.clone())?)
    };

    let channel = match (config.transport, config.realtime_url()) {
        (TransportKind::Websocket, Some(url)) => RealtimeChannel::new(Box::new(WebSocketTransport::new(&url)?)),
        (TransportKind::Websocket, None) => {
            warn!("WebSocket transport needs a server or ws_url, falling back to the mock channel");
            RealtimeChannel::mock(Duration::from_millis(config.echo_delay_ms))
        }
        (TransportKind::Mock, _) => RealtimeChannel::mock(Duration::from_millis(config.echo_delay_ms)),
    };

    Ok(ChatSession::new(config.me(), backend, channel, config.options()))
}
