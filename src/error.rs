use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {endpoint}")]
    Status { status: u16, endpoint: String },

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("could not write config: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("backend offline")]
    Offline,
}

pub type Result<T, E = ChatError> = std::result::Result<T, E>;
