pub mod api;
pub mod app;
pub mod chat;
pub mod error;
pub mod utils;

pub use error::{ChatError, Result};
