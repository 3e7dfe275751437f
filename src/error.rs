//! Aggregated error type (component M). Each fallible subsystem gets
//! its own `thiserror` enum; `ServerError` collects them via `#[from]`
//! the way the teacher's `CleanError` (`src/error.rs`) collected boxed
//! errors, but keeps them distinguishable instead of erasing to
//! `Box<dyn Error>`.

use thiserror::Error;

use crate::http::ParseError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Config(#[from] serde_yaml::Error),
    #[error("invalid listen address: {0}")]
    Addr(#[from] std::net::AddrParseError),
    #[error("request parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("database error: {0}")]
    Db(#[from] dbpool::DbError),
    #[error("logger error: {0}")]
    Log(#[from] proxy_log::LogError),
    #[error("{0}")]
    Other(String),
}

impl From<&str> for ServerError {
    fn from(s: &str) -> Self {
        ServerError::Other(s.to_string())
    }
}

impl From<String> for ServerError {
    fn from(s: String) -> Self {
        ServerError::Other(s)
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

/// Formats a top-level error the way the teacher's `CleanError` did,
/// for a final print right before the process exits.
pub fn format_fatal(err: &ServerError) -> String {
    format!("\x1b[31mERROR\x1b[0m: {}", err)
}
