use teloxide::RequestError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    // Configuration errors
    #[error("Missing required setting: {key}")]
    MissingConfig { key: String },

    #[error("Invalid value for {key}: {message}")]
    InvalidConfig { key: String, message: String },

    // State errors
    #[error("Failed to save state to '{path}': {source}")]
    StateSave {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to load state from '{path}': {source}")]
    StateLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse state file '{path}': {source}")]
    StateParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    // Telegram errors
    #[error("Telegram request {method} failed: {source}")]
    Telegram {
        method: &'static str,
        #[source]
        source: RequestError,
    },

    #[error("Invalid content filter pattern '{pattern}': {source}")]
    FilterPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    // Generic errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl BotError {
    /// Map a failed Bot API request, naming the method for the log line
    pub fn telegram(method: &'static str) -> impl FnOnce(RequestError) -> Self {
        move |source| BotError::Telegram { method, source }
    }

    pub fn missing(key: &str) -> Self {
        BotError::MissingConfig {
            key: key.to_string(),
        }
    }

    pub fn invalid(key: &str, message: impl Into<String>) -> Self {
        BotError::InvalidConfig {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for BotError {
    fn from(err: std::io::Error) -> Self {
        BotError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for BotError {
    fn from(err: serde_json::Error) -> Self {
        BotError::Internal {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
