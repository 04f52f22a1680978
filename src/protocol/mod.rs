//! Wire protocol shared by the relay and the terminal client.
//!
//! Every record is a single JSON object terminated by `\n`, discriminated by
//! its `type` field. Unknown fields are ignored; a line that does not parse is
//! a [`DecodeError`] and the caller skips it.

pub mod lines;

use chrono::Local;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub use lines::LineReader;

/// Longest line either side will accept, newline excluded.
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// `MM.DD HH:MM`, stamped by the server.
pub const TIMESTAMP_FORMAT: &str = "%m.%d %H:%M";

/// Records sent from a client to the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Join {
        name: String,
    },
    Chat {
        #[serde(default)]
        text: String,
    },
    Leave,
    /// Roster request.
    List,
}

/// Records sent from the relay to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    Chat {
        name: String,
        #[serde(default)]
        text: String,
        #[serde(default)]
        ts: String,
    },
    System {
        #[serde(default)]
        text: String,
        #[serde(default)]
        ts: String,
    },
    Roster {
        #[serde(default)]
        users: Vec<String>,
        #[serde(default)]
        ts: String,
    },
}

impl ServerMessage {
    pub fn chat(name: impl Into<String>, text: impl Into<String>) -> Self {
        ServerMessage::Chat {
            name: name.into(),
            text: text.into(),
            ts: timestamp_now(),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        ServerMessage::System {
            text: text.into(),
            ts: timestamp_now(),
        }
    }

    pub fn roster(users: Vec<String>) -> Self {
        ServerMessage::Roster {
            users,
            ts: timestamp_now(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed record: {0}")]
    Json(#[from] serde_json::Error),
    #[error("line exceeds {limit} bytes")]
    TooLong { limit: usize },
    #[error("line is not valid UTF-8")]
    InvalidUtf8,
}

/// Serialize one record as a newline-terminated line.
pub fn encode<T: Serialize>(msg: &T) -> serde_json::Result<String> {
    let mut line = serde_json::to_string(msg)?;
    line.push('\n');
    Ok(line)
}

/// Parse one line (with or without its trailing newline).
pub fn decode<T: DeserializeOwned>(line: &str) -> Result<T, DecodeError> {
    Ok(serde_json::from_str(line.trim_end_matches(['\r', '\n']))?)
}

pub fn timestamp_now() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}
