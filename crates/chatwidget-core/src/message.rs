//! UI-agnostic conversation types
//!
//! Messages are shared between the widget controller and whatever front end
//! renders them, and don't depend on any specific UI framework.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Greeting shown when a conversation starts or is reset.
pub const GREETING: [&str; 2] = ["Hello! 👋", "How can I help you today?"];

/// A single entry in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Local>,
}

/// Who wrote a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::User,
            timestamp: Local::now(),
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::Bot,
            timestamp: Local::now(),
        }
    }

    pub fn is_bot(&self) -> bool {
        self.sender == Sender::Bot
    }

    /// Timestamp in the short form shown under each message, e.g. "Oct 19, 3:04 PM"
    pub fn display_time(&self) -> String {
        format_timestamp(&self.timestamp)
    }
}

/// The two bot messages every conversation starts with
pub fn greeting() -> Vec<Message> {
    GREETING.iter().map(|text| Message::bot(*text)).collect()
}

pub fn format_timestamp(timestamp: &DateTime<Local>) -> String {
    timestamp.format("%b %-d, %-I:%M %p").to_string()
}
