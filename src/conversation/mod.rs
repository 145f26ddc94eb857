//! Conversation types and reply accumulation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Number of most recent messages sent to the model as context
pub const HISTORY_WINDOW: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Anything other than `"user"` is treated as a model turn.
impl<'de> Deserialize<'de> for Role {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let role = String::deserialize(deserializer)?;
        Ok(if role == "user" {
            Role::User
        } else {
            Role::Assistant
        })
    }
}

impl Role {
    /// Label used when rendering a turn into prompt text
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// A chat record, persisted wholesale per user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a message and bump `updated_at`
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.updated_at = Utc::now();
    }

    /// The last `HISTORY_WINDOW` messages, in original order
    pub fn recent_history(&self) -> &[Message] {
        recent(&self.messages)
    }

    /// Drop the oldest messages so at most `max` remain
    pub fn retain_latest(&mut self, max: usize) {
        if self.messages.len() > max {
            let excess = self.messages.len() - max;
            self.messages.drain(..excess);
        }
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

/// Suffix of `messages` holding at most `HISTORY_WINDOW` entries
pub fn recent(messages: &[Message]) -> &[Message] {
    let start = messages.len().saturating_sub(HISTORY_WINDOW);
    &messages[start..]
}

/// Accumulates streamed reply chunks into a single assistant message.
///
/// Each chunk is appended whole, so a reader of [`ReplyBuffer::text`] only ever
/// sees the concatenation of the chunks received so far, in arrival order.
#[derive(Debug, Default)]
pub struct ReplyBuffer {
    text: String,
    chunks: usize,
}

impl ReplyBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, chunk: &str) {
        self.text.push_str(chunk);
        self.chunks += 1;
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn chunks(&self) -> usize {
        self.chunks
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn into_message(self) -> Message {
        Message::assistant(self.text)
    }
}
