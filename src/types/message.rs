//! Message types
//!
//! Defines chat message structures and the transcript they live in.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message from the user
    User,
    /// Message from the AI assistant
    Assistant,
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message sender
    pub role: Role,
    /// The content of the message
    pub content: String,
}

impl Message {
    /// Create a new message
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Immutable view of a transcript at one point in time.
///
/// Snapshots taken before and after a streaming delta share every entry
/// except the last one, so republishing per chunk stays cheap.
pub type TranscriptSnapshot = Arc<[Arc<Message>]>;

/// Ordered message list for one chat session.
///
/// Append-only, except that the trailing entry may be rewritten in place
/// while a streamed reply is arriving. Not persisted; lives as long as the
/// owning screen.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<Arc<Message>>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to the end of the transcript.
    pub fn push(&mut self, message: Message) {
        self.messages.push(Arc::new(message));
    }

    /// Append streamed text to the content of the last message.
    ///
    /// No-op on an empty transcript.
    pub fn append_to_last(&mut self, delta: &str) {
        if let Some(last) = self.messages.last_mut() {
            let mut updated = (**last).clone();
            updated.content.push_str(delta);
            *last = Arc::new(updated);
        }
    }

    /// Replace the content of the last message wholesale.
    ///
    /// Used when a streamed reply fails and partial content must not survive.
    pub fn replace_last_content(&mut self, content: impl Into<String>) {
        if let Some(last) = self.messages.last_mut() {
            let mut updated = (**last).clone();
            updated.content = content.into();
            *last = Arc::new(updated);
        }
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last().map(|m| m.as_ref())
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().map(|m| m.as_ref())
    }

    /// Take an immutable snapshot sharing storage with the live transcript.
    pub fn snapshot(&self) -> TranscriptSnapshot {
        self.messages.iter().cloned().collect()
    }
}
