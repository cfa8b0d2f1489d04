//! Core data types shared across screens.

pub mod message;

pub use message::{Message, Role, Transcript, TranscriptSnapshot};
