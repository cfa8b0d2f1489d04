//! Screen state containers
//!
//! One module per screen. Each holds its own state, publishes immutable
//! snapshots over a `watch` channel for whatever renders it, and owns a
//! cancellation token whose drop guard tears down in-flight work when the
//! screen goes away. No state is shared between screens.

pub mod analyze;
pub mod chat;
pub mod image;
pub mod loader;

pub use analyze::AnalyzeScreen;
pub use chat::ChatScreen;
pub use image::ImageScreen;
pub use loader::{LoadPhase, LoadState, ModelLoader};
