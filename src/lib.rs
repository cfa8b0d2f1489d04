//! podlab Library
//!
//! Client core for a remote AI inference pod: backend API access, the
//! streamed-reply accumulator, the model-status poller, and per-screen
//! state containers. Everything here runs without a rendering surface;
//! the binary only wires these pieces to a terminal.

pub mod api;
pub mod screens;
pub mod storage;
pub mod stream;
pub mod types;
