//! Backend API surface
//!
//! Everything the screens need from the remote inference pod lives behind
//! the traits in this module, so the state machines can be exercised with
//! scripted fakes instead of a live HTTP server.

pub mod client;
pub mod types;

use async_trait::async_trait;
use bytes::Bytes;
#[cfg(test)]
use std::collections::VecDeque;
use thiserror::Error;

pub use client::PodClient;
pub use types::{ChatRequest, LoadModelRequest, LoadStatus, ModelKind, StatusKind};

/// Backend call errors.
///
/// Transport failures (connection refused, DNS, aborted body) are kept
/// apart from errors the backend itself reported, so callers can react
/// differently to each.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a usable HTTP response.
    #[error("transport error: {0}")]
    Transport(String),
    /// The backend answered with a non-success status.
    #[error("backend error ({status}): {message}")]
    Backend { status: u16, message: String },
    /// The response arrived but could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Transport(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Transport(err.to_string())
    }
}

/// Chat completion operations.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// One-shot completion; the reply arrives as a single JSON body.
    async fn chat(&self, request: &ChatRequest) -> Result<String, ApiError>;

    /// Streamed completion; the reply arrives as ordered text chunks.
    async fn chat_stream(&self, request: &ChatRequest) -> Result<ChunkStream, ApiError>;
}

/// Image generation and analysis operations.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Generate an image for `prompt`, returning decoded PNG bytes.
    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>, ApiError>;

    /// Upload an image and return the backend's textual analysis.
    async fn analyze(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, ApiError>;
}

/// Model lifecycle operations.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Ask the backend to start loading a model. 2xx means accepted.
    async fn load_model(&self, request: &LoadModelRequest) -> Result<(), ApiError>;

    /// Fetch the current model-loading status.
    async fn model_status(&self) -> Result<LoadStatus, ApiError>;
}

/// Ordered source of raw body chunks from a streamed response.
///
/// Wraps `reqwest`'s chunked body reads; tests substitute a scripted
/// sequence of chunks and failures.
pub struct ChunkStream {
    source: Source,
}

enum Source {
    Http(reqwest::Response),
    #[cfg(test)]
    Scripted(VecDeque<Result<Bytes, ApiError>>),
}

impl ChunkStream {
    pub(crate) fn http(response: reqwest::Response) -> Self {
        Self {
            source: Source::Http(response),
        }
    }

    #[cfg(test)]
    pub(crate) fn scripted(chunks: Vec<Result<Bytes, ApiError>>) -> Self {
        Self {
            source: Source::Scripted(VecDeque::from(chunks)),
        }
    }

    /// Next chunk of the body, or `None` once the stream is complete.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, ApiError> {
        match &mut self.source {
            Source::Http(response) => Ok(response.chunk().await?),
            #[cfg(test)]
            Source::Scripted(chunks) => match chunks.pop_front() {
                None => Ok(None),
                Some(Ok(bytes)) => Ok(Some(bytes)),
                Some(Err(err)) => Err(err),
            },
        }
    }
}
