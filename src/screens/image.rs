//! Image generation screen
//!
//! Sends a prompt, keeps the decoded PNG bytes as the preview.

use tokio_util::sync::{CancellationToken, DropGuard};

use crate::api::MediaBackend;

/// State for the image generation screen.
pub struct ImageScreen {
    image: Option<Vec<u8>>,
    error: Option<String>,
    is_loading: bool,
    cancel: CancellationToken,
    _teardown: DropGuard,
}

impl ImageScreen {
    pub fn new() -> Self {
        let cancel = CancellationToken::new();
        Self {
            image: None,
            error: None,
            is_loading: false,
            cancel: cancel.clone(),
            _teardown: cancel.drop_guard(),
        }
    }

    /// Decoded PNG bytes of the last successful generation.
    pub fn image(&self) -> Option<&[u8]> {
        self.image.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Generate an image for `prompt`.
    ///
    /// A blank prompt is a no-op. The previous preview is cleared up front;
    /// on failure the screen keeps no image and records the error message.
    pub async fn generate(&mut self, backend: &impl MediaBackend, prompt: &str) {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return;
        }

        self.image = None;
        self.error = None;
        self.is_loading = true;

        let cancel = self.cancel.child_token();
        let outcome = tokio::select! {
            _ = cancel.cancelled() => None,
            result = backend.generate_image(prompt) => Some(result),
        };

        self.is_loading = false;
        match outcome {
            Some(Ok(png)) => self.image = Some(png),
            Some(Err(err)) => {
                tracing::warn!("image generation failed: {err}");
                self.error = Some(err.to_string());
            }
            None => {
                tracing::debug!("image generation cancelled");
            }
        }
    }
}

impl Default for ImageScreen {
    fn default() -> Self {
        Self::new()
    }
}
