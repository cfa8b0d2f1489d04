//! Image analysis screen
//!
//! Keeps a selected local file as the preview and submits it for analysis.

use tokio_util::sync::{CancellationToken, DropGuard};

use crate::api::MediaBackend;

/// Shown when the analysis request fails for any reason.
pub const ANALYZE_ERROR: &str = "Error analyzing image.";

/// File picked by the user, held until submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// State for the analysis screen.
pub struct AnalyzeScreen {
    selected: Option<SelectedFile>,
    analysis: Option<String>,
    is_loading: bool,
    cancel: CancellationToken,
    _teardown: DropGuard,
}

impl AnalyzeScreen {
    pub fn new() -> Self {
        let cancel = CancellationToken::new();
        Self {
            selected: None,
            analysis: None,
            is_loading: false,
            cancel: cancel.clone(),
            _teardown: cancel.drop_guard(),
        }
    }

    pub fn selected(&self) -> Option<&SelectedFile> {
        self.selected.as_ref()
    }

    pub fn analysis(&self) -> Option<&str> {
        self.analysis.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Pick a file; clears any previous analysis result.
    pub fn select_file(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.selected = Some(SelectedFile {
            name: name.into(),
            bytes,
        });
        self.analysis = None;
    }

    /// Submit the selected file for analysis.
    ///
    /// Without a selected file this is a no-op. On failure the result text
    /// becomes [`ANALYZE_ERROR`].
    pub async fn analyze(&mut self, backend: &impl MediaBackend) {
        let Some(file) = self.selected.clone() else {
            return;
        };
        self.is_loading = true;

        let cancel = self.cancel.child_token();
        let outcome = tokio::select! {
            _ = cancel.cancelled() => None,
            result = backend.analyze(&file.name, file.bytes) => Some(result),
        };

        self.is_loading = false;
        match outcome {
            Some(Ok(text)) => self.analysis = Some(text),
            Some(Err(err)) => {
                tracing::warn!("analysis failed: {err}");
                self.analysis = Some(ANALYZE_ERROR.to_string());
            }
            None => {
                tracing::debug!("analysis cancelled");
            }
        }
    }
}

impl Default for AnalyzeScreen {
    fn default() -> Self {
        Self::new()
    }
}
