//! Model loading screen
//!
//! Issues the load-start request, then polls the status endpoint on a
//! fixed interval until a terminal status arrives. Ready and Error absorb:
//! once reached, no further poll requests are issued for that load.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::api::{LoadModelRequest, ModelBackend, StatusKind};

/// Where a model load currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    /// No load running.
    Idle,
    /// Load accepted; polling the status endpoint.
    Polling,
    /// Terminal: the model is ready.
    Ready,
    /// Terminal: the load failed, was rejected, or timed out.
    Error,
}

impl LoadPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoadPhase::Ready | LoadPhase::Error)
    }
}

/// Published loader state: the phase plus the backend's last status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadState {
    pub phase: LoadPhase,
    pub message: String,
}

impl LoadState {
    fn idle() -> Self {
        Self {
            phase: LoadPhase::Idle,
            message: String::new(),
        }
    }
}

/// State for the model loading screen.
pub struct ModelLoader {
    state: LoadState,
    poll_interval: Duration,
    max_attempts: u32,
    feed: watch::Sender<LoadState>,
    cancel: CancellationToken,
    _teardown: DropGuard,
}

impl ModelLoader {
    pub fn new(poll_interval: Duration, max_attempts: u32) -> Self {
        let state = LoadState::idle();
        let (feed, _) = watch::channel(state.clone());
        let cancel = CancellationToken::new();
        Self {
            state,
            poll_interval,
            max_attempts,
            feed,
            cancel: cancel.clone(),
            _teardown: cancel.drop_guard(),
        }
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    /// Observe state changes, including per-poll status messages.
    pub fn subscribe(&self) -> watch::Receiver<LoadState> {
        self.feed.subscribe()
    }

    /// Token that stops the poll loop when triggered. Dropping the loader
    /// has the same effect; no timer outlives the screen.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Start a load and poll until a terminal status, cancellation, or the
    /// attempt bound is hit.
    ///
    /// A poll whose request fails (transport) is logged and skipped; the
    /// loop carries on at the next tick. A reported `error` status is
    /// terminal. The attempt bound guards against a backend that stays
    /// pending forever.
    pub async fn load(&mut self, backend: &impl ModelBackend, request: &LoadModelRequest) {
        let cancel = self.cancel.child_token();
        self.set_state(LoadPhase::Idle, "Initiating load...");

        let started = tokio::select! {
            _ = cancel.cancelled() => None,
            result = backend.load_model(request) => Some(result),
        };
        match started {
            Some(Ok(())) => {}
            Some(Err(err)) => {
                tracing::warn!(model_id = %request.model_id, "load start failed: {err}");
                let message = if err.is_transport() {
                    "Connection error"
                } else {
                    "Error starting load"
                };
                self.set_state(LoadPhase::Error, message);
                return;
            }
            None => {
                tracing::debug!("model load cancelled before start");
                return;
            }
        }
        self.set_state(LoadPhase::Polling, format!("Loading {}...", request.model_id));

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // An interval's first tick fires immediately; the first poll should
        // happen one full period after the ack.
        ticker.tick().await;

        let mut attempts: u32 = 0;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("model status polling cancelled");
                    return;
                }
                _ = ticker.tick() => {}
            }

            attempts += 1;
            match backend.model_status().await {
                Err(err) => {
                    // Poll failures are not terminal; try again next tick.
                    tracing::warn!("status poll failed: {err}");
                }
                Ok(status) => {
                    let phase = match status.status {
                        StatusKind::Pending => LoadPhase::Polling,
                        StatusKind::Ready => LoadPhase::Ready,
                        StatusKind::Error => LoadPhase::Error,
                    };
                    self.set_state(phase, status.message);
                    if phase.is_terminal() {
                        tracing::info!(model_id = %request.model_id, ?phase, "model load finished");
                        return;
                    }
                }
            }

            if attempts >= self.max_attempts {
                tracing::warn!(
                    model_id = %request.model_id,
                    attempts,
                    "giving up on model load"
                );
                self.set_state(
                    LoadPhase::Error,
                    format!("Model load timed out after {attempts} status checks"),
                );
                return;
            }
        }
    }

    fn set_state(&mut self, phase: LoadPhase, message: impl Into<String>) {
        self.state = LoadState {
            phase,
            message: message.into(),
        };
        let _ = self.feed.send(self.state.clone());
    }
}
