//! Chat screen
//!
//! Holds the conversation transcript and drives a streamed reply into the
//! trailing placeholder message, republishing a snapshot on every decoded
//! chunk so observers can render incremental growth.

use tokio::sync::watch;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::api::{ChatBackend, ChatRequest};
use crate::stream;
use crate::types::{Message, Role, Transcript, TranscriptSnapshot};

/// Shown in place of a reply when the backend cannot be reached or the
/// stream breaks. Partial content is never kept.
pub const CONNECTION_ERROR: &str = "Error: Could not connect to backend.";

/// State for the chat screen.
pub struct ChatScreen {
    transcript: Transcript,
    is_loading: bool,
    max_length: u32,
    feed: watch::Sender<TranscriptSnapshot>,
    cancel: CancellationToken,
    _teardown: DropGuard,
}

impl ChatScreen {
    pub fn new(max_length: u32) -> Self {
        let transcript = Transcript::new();
        let (feed, _) = watch::channel(transcript.snapshot());
        let cancel = CancellationToken::new();
        Self {
            transcript,
            is_loading: false,
            max_length,
            feed,
            cancel: cancel.clone(),
            _teardown: cancel.drop_guard(),
        }
    }

    /// Screen whose transcript opens with an assistant greeting.
    pub fn with_greeting(max_length: u32, greeting: impl Into<String>) -> Self {
        let mut screen = Self::new(max_length);
        screen.transcript.push(Message::new(Role::Assistant, greeting));
        screen.publish();
        screen
    }

    /// Observe transcript snapshots as they are republished.
    pub fn subscribe(&self) -> watch::Receiver<TranscriptSnapshot> {
        self.feed.subscribe()
    }

    /// Teardown token: cancelling it aborts any in-flight send and makes
    /// every later send a no-op. Dropping the screen has the same effect.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Send `input` and stream the reply into the transcript.
    ///
    /// Empty or whitespace-only input is dropped without a network call or
    /// any transcript mutation, as is any send after the teardown token has
    /// been cancelled. Otherwise the user message and an empty
    /// assistant placeholder are appended and published before the request
    /// is issued; each decoded chunk then grows the placeholder. A single
    /// attempt is made; on transport or stream failure the placeholder
    /// content is replaced with [`CONNECTION_ERROR`].
    pub async fn send_message(&mut self, backend: &impl ChatBackend, input: &str) {
        if self.cancel.is_cancelled() {
            tracing::debug!("chat screen torn down; send dropped");
            return;
        }
        let text = input.trim();
        if text.is_empty() {
            return;
        }

        self.transcript.push(Message::new(Role::User, text));
        let request = self.build_request();
        self.transcript.push(Message::new(Role::Assistant, ""));
        self.is_loading = true;
        self.publish();

        let cancel = self.cancel.child_token();
        let outcome = {
            let transcript = &mut self.transcript;
            let feed = &self.feed;
            tokio::select! {
                _ = cancel.cancelled() => None,
                result = async {
                    let mut chunks = backend.chat_stream(&request).await?;
                    stream::drain_into(&mut chunks, |delta| {
                        transcript.append_to_last(delta);
                        let _ = feed.send(transcript.snapshot());
                    })
                    .await
                } => Some(result),
            }
        };

        self.is_loading = false;
        match outcome {
            Some(Ok(())) => {}
            Some(Err(err)) => {
                tracing::warn!("chat request failed: {err}");
                self.transcript.replace_last_content(CONNECTION_ERROR);
            }
            None => {
                tracing::debug!("chat send cancelled");
            }
        }
        self.publish();
    }

    /// Non-streamed variant: the whole reply arrives as one JSON body and
    /// is appended as a single assistant message.
    pub async fn send_message_once(&mut self, backend: &impl ChatBackend, input: &str) {
        if self.cancel.is_cancelled() {
            tracing::debug!("chat screen torn down; send dropped");
            return;
        }
        let text = input.trim();
        if text.is_empty() {
            return;
        }

        self.transcript.push(Message::new(Role::User, text));
        let request = self.build_request();
        self.is_loading = true;
        self.publish();

        let cancel = self.cancel.child_token();
        let outcome = tokio::select! {
            _ = cancel.cancelled() => None,
            result = backend.chat(&request) => Some(result),
        };

        self.is_loading = false;
        match outcome {
            Some(Ok(reply)) => self.transcript.push(Message::new(Role::Assistant, reply)),
            Some(Err(err)) => {
                tracing::warn!("chat request failed: {err}");
                self.transcript
                    .push(Message::new(Role::Assistant, CONNECTION_ERROR));
            }
            None => {
                tracing::debug!("chat send cancelled");
            }
        }
        self.publish();
    }

    /// Conversation to send, excluding a trailing empty placeholder.
    fn build_request(&self) -> ChatRequest {
        let mut messages: Vec<Message> = self.transcript.iter().cloned().collect();
        if messages
            .last()
            .map(|m| m.role == Role::Assistant && m.content.is_empty())
            .unwrap_or(false)
        {
            messages.pop();
        }
        ChatRequest {
            messages,
            max_length: self.max_length,
        }
    }

    fn publish(&self) {
        let _ = self.feed.send(self.transcript.snapshot());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, ChunkStream};
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Scripted chat backend: hands out one chunk script per call, records
    /// the requests it saw.
    struct FakeChat {
        script: Mutex<Option<Vec<Result<Bytes, ApiError>>>>,
        reply: Option<String>,
        delay: Duration,
        calls: AtomicUsize,
        last_request: Mutex<Option<ChatRequest>>,
    }

    impl FakeChat {
        fn streaming(chunks: Vec<Result<Bytes, ApiError>>) -> Self {
            Self {
                script: Mutex::new(Some(chunks)),
                reply: None,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            }
        }

        fn unreachable_backend() -> Self {
            Self {
                script: Mutex::new(None),
                reply: None,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            }
        }

        fn with_reply(reply: &str) -> Self {
            Self {
                script: Mutex::new(None),
                reply: Some(reply.to_string()),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            }
        }

        fn delayed(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatBackend for FakeChat {
        async fn chat(&self, request: &ChatRequest) -> Result<String, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(request.clone());
            match &self.reply {
                Some(reply) => Ok(reply.clone()),
                None => Err(ApiError::Transport("connection refused".into())),
            }
        }

        async fn chat_stream(&self, request: &ChatRequest) -> Result<ChunkStream, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(request.clone());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match self.script.lock().unwrap().take() {
                Some(chunks) => Ok(ChunkStream::scripted(chunks)),
                None => Err(ApiError::Transport("connection refused".into())),
            }
        }
    }

    #[tokio::test]
    async fn test_whitespace_input_is_dropped() {
        let backend = FakeChat::streaming(vec![]);
        let mut screen = ChatScreen::new(200);
        screen.send_message(&backend, "   \n\t").await;
        assert_eq!(backend.calls(), 0);
        assert!(screen.transcript().is_empty());
        assert!(!screen.is_loading());
    }

    #[tokio::test]
    async fn test_streamed_reply_accumulates_in_order() {
        let backend = FakeChat::streaming(vec![
            Ok(Bytes::from_static(b"Bonjour")),
            Ok(Bytes::from_static(b", ")),
            Ok(Bytes::from_static(b"monde!")),
        ]);
        let mut screen = ChatScreen::new(200);
        screen.send_message(&backend, "Hello").await;

        let messages: Vec<_> = screen.transcript().iter().cloned().collect();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], Message::new(Role::User, "Hello"));
        assert_eq!(messages[1], Message::new(Role::Assistant, "Bonjour, monde!"));
        assert!(!screen.is_loading());

        // The placeholder is not part of the request body.
        let request = backend.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(request.messages, vec![Message::new(Role::User, "Hello")]);
        assert_eq!(request.max_length, 200);
    }

    #[tokio::test]
    async fn test_multibyte_chunk_boundary_survives() {
        // "🌍" split across two chunks.
        let backend = FakeChat::streaming(vec![
            Ok(Bytes::from_static(&[0xf0, 0x9f])),
            Ok(Bytes::from_static(&[0x8c, 0x8d])),
        ]);
        let mut screen = ChatScreen::new(200);
        screen.send_message(&backend, "emoji").await;
        assert_eq!(screen.transcript().last().unwrap().content, "🌍");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_placeholder_published_before_reply_resolves() {
        let backend =
            FakeChat::streaming(vec![Ok(Bytes::from_static(b"hi"))]).delayed(Duration::from_millis(50));
        let mut screen = ChatScreen::new(200);

        let mut rx = screen.subscribe();
        let seen: Arc<Mutex<Vec<TranscriptSnapshot>>> = Arc::new(Mutex::new(Vec::new()));
        let collector = {
            let seen = seen.clone();
            tokio::spawn(async move {
                while rx.changed().await.is_ok() {
                    seen.lock().unwrap().push(rx.borrow_and_update().clone());
                }
            })
        };

        screen.send_message(&backend, "Hello").await;
        drop(screen);
        collector.await.unwrap();

        let seen = seen.lock().unwrap();
        let placeholder = seen.iter().find(|snap| {
            snap.len() == 2 && snap[1].role == Role::Assistant && snap[1].content.is_empty()
        });
        assert!(
            placeholder.is_some(),
            "no snapshot with an empty assistant placeholder was published"
        );
        let placeholder = placeholder.unwrap();
        assert_eq!(placeholder[0].role, Role::User);
        assert_eq!(placeholder[0].content, "Hello");
    }

    #[tokio::test]
    async fn test_send_after_teardown_is_dropped() {
        let backend = FakeChat::streaming(vec![Ok(Bytes::from_static(b"hi"))]);
        let mut screen = ChatScreen::new(200);
        screen.cancel_handle().cancel();

        screen.send_message(&backend, "Hello").await;
        assert_eq!(backend.calls(), 0);
        assert!(screen.transcript().is_empty());

        screen.send_message_once(&backend, "Hello").await;
        assert_eq!(backend.calls(), 0);
        assert!(screen.transcript().is_empty());
    }

    #[tokio::test]
    async fn test_greeting_opens_transcript_and_rides_in_request() {
        let backend = FakeChat::streaming(vec![Ok(Bytes::from_static(b"Sure."))]);
        let greeting = "Hello! I am your AI assistant. How can I help you today?";
        let mut screen = ChatScreen::with_greeting(200, greeting);

        assert_eq!(screen.transcript().len(), 1);
        assert_eq!(
            *screen.transcript().last().unwrap(),
            Message::new(Role::Assistant, greeting)
        );

        screen.send_message(&backend, "Hi").await;
        let request = backend.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(
            request.messages,
            vec![
                Message::new(Role::Assistant, greeting),
                Message::new(Role::User, "Hi"),
            ]
        );
        assert_eq!(screen.transcript().len(), 3);
        assert_eq!(screen.transcript().last().unwrap().content, "Sure.");
    }

    #[tokio::test]
    async fn test_transport_failure_yields_fixed_error_entry() {
        let backend = FakeChat::unreachable_backend();
        let mut screen = ChatScreen::new(200);
        screen.send_message(&backend, "Hello").await;

        assert_eq!(screen.transcript().len(), 2);
        let last = screen.transcript().last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content, CONNECTION_ERROR);
    }

    #[tokio::test]
    async fn test_mid_stream_failure_discards_partial_content() {
        let backend = FakeChat::streaming(vec![
            Ok(Bytes::from_static(b"partial rep")),
            Err(ApiError::Transport("connection reset".into())),
        ]);
        let mut screen = ChatScreen::new(200);
        screen.send_message(&backend, "Hello").await;

        assert_eq!(screen.transcript().len(), 2);
        let last = screen.transcript().last().unwrap();
        assert_eq!(last.content, CONNECTION_ERROR);
        assert!(!last.content.contains("partial"));
    }

    #[tokio::test]
    async fn test_single_attempt_no_retry() {
        let backend = FakeChat::unreachable_backend();
        let mut screen = ChatScreen::new(200);
        screen.send_message(&backend, "Hello").await;
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_send_once_appends_whole_reply() {
        let backend = FakeChat::with_reply("Hi there.");
        let mut screen = ChatScreen::new(200);
        screen.send_message_once(&backend, "Hello").await;

        let messages: Vec<_> = screen.transcript().iter().cloned().collect();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1], Message::new(Role::Assistant, "Hi there."));
    }

    #[tokio::test]
    async fn test_send_once_transport_failure() {
        let backend = FakeChat::unreachable_backend();
        let mut screen = ChatScreen::new(200);
        screen.send_message_once(&backend, "Hello").await;
        assert_eq!(screen.transcript().last().unwrap().content, CONNECTION_ERROR);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_stops_in_flight_send() {
        let backend = Arc::new(
            FakeChat::streaming(vec![Ok(Bytes::from_static(b"hi"))])
                .delayed(Duration::from_secs(30)),
        );
        let mut screen = ChatScreen::new(200);
        let handle = screen.cancel_handle();

        let task = {
            let backend = backend.clone();
            tokio::spawn(async move {
                screen.send_message(backend.as_ref(), "Hello").await;
                screen
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.cancel();

        let screen = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("send did not unwind after cancellation")
            .unwrap();
        assert!(!screen.is_loading());
        // Placeholder stays as-is; the fixed error string is for failures,
        // not teardown.
        assert_eq!(screen.transcript().last().unwrap().content, "");
    }
}
