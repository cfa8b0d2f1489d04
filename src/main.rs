//! podlab CLI
//!
//! Thin REPL over the library screens: plain lines are chatted and the
//! reply streams to stdout; slash commands drive the other screens.

use std::io::Write as _;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use podlab::api::{LoadModelRequest, ModelKind, PodClient};
use podlab::screens::{AnalyzeScreen, ChatScreen, ImageScreen, ModelLoader};
use podlab::storage;
use podlab::types::{Role, TranscriptSnapshot};

const GREETING: &str = "Hello! I am your AI assistant. How can I help you today?";

const HELP: &str = "commands:
  /load <model_id> <chat|image|vision>   load a model and wait for it
  /ask <prompt>                          one-shot chat (no streaming)
  /image <prompt>                        generate an image (podlab-image.png)
  /analyze <path>                        upload an image for analysis
  /backend <url>                         switch backend origin (persisted)
  /quit                                  exit
anything else is sent as a chat message and streamed back";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let mut settings = storage::load_settings();
    if let Ok(url) = std::env::var("PODLAB_URL") {
        settings.backend_url = url;
        settings.validate();
    }
    let mut client = PodClient::new(settings.backend_url.clone());
    tracing::info!(backend = %client.base_url(), "podlab starting");

    let mut chat = ChatScreen::with_greeting(settings.max_length, GREETING);
    let mut image = ImageScreen::new();
    let mut analyze = AnalyzeScreen::new();
    let mut loader = ModelLoader::new(
        Duration::from_millis(settings.poll_interval_ms),
        settings.max_poll_attempts,
    );

    let printer = spawn_transcript_printer(&chat);
    let status_printer = spawn_status_printer(&loader);

    println!("podlab - backend {}", client.base_url());
    println!("{HELP}");
    println!("{GREETING}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        let _ = std::io::stdout().flush();
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) | Err(_) => break,
        };
        let line = line.trim();

        if line.is_empty() {
            continue;
        } else if line == "/quit" || line == "/exit" {
            break;
        } else if line == "/help" {
            println!("{HELP}");
        } else if let Some(rest) = line.strip_prefix("/load ") {
            run_load(&mut loader, &client, rest).await;
        } else if let Some(prompt) = line.strip_prefix("/ask ") {
            chat.send_message_once(&client, prompt).await;
            println!();
        } else if let Some(prompt) = line.strip_prefix("/image ") {
            run_image(&mut image, &client, prompt).await;
        } else if let Some(path) = line.strip_prefix("/analyze ") {
            run_analyze(&mut analyze, &client, path).await;
        } else if let Some(url) = line.strip_prefix("/backend ") {
            settings.backend_url = url.trim().to_string();
            settings.validate();
            client = PodClient::new(settings.backend_url.clone());
            match storage::save_settings(&settings) {
                Ok(()) => println!("backend set to {} (saved)", client.base_url()),
                Err(err) => {
                    tracing::warn!("could not save settings: {err}");
                    println!("backend set to {} (not saved: {err})", client.base_url());
                }
            }
        } else if line.starts_with('/') {
            println!("unknown command; try /help");
        } else {
            chat.send_message(&client, line).await;
            println!();
        }
    }

    drop(chat);
    drop(loader);
    let _ = printer.await;
    let _ = status_printer.await;
}

/// Print streamed assistant deltas as transcript snapshots arrive.
fn spawn_transcript_printer(chat: &ChatScreen) -> tokio::task::JoinHandle<()> {
    let mut feed = chat.subscribe();
    tokio::spawn(async move {
        let mut printer = DeltaPrinter::new();
        while feed.changed().await.is_ok() {
            let snapshot = feed.borrow_and_update().clone();
            if let Some(text) = printer.delta(&snapshot) {
                print!("{text}");
                let _ = std::io::stdout().flush();
            }
        }
    })
}

/// Tracks what of the trailing assistant message is already on screen and
/// turns each snapshot into the text still to print.
struct DeltaPrinter {
    entries: usize,
    printed: String,
}

impl DeltaPrinter {
    fn new() -> Self {
        Self {
            entries: 0,
            printed: String::new(),
        }
    }

    fn delta(&mut self, snapshot: &TranscriptSnapshot) -> Option<String> {
        if snapshot.len() != self.entries {
            self.entries = snapshot.len();
            self.printed.clear();
        }
        let last = snapshot.last()?;
        if last.role != Role::Assistant || last.content == self.printed {
            return None;
        }
        let out = match last.content.strip_prefix(self.printed.as_str()) {
            Some(suffix) => suffix.to_string(),
            // Content no longer extends what was printed: the message was
            // replaced wholesale (failed stream). Reprint it on its own line.
            None => format!("\n{}", last.content),
        };
        self.printed = last.content.clone();
        Some(out)
    }
}

/// Echo model-loading status lines as they change.
fn spawn_status_printer(loader: &ModelLoader) -> tokio::task::JoinHandle<()> {
    let mut feed = loader.subscribe();
    tokio::spawn(async move {
        while feed.changed().await.is_ok() {
            let state = feed.borrow_and_update().clone();
            if !state.message.is_empty() {
                println!("[model] {}", state.message);
            }
        }
    })
}

async fn run_load(loader: &mut ModelLoader, client: &PodClient, args: &str) {
    let mut parts = args.split_whitespace();
    let (Some(model_id), Some(kind)) = (parts.next(), parts.next()) else {
        println!("usage: /load <model_id> <chat|image|vision>");
        return;
    };
    let model_type: ModelKind = match kind.parse() {
        Ok(kind) => kind,
        Err(err) => {
            println!("{err}");
            return;
        }
    };
    let request = LoadModelRequest::new(model_id, model_type);
    loader.load(client, &request).await;
}

async fn run_image(image: &mut ImageScreen, client: &PodClient, prompt: &str) {
    image.generate(client, prompt).await;
    if let Some(png) = image.image() {
        match std::fs::write("podlab-image.png", png) {
            Ok(()) => println!("wrote podlab-image.png ({} bytes)", png.len()),
            Err(err) => println!("could not write image: {err}"),
        }
    } else if let Some(err) = image.error() {
        println!("image generation failed: {err}");
    }
}

async fn run_analyze(analyze: &mut AnalyzeScreen, client: &PodClient, path: &str) {
    let path = path.trim();
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) => {
            println!("could not read {path}: {err}");
            return;
        }
    };
    let name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    analyze.select_file(name, bytes);
    analyze.analyze(client).await;
    if let Some(result) = analyze.analysis() {
        println!("{result}");
    }
}
