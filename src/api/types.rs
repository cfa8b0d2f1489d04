//! Wire types for the pod's HTTP API.

use crate::types::Message;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Conversation so far, oldest first.
    pub messages: Vec<Message>,
    /// Cap on generated tokens.
    pub max_length: u32,
}

/// Body of a non-streamed `POST /api/chat` response.
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

/// Body of `POST /api/generate-image`.
#[derive(Debug, Serialize)]
pub struct ImageRequest {
    pub prompt: String,
}

/// Body of a `POST /api/generate-image` response.
#[derive(Debug, Deserialize)]
pub struct ImageResponse {
    /// PNG bytes, base64 encoded.
    pub image_base64: String,
}

/// Body of a `POST /api/analyze` response.
#[derive(Debug, Deserialize)]
pub struct AnalysisResponse {
    pub analysis: String,
}

/// Which pipeline a model should be loaded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Chat,
    Image,
    Vision,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelKind::Chat => "chat",
            ModelKind::Image => "image",
            ModelKind::Vision => "vision",
        };
        f.write_str(name)
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "chat" => Ok(ModelKind::Chat),
            "image" => Ok(ModelKind::Image),
            "vision" => Ok(ModelKind::Vision),
            other => Err(format!("unknown model type: {other}")),
        }
    }
}

/// Body of `POST /api/load-model`.
#[derive(Debug, Clone, Serialize)]
pub struct LoadModelRequest {
    pub model_id: String,
    pub model_type: ModelKind,
}

impl LoadModelRequest {
    pub fn new(model_id: impl Into<String>, model_type: ModelKind) -> Self {
        Self {
            model_id: model_id.into(),
            model_type,
        }
    }
}

/// Reported state of a model load, as polled from `GET /api/model-status`.
///
/// The backend also reports `"loading"` and `"idle"`; anything that is not
/// terminal counts as pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    #[serde(alias = "loading", alias = "idle")]
    Pending,
    Ready,
    Error,
}

impl StatusKind {
    /// Terminal statuses stop the poll loop; nothing follows them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StatusKind::Ready | StatusKind::Error)
    }
}

/// Body of a `GET /api/model-status` response.
#[derive(Debug, Clone, Deserialize)]
pub struct LoadStatus {
    pub status: StatusKind,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    #[test]
    fn test_chat_request_wire_shape() {
        let request = ChatRequest {
            messages: vec![Message::new(Role::User, "Hello")],
            max_length: 200,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "messages": [{"role": "user", "content": "Hello"}],
                "max_length": 200,
            })
        );
    }

    #[test]
    fn test_load_model_request_wire_shape() {
        let request = LoadModelRequest::new("gpt2", ModelKind::Chat);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"model_id": "gpt2", "model_type": "chat"})
        );
    }

    #[test]
    fn test_status_aliases_map_to_pending() {
        for raw in ["pending", "loading", "idle"] {
            let status: LoadStatus =
                serde_json::from_str(&format!(r#"{{"status":"{raw}","message":"m"}}"#)).unwrap();
            assert_eq!(status.status, StatusKind::Pending, "{raw}");
            assert!(!status.status.is_terminal());
        }
    }

    #[test]
    fn test_terminal_statuses() {
        let ready: LoadStatus =
            serde_json::from_str(r#"{"status":"ready","message":"Model gpt2 loaded."}"#).unwrap();
        assert_eq!(ready.status, StatusKind::Ready);
        assert!(ready.status.is_terminal());

        let error: LoadStatus =
            serde_json::from_str(r#"{"status":"error","message":"Error: oom"}"#).unwrap();
        assert_eq!(error.status, StatusKind::Error);
        assert!(error.status.is_terminal());
    }

    #[test]
    fn test_model_kind_round_trip() {
        for (kind, text) in [
            (ModelKind::Chat, "chat"),
            (ModelKind::Image, "image"),
            (ModelKind::Vision, "vision"),
        ] {
            assert_eq!(kind.to_string(), text);
            assert_eq!(text.parse::<ModelKind>().unwrap(), kind);
        }
        assert!("audio".parse::<ModelKind>().is_err());
    }
}
