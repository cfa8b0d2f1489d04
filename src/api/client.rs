//! HTTP client for the remote inference pod.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use reqwest::multipart::{Form, Part};

use crate::api::types::{
    AnalysisResponse, ChatRequest, ChatResponse, ImageRequest, ImageResponse, LoadModelRequest,
    LoadStatus,
};
use crate::api::{ApiError, ChatBackend, ChunkStream, MediaBackend, ModelBackend};

/// Client for one backend origin.
///
/// Plain request/response, no authentication, no retries: a failed call is
/// reported to the owning screen and that is the end of it.
#[derive(Debug, Clone)]
pub struct PodClient {
    client: reqwest::Client,
    base_url: String,
}

impl PodClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Map a non-2xx response to [`ApiError::Backend`], keeping the body as
    /// the message.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(ApiError::Backend {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl ChatBackend for PodClient {
    async fn chat(&self, request: &ChatRequest) -> Result<String, ApiError> {
        let response = self
            .client
            .post(self.url("/api/chat"))
            .json(request)
            .send()
            .await?;
        let response = Self::check(response).await?;
        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        Ok(body.response)
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<ChunkStream, ApiError> {
        let response = self
            .client
            .post(self.url("/api/chat"))
            .json(request)
            .send()
            .await?;
        let response = Self::check(response).await?;
        tracing::debug!("chat stream opened");
        Ok(ChunkStream::http(response))
    }
}

#[async_trait]
impl MediaBackend for PodClient {
    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>, ApiError> {
        let request = ImageRequest {
            prompt: prompt.to_string(),
        };
        let response = self
            .client
            .post(self.url("/api/generate-image"))
            .json(&request)
            .send()
            .await?;
        let response = Self::check(response).await?;
        let body: ImageResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        decode_image_payload(&body.image_base64)
    }

    async fn analyze(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, ApiError> {
        let part = Part::bytes(bytes).file_name(file_name.to_string());
        let form = Form::new().part("file", part);
        let response = self
            .client
            .post(self.url("/api/analyze"))
            .multipart(form)
            .send()
            .await?;
        let response = Self::check(response).await?;
        let body: AnalysisResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        Ok(body.analysis)
    }
}

#[async_trait]
impl ModelBackend for PodClient {
    async fn load_model(&self, request: &LoadModelRequest) -> Result<(), ApiError> {
        let response = self
            .client
            .post(self.url("/api/load-model"))
            .json(request)
            .send()
            .await?;
        Self::check(response).await?;
        tracing::info!(model_id = %request.model_id, "model load accepted");
        Ok(())
    }

    async fn model_status(&self) -> Result<LoadStatus, ApiError> {
        let response = self
            .client
            .get(self.url("/api/model-status"))
            .send()
            .await?;
        let response = Self::check(response).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }
}

/// Decode the base64 image payload returned by the backend.
fn decode_image_payload(payload: &str) -> Result<Vec<u8>, ApiError> {
    BASE64_STANDARD
        .decode(payload.trim())
        .map_err(|e| ApiError::InvalidResponse(format!("bad image payload: {e}")))
}
