//! HTTP client for the Sprout tutoring backend
//!
//! Thin typed wrapper over the backend's REST endpoints. Every request is
//! logged; failures carry the backend's `error` text when it sent one so
//! they can be mapped onto the friendly error catalog.

pub mod types;

use crate::config::ApiConfig;
use crate::errors::{self, FriendlyError};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

pub use types::*;

/// Default backend address
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

/// Default timeout for API requests in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default number of history messages requested
pub const DEFAULT_HISTORY_LIMIT: u32 = 10;

/// Error types for backend calls
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Server error ({status}): {}", .error.as_deref().unwrap_or("no details"))]
    Server { status: u16, error: Option<String> },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to build request: {0}")]
    Request(String),
}

impl ApiError {
    /// Friendly form shown to the child
    pub fn friendly(&self) -> FriendlyError {
        match self {
            Self::Timeout(_) | Self::Connection(_) => FriendlyError::of(errors::ErrorKind::Network),
            Self::Server { status, error } => {
                errors::handle_api_error(Some(*status), error.as_deref())
            }
            Self::Parse(_) | Self::InvalidUrl(_) | Self::Request(_) => {
                FriendlyError::of(errors::ErrorKind::Unknown)
            }
        }
    }
}

/// Backend API client
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: Url,
    client: reqwest::Client,
    timeout: Duration,
}

impl ApiClient {
    /// Create a client for `base_url` (e.g. "http://localhost:8000/api")
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base_url =
            Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Request(e.to_string()))?;

        Ok(Self {
            base_url,
            client,
            timeout,
        })
    }

    /// Create a client from the `api` config section
    pub fn from_config(config: &ApiConfig) -> Result<Self, ApiError> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Create a new conversation session
    pub async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<SessionResponse, ApiError> {
        let url = self.endpoint(&["v1", "conversations", "create"])?;
        self.execute(Method::POST, url, |b| b.json(request)).await
    }

    /// Send a recognised voice transcript
    pub async fn send_voice_input(
        &self,
        request: &VoiceInputRequest,
    ) -> Result<ConversationResponse, ApiError> {
        let url = self.endpoint(&["v1", "conversations", "voice"])?;
        self.execute(Method::POST, url, |b| b.json(request)).await
    }

    /// Send a typed message
    pub async fn send_text_input(
        &self,
        request: &TextInputRequest,
    ) -> Result<ConversationResponse, ApiError> {
        let url = self.endpoint(&["v1", "conversations", "message"])?;
        self.execute(Method::POST, url, |b| b.json(request)).await
    }

    /// Fetch the latest `limit` messages of a session
    pub async fn get_history(
        &self,
        session_id: &str,
        limit: Option<u32>,
    ) -> Result<HistoryResponse, ApiError> {
        let mut url = self.endpoint(&["v1", "conversations", session_id, "history"])?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.unwrap_or(DEFAULT_HISTORY_LIMIT).to_string());
        self.execute(Method::GET, url, |b| b).await
    }

    pub async fn get_session_stats(
        &self,
        session_id: &str,
    ) -> Result<SessionStatsResponse, ApiError> {
        let url = self.endpoint(&["v1", "conversations", session_id, "stats"])?;
        self.execute(Method::GET, url, |b| b).await
    }

    pub async fn delete_session(
        &self,
        session_id: &str,
    ) -> Result<DeleteSessionResponse, ApiError> {
        let url = self.endpoint(&["v1", "conversations", session_id])?;
        self.execute(Method::DELETE, url, |b| b).await
    }

    /// Upload homework photo and get a guided (non-answer) explanation
    pub async fn upload_image_for_guidance(
        &self,
        image: &ImageUpload,
        student_id: &str,
        student_age: u32,
        subject: &str,
    ) -> Result<ImageGuidanceResponse, ApiError> {
        let url = self.endpoint(&["v1", "images", "guide"])?;

        let part = Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(&image.mime_type)
            .map_err(|e| ApiError::Request(e.to_string()))?;
        let form = Form::new()
            .part("file", part)
            .text("student_id", student_id.to_string())
            .text("student_age", student_age.to_string())
            .text("subject", subject.to_string());

        tracing::debug!("Uploading image {} ({} bytes)", image.file_name, image.size());
        self.execute(Method::POST, url, |b| b.multipart(form)).await
    }

    /// Build an endpoint URL below the base path
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request and decode the JSON body
    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: impl FnOnce(RequestBuilder) -> RequestBuilder,
    ) -> Result<T, ApiError> {
        tracing::info!("[API] {} {}", method, url.path());

        let request = body(self.client.request(method.clone(), url.clone()));
        let response = request.send().await.map_err(|e| {
            let error = if e.is_timeout() {
                ApiError::Timeout(self.timeout.as_secs())
            } else {
                ApiError::Connection(e.to_string())
            };
            tracing::error!("[API Error] {} {}: {}", method, url.path(), error);
            error
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let error = serde_json::from_str::<ErrorResponse>(&text)
                .map(|body| body.error)
                .ok()
                .or_else(|| (!text.is_empty()).then_some(text));

            tracing::error!(
                "[API Error] {} {} returned {}: {}",
                method,
                url.path(),
                status.as_u16(),
                error.as_deref().unwrap_or("no details")
            );
            return Err(ApiError::Server {
                status: status.as_u16(),
                error,
            });
        }

        response.json::<T>().await.map_err(|e| {
            tracing::error!("[API Error] {} {}: unreadable body: {}", method, url.path(), e);
            ApiError::Parse(e.to_string())
        })
    }
}
