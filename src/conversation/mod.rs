//! Conversation flows
//!
//! Glue between user input, the backend client and the store. Each flow
//! appends the child's turn, calls the backend, then appends the reply or
//! records a friendly error. The store lock is never held across an await.

pub mod image;
pub mod photo;
pub mod text;
pub mod voice;

use crate::api::{ApiClient, ApiError, CreateSessionRequest, SessionResponse};
use crate::config::{RetryConfig, StudentConfig};
use crate::errors::{ErrorKind, FriendlyError};
use crate::store::{Message, SharedStore};
use chrono::Utc;
use std::time::Duration;

pub use photo::send_photo;
pub use text::send_text;
pub use voice::VoiceSender;

/// Shown when a session cannot be created
pub const SESSION_START_FAILED: &str = "哎呀，小芽遇到了一点问题，请刷新页面试试";

/// Failure of a conversation flow
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("No active session")]
    NoSession,

    #[error("Input rejected: {0}")]
    Invalid(String),

    #[error("Send cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },

    #[error("Send failed after {attempts} attempt(s): {source}")]
    Failed {
        attempts: u32,
        friendly: FriendlyError,
        source: ApiError,
    },
}

impl SendError {
    pub fn friendly(&self) -> FriendlyError {
        match self {
            Self::Invalid(_) => FriendlyError::of(ErrorKind::Validation),
            Self::Failed { friendly, .. } => friendly.clone(),
            Self::NoSession | Self::Cancelled { .. } => FriendlyError::of(ErrorKind::Unknown),
        }
    }
}

/// Automatic resend policy for failed voice messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            delay: Duration::from_millis(config.delay_ms),
        }
    }
}

/// Create a backend session for the configured student and store it
///
/// On failure the store's error slot is set so the UI can offer a retry,
/// which simply calls this again.
pub async fn bootstrap_session(
    api: &ApiClient,
    store: &SharedStore,
    student: &StudentConfig,
) -> Result<SessionResponse, ApiError> {
    {
        let mut store = store.lock();
        store.set_loading(true);
        store.set_error(None);
    }

    let student_id = if student.student_id.is_empty() {
        format!("student_{}", Utc::now().timestamp_millis())
    } else {
        student.student_id.clone()
    };
    let request = CreateSessionRequest {
        student_id,
        subject: Some(student.subject.clone()),
        student_age: Some(student.student_age),
        topic: (!student.topic.is_empty()).then(|| student.topic.clone()),
    };

    let result = api.create_session(&request).await;

    let mut store = store.lock();
    store.set_loading(false);
    match &result {
        Ok(session) => {
            tracing::info!("Session created: {}", session.session_id);
            store.set_session(session);
        }
        Err(e) => {
            tracing::error!("Failed to create session: {}", e);
            store.set_error(Some(SESSION_START_FAILED.to_string()));
        }
    }
    result
}

/// Replace the transcript with the backend's recent history
pub async fn restore_history(
    api: &ApiClient,
    store: &SharedStore,
    limit: Option<u32>,
) -> Result<usize, SendError> {
    let session_id = store
        .lock()
        .session_id()
        .map(str::to_string)
        .ok_or(SendError::NoSession)?;

    let history = api
        .get_history(&session_id, limit)
        .await
        .map_err(|source| SendError::Failed {
            attempts: 1,
            friendly: source.friendly(),
            source,
        })?;

    let messages: Vec<Message> = history.messages.into_iter().map(Message::from).collect();
    let count = messages.len();
    store.lock().set_messages(messages);

    tracing::info!("Restored {} of {} messages", count, history.total_count);
    Ok(count)
}

/// Delete the backend session and clear it locally
///
/// The local session is cleared even when the backend call fails.
pub async fn end_session(api: &ApiClient, store: &SharedStore) -> Result<(), ApiError> {
    let session_id = store.lock().session_id().map(str::to_string);
    let Some(session_id) = session_id else {
        return Ok(());
    };

    let result = api.delete_session(&session_id).await;
    if let Err(e) = &result {
        tracing::warn!("Failed to delete session {}: {}", session_id, e);
    }
    store.lock().clear_session();
    result.map(|_| ())
}
