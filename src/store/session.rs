//! Ephemeral session state: identity, transcript and UI flags
//!
//! Nothing here is persisted; a reload starts with an empty session.

use crate::api::types::{MessageResponse, Role, SessionResponse};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SUBJECT: &str = "数学";
pub const DEFAULT_STUDENT_AGE: u32 = 6;

/// Identity of the active tutoring session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_id: Option<String>,
    pub student_id: String,
    pub subject: String,
    pub student_age: u32,
    pub is_valid: bool,
}

impl Default for SessionInfo {
    fn default() -> Self {
        Self {
            session_id: None,
            student_id: String::new(),
            subject: DEFAULT_SUBJECT.to_string(),
            student_age: DEFAULT_STUDENT_AGE,
            is_valid: false,
        }
    }
}

impl From<&SessionResponse> for SessionInfo {
    fn from(response: &SessionResponse) -> Self {
        Self {
            session_id: Some(response.session_id.clone()),
            student_id: response.student_id.clone(),
            subject: response.subject.clone(),
            student_age: response.student_age,
            is_valid: response.is_valid,
        }
    }
}

/// One line of the conversation transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn now(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

impl From<MessageResponse> for Message {
    fn from(response: MessageResponse) -> Self {
        let timestamp = parse_timestamp(&response.timestamp).unwrap_or_else(|| {
            tracing::warn!("Unparseable message timestamp: {}", response.timestamp);
            Utc::now()
        });
        Self {
            role: response.role,
            content: response.content,
            timestamp,
        }
    }
}

/// RFC 3339, or a naive ISO timestamp taken as UTC
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub info: SessionInfo,
    pub messages: Vec<Message>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl SessionState {
    /// Replace the identity; transcript and flags are untouched
    pub fn set_session(&mut self, response: &SessionResponse) {
        self.info = SessionInfo::from(response);
    }

    /// Back to an empty, invalid session
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn add_message(&mut self, role: Role, content: impl Into<String>) {
        self.messages.push(Message::now(role, content));
    }
}
