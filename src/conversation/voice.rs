//! Voice message flow with automatic resend
//!
//! A recognised transcript is appended to the transcript once, then sent
//! with up to `max_attempts` tries spaced by a fixed delay. Only failures
//! classified as retryable are retried. The loop can be cancelled from
//! another task; the flag is checked before each attempt.

use super::{RetryPolicy, SendError};
use crate::api::{ApiClient, ConversationResponse, Role, VoiceInputRequest};
use crate::store::SharedStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::sleep;

/// Shown when the recogniser produced nothing to send
pub const EMPTY_TRANSCRIPT_MESSAGE: &str = "没有听到声音，请再试一次";

/// Sends voice transcripts; clones share the cancel flag
#[derive(Clone)]
pub struct VoiceSender {
    api: ApiClient,
    store: SharedStore,
    policy: RetryPolicy,
    cancelled: Arc<AtomicBool>,
}

impl VoiceSender {
    pub fn new(api: ApiClient, store: SharedStore, policy: RetryPolicy) -> Self {
        Self {
            api,
            store,
            policy,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Stop retrying the in-flight send
    pub fn cancel(&self) {
        tracing::info!("Voice send cancelled by user");
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Send `transcript` in the active session
    pub async fn send(
        &self,
        transcript: &str,
        confidence: Option<f32>,
    ) -> Result<ConversationResponse, SendError> {
        let transcript = transcript.trim();

        let session_id = {
            let mut store = self.store.lock();
            if transcript.is_empty() {
                store.set_error(Some(EMPTY_TRANSCRIPT_MESSAGE.to_string()));
                return Err(SendError::Invalid(EMPTY_TRANSCRIPT_MESSAGE.to_string()));
            }
            let Some(session_id) = store.session_id().map(str::to_string) else {
                tracing::warn!("Voice message dropped: no active session");
                return Err(SendError::NoSession);
            };

            store.set_error(None);
            store.set_loading(true);
            store.add_message(Role::User, transcript);
            session_id
        };
        self.cancelled.store(false, Ordering::SeqCst);

        let request = VoiceInputRequest {
            session_id,
            transcript: transcript.to_string(),
            confidence,
        };
        let result = self.send_with_retry(&request).await;

        let mut store = self.store.lock();
        store.set_loading(false);
        match &result {
            Ok(response) => store.add_message(Role::Assistant, response.response.clone()),
            Err(SendError::Failed { friendly, .. }) => store.set_error(Some(friendly.to_string())),
            Err(_) => {}
        }
        result
    }

    async fn send_with_retry(
        &self,
        request: &VoiceInputRequest,
    ) -> Result<ConversationResponse, SendError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempts = 0;

        loop {
            if self.is_cancelled() {
                return Err(SendError::Cancelled { attempts });
            }
            attempts += 1;

            let source = match self.api.send_voice_input(request).await {
                Ok(response) => {
                    if attempts > 1 {
                        tracing::debug!("Voice send succeeded on attempt {}", attempts);
                    }
                    return Ok(response);
                }
                Err(e) => e,
            };

            let friendly = source.friendly();
            if !friendly.retryable {
                tracing::error!("Voice send failed (not retryable): {}", source);
                return Err(SendError::Failed {
                    attempts,
                    friendly,
                    source,
                });
            }
            if attempts >= max_attempts {
                tracing::error!("Voice send failed after {} attempts: {}", attempts, source);
                return Err(SendError::Failed {
                    attempts,
                    friendly: friendly.into_final(),
                    source,
                });
            }

            tracing::warn!(
                "Voice send failed (attempt {}), retrying in {}ms: {}",
                attempts,
                self.policy.delay.as_millis(),
                source
            );
            sleep(self.policy.delay).await;
        }
    }
}
