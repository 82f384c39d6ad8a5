//! Typed message flow

use super::SendError;
use crate::api::{ApiClient, ConversationResponse, Role, TextInputRequest};
use crate::errors::{ErrorKind, FriendlyError};
use crate::store::SharedStore;

/// Longest message accepted, in characters
pub const MAX_TEXT_CHARS: usize = 2000;

pub const EMPTY_INPUT_MESSAGE: &str = "请输入你想说的话";
pub const SEND_FAILED_MESSAGE: &str = "发送消息失败，请重试";

/// Send a typed message in the active session
///
/// No automatic retry; a failure leaves the child's message in the
/// transcript and sets the error slot.
pub async fn send_text(
    api: &ApiClient,
    store: &SharedStore,
    input: &str,
) -> Result<ConversationResponse, SendError> {
    let content = input.trim();

    let session_id = {
        let mut store = store.lock();
        if content.is_empty() {
            store.set_error(Some(EMPTY_INPUT_MESSAGE.to_string()));
            return Err(SendError::Invalid(EMPTY_INPUT_MESSAGE.to_string()));
        }
        if content.chars().count() > MAX_TEXT_CHARS {
            let friendly = FriendlyError::of(ErrorKind::Validation);
            store.set_error(Some(friendly.to_string()));
            return Err(SendError::Invalid(friendly.message));
        }
        let Some(session_id) = store.session_id().map(str::to_string) else {
            tracing::warn!("Text message dropped: no active session");
            return Err(SendError::NoSession);
        };

        store.set_error(None);
        store.set_loading(true);
        store.add_message(Role::User, content);
        session_id
    };

    let request = TextInputRequest {
        session_id,
        content: content.to_string(),
    };
    let result = api.send_text_input(&request).await;

    let mut store = store.lock();
    store.set_loading(false);
    match result {
        Ok(response) => {
            store.add_message(Role::Assistant, response.response.clone());
            Ok(response)
        }
        Err(source) => {
            tracing::error!("Failed to send text message: {}", source);
            store.set_error(Some(SEND_FAILED_MESSAGE.to_string()));
            Err(SendError::Failed {
                attempts: 1,
                friendly: source.friendly(),
                source,
            })
        }
    }
}
