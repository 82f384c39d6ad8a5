//! Sprout (小芽) - AI tutoring companion for young children
//!
//! Client-side core: microphone silence detection, speech recognition and
//! synthesis state machines, the session and achievement store, the backend
//! API client, and the conversation flows that tie them together.

pub mod api;
pub mod audio;
pub mod config;
pub mod conversation;
pub mod errors;
pub mod format;
pub mod logging;
pub mod speech;
pub mod store;

pub use api::{ApiClient, ApiError};
pub use errors::{ErrorKind, FriendlyError};
pub use logging::init_logging;
pub use store::{SharedStore, Store};
