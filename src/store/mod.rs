//! Session and gamification store
//!
//! Single source of truth for the active session, its transcript, and the
//! child's learning progress. The ephemeral half ([`SessionState`]) and the
//! durable half ([`ProgressStore`]) are kept apart so clearing a session
//! can never touch stats or achievements.

pub mod achievements;
pub mod progress;
pub mod session;
pub mod storage;

use crate::api::types::{Role, SessionResponse};
use parking_lot::Mutex;
use std::sync::Arc;

pub use achievements::{Achievement, AchievementDefinition, CATALOG};
pub use progress::{LearningStats, ProgressState, ProgressStore};
pub use session::{Message, SessionInfo, SessionState};
pub use storage::{JsonFileStorage, MemoryStorage, ProgressStorage, StorageError};

/// Store shared between the UI and async conversation flows
pub type SharedStore = Arc<Mutex<Store>>;

pub struct Store {
    session: SessionState,
    progress: ProgressStore,
}

impl Store {
    /// Empty session over progress restored from `storage`
    pub fn new(storage: Box<dyn ProgressStorage>) -> Self {
        Self {
            session: SessionState::default(),
            progress: ProgressStore::load(storage),
        }
    }

    /// Store kept only in memory
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStorage::new()))
    }

    pub fn shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    // --- Session ---

    pub fn session(&self) -> &SessionInfo {
        &self.session.info
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session.info.session_id.as_deref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.session.messages
    }

    pub fn is_loading(&self) -> bool {
        self.session.is_loading
    }

    pub fn error(&self) -> Option<&str> {
        self.session.error.as_deref()
    }

    pub fn set_session(&mut self, response: &SessionResponse) {
        tracing::info!("Session set: {}", response.session_id);
        self.session.set_session(response);
    }

    /// Reset identity, transcript and flags; progress is kept
    pub fn clear_session(&mut self) {
        tracing::info!("Session cleared");
        self.session.clear();
    }

    pub fn add_message(&mut self, role: Role, content: impl Into<String>) {
        self.session.add_message(role, content);
    }

    pub fn set_messages(&mut self, messages: Vec<Message>) {
        self.session.messages = messages;
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.session.is_loading = loading;
    }

    pub fn set_error(&mut self, error: Option<String>) {
        self.session.error = error;
    }

    // --- Progress ---

    pub fn stats(&self) -> &LearningStats {
        self.progress.stats()
    }

    pub fn achievements(&self) -> &[Achievement] {
        self.progress.achievements()
    }

    pub fn progress(&self) -> &ProgressState {
        self.progress.state()
    }

    /// Record an answer; returns achievements it unlocked
    pub fn record_answer(&mut self, is_correct: bool) -> Vec<Achievement> {
        self.progress.record_answer(is_correct)
    }

    pub fn update_stats(&mut self, stats: LearningStats) {
        self.progress.update_stats(stats);
    }

    pub fn reset_streak(&mut self) {
        self.progress.reset_streak();
    }

    pub fn increment_study_time(&mut self, seconds: u64) {
        self.progress.increment_study_time(seconds);
    }

    pub fn mark_achievement_shown(&mut self, id: &str) {
        self.progress.mark_achievement_shown(id);
    }

    pub fn has_achievement(&self, id: &str) -> bool {
        self.progress.has_achievement(id)
    }

    pub fn unshown_achievements(&self) -> Vec<&Achievement> {
        self.progress.unshown_achievements()
    }

    pub fn reset_achievements(&mut self) {
        self.progress.reset_achievements();
    }
}
