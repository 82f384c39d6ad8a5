//! Durable learning progress
//!
//! Statistics and achievements outlive sessions. Every mutation is written
//! through to the injected [`ProgressStorage`]; a failed write is logged and
//! the in-memory state stays authoritative.

use super::achievements::{self, Achievement};
use super::storage::{ProgressStorage, StorageError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current schema version of the persisted blob
pub const PROGRESS_VERSION: u32 = 1;

/// Answer statistics across all sessions
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LearningStats {
    pub total_questions: u32,
    pub correct_answers: u32,
    pub incorrect_answers: u32,
    /// Percentage of correct answers, 0-100
    pub accuracy: f64,
    pub current_streak: u32,
    pub longest_streak: u32,
    /// Seconds studied today
    pub today_study_time: u64,
    pub last_study_time: Option<DateTime<Utc>>,
}

impl LearningStats {
    /// Apply one answer to the counters and streaks
    pub fn apply_answer(&mut self, is_correct: bool, now: DateTime<Utc>) {
        self.total_questions += 1;
        if is_correct {
            self.correct_answers += 1;
            self.current_streak += 1;
        } else {
            self.incorrect_answers += 1;
            self.current_streak = 0;
        }

        self.accuracy = self.correct_answers as f64 / self.total_questions as f64 * 100.0;
        self.longest_streak = self.longest_streak.max(self.current_streak);
        self.last_study_time = Some(now);
    }
}

/// The persisted part of the store
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressState {
    pub stats: LearningStats,
    pub achievements: Vec<Achievement>,
    /// Ids ever unlocked, in unlock order
    pub unlocked_achievements: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct PersistedProgress {
    version: u32,
    state: ProgressState,
}

/// Decode a persisted blob
pub fn decode(blob: &str) -> Result<ProgressState, StorageError> {
    let persisted: PersistedProgress = serde_json::from_str(blob)?;
    if persisted.version > PROGRESS_VERSION {
        return Err(StorageError::UnsupportedVersion(persisted.version));
    }
    Ok(persisted.state)
}

/// Encode state as a versioned blob
pub fn encode(state: &ProgressState) -> Result<String, StorageError> {
    let persisted = PersistedProgress {
        version: PROGRESS_VERSION,
        state: state.clone(),
    };
    Ok(serde_json::to_string(&persisted)?)
}

pub struct ProgressStore {
    state: ProgressState,
    storage: Box<dyn ProgressStorage>,
}

impl ProgressStore {
    /// Restore progress from `storage`, falling back to defaults
    pub fn load(storage: Box<dyn ProgressStorage>) -> Self {
        let state = match storage.load() {
            Ok(Some(blob)) => decode(&blob).unwrap_or_else(|e| {
                tracing::warn!("Discarding unreadable progress data: {}", e);
                ProgressState::default()
            }),
            Ok(None) => {
                tracing::info!("No saved progress, starting fresh");
                ProgressState::default()
            }
            Err(e) => {
                tracing::error!("Failed to read saved progress: {}", e);
                ProgressState::default()
            }
        };

        tracing::info!(
            "Progress loaded: {} questions, {} achievements",
            state.stats.total_questions,
            state.achievements.len()
        );
        Self { state, storage }
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    pub fn stats(&self) -> &LearningStats {
        &self.state.stats
    }

    pub fn achievements(&self) -> &[Achievement] {
        &self.state.achievements
    }

    pub fn unlocked_ids(&self) -> &[String] {
        &self.state.unlocked_achievements
    }

    /// Record an answer and unlock whatever the new stats satisfy
    ///
    /// Returns the achievements unlocked by this answer.
    pub fn record_answer(&mut self, is_correct: bool) -> Vec<Achievement> {
        let now = Utc::now();
        self.state.stats.apply_answer(is_correct, now);

        let unlocked: Vec<Achievement> =
            achievements::evaluate(&self.state.stats, &self.state.unlocked_achievements)
                .into_iter()
                .map(|def| def.unlock(now))
                .collect();

        for achievement in &unlocked {
            tracing::info!("Achievement unlocked: {} ({})", achievement.id, achievement.name);
            self.state.unlocked_achievements.push(achievement.id.clone());
            self.state.achievements.push(achievement.clone());
        }

        self.persist();
        unlocked
    }

    /// Replace the stats wholesale; no achievements are evaluated
    pub fn update_stats(&mut self, stats: LearningStats) {
        self.state.stats = stats;
        self.persist();
    }

    pub fn reset_streak(&mut self) {
        self.state.stats.current_streak = 0;
        self.persist();
    }

    pub fn increment_study_time(&mut self, seconds: u64) {
        self.state.stats.today_study_time += seconds;
        self.persist();
    }

    /// Flag an achievement's celebration as shown; unknown ids are ignored
    pub fn mark_achievement_shown(&mut self, id: &str) {
        let Some(achievement) = self.state.achievements.iter_mut().find(|a| a.id == id) else {
            return;
        };
        achievement.shown = true;
        self.persist();
    }

    pub fn has_achievement(&self, id: &str) -> bool {
        self.state.unlocked_achievements.iter().any(|u| u == id)
    }

    /// Achievements still waiting for their celebration
    pub fn unshown_achievements(&self) -> Vec<&Achievement> {
        self.state.achievements.iter().filter(|a| !a.shown).collect()
    }

    /// Forget every achievement (stats are kept)
    pub fn reset_achievements(&mut self) {
        self.state.achievements.clear();
        self.state.unlocked_achievements.clear();
        self.persist();
    }

    fn persist(&self) {
        let result = encode(&self.state).and_then(|blob| self.storage.save(&blob));
        if let Err(e) = result {
            tracing::warn!("Failed to persist progress: {}", e);
        }
    }
}
