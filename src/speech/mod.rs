//! Speech input and output
//!
//! State machines over the platform speech-recognition and
//! speech-synthesis engines. Engines are injected through traits; their
//! asynchronous callbacks are fed back in delivery order via
//! `handle_event`.

pub mod recognition;
pub mod synthesis;

pub use recognition::{
    RecognitionBackend, RecognitionEngine, RecognitionEvent, RecognitionResult,
    RecognitionSettings, RecognitionStatus, VoiceRecognition,
};
pub use synthesis::{
    SpeakOptions, SpeechSettings, SpeechSynthesis, SynthesisEngine, SynthesisEvent,
    SynthesisStatus, Utterance, UtteranceId, Voice,
};

/// Language used for recognition and playback unless configured otherwise
pub const DEFAULT_LANG: &str = "zh-CN";

/// Failure reported synchronously by a speech engine call
#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("Speech engine refused to start: {0}")]
    StartFailed(String),
}
