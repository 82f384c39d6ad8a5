//! Voice recognition state machine
//!
//! Wraps a single-utterance recognition engine: `start_listening` moves
//! from idle to listening, and the engine's end (or error) event returns to
//! idle. Interim text is shown while the child speaks and replaced by the
//! final transcript once the engine commits it.

use super::{SpeechError, DEFAULT_LANG};
use serde::Serialize;

/// Shown when no recognition engine exists on this platform
pub const UNSUPPORTED_MESSAGE: &str = "语音识别不支持";

/// Shown when the engine throws on start
pub const START_FAILED_MESSAGE: &str = "无法启动语音识别";

/// Map an engine error code to the message shown to the child
pub fn recognition_error_message(code: &str) -> &'static str {
    match code {
        "no-speech" => "没有检测到语音，请再试一次",
        "audio-capture" => "无法访问麦克风",
        "not-allowed" => "需要麦克风权限才能使用语音功能",
        "network" => "网络连接有问题，请检查网络",
        "aborted" => "语音识别已停止",
        _ => "语音识别遇到问题，请再试一次",
    }
}

/// Parameters applied to a freshly created engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionSettings {
    pub lang: String,
    /// Keep listening after the first final result
    pub continuous: bool,
    /// Deliver partial results while the child is still speaking
    pub interim_results: bool,
    pub max_alternatives: u32,
}

impl RecognitionSettings {
    pub fn for_lang(lang: impl Into<String>) -> Self {
        Self {
            lang: lang.into(),
            continuous: false,
            interim_results: true,
            max_alternatives: 1,
        }
    }
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self::for_lang(DEFAULT_LANG)
    }
}

/// A live recognition engine instance
pub trait RecognitionEngine: Send {
    /// Begin capturing; errors when the engine refuses (e.g. already started)
    fn start(&mut self) -> Result<(), SpeechError>;

    /// Stop capturing and deliver any pending final result
    fn stop(&mut self);

    /// Stop immediately, discarding in-flight results
    fn abort(&mut self);
}

/// Factory probing for and constructing recognition engines
pub trait RecognitionBackend {
    /// Whether the platform offers speech recognition at all
    fn is_available(&self) -> bool;

    fn create(&self, settings: &RecognitionSettings) -> Box<dyn RecognitionEngine>;
}

/// One entry of a recognition result list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionResult {
    pub transcript: String,
    pub is_final: bool,
}

impl RecognitionResult {
    pub fn interim(text: impl Into<String>) -> Self {
        Self {
            transcript: text.into(),
            is_final: false,
        }
    }

    pub fn final_result(text: impl Into<String>) -> Self {
        Self {
            transcript: text.into(),
            is_final: true,
        }
    }
}

/// Callbacks delivered by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    Start,
    End,
    /// Results changed from `result_index` onwards
    Result {
        result_index: usize,
        results: Vec<RecognitionResult>,
    },
    Error {
        code: String,
        message: String,
    },
}

/// Observable recognition state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionStatus {
    pub is_listening: bool,
    pub transcript: String,
    pub interim_transcript: String,
    pub is_supported: bool,
    pub error: Option<String>,
}

/// Voice recognition bound to one engine instance
pub struct VoiceRecognition {
    engine: Option<Box<dyn RecognitionEngine>>,
    lang: String,
    is_supported: bool,
    is_listening: bool,
    transcript: String,
    interim_transcript: String,
    error: Option<String>,
}

impl VoiceRecognition {
    /// Probe `backend` and construct an engine for `lang` if supported
    pub fn new(backend: &dyn RecognitionBackend, lang: &str) -> Self {
        let is_supported = backend.is_available();
        let engine = if is_supported {
            Some(backend.create(&RecognitionSettings::for_lang(lang)))
        } else {
            tracing::warn!("Speech recognition not available on this platform");
            None
        };

        Self {
            engine,
            lang: lang.to_string(),
            is_supported,
            is_listening: false,
            transcript: String::new(),
            interim_transcript: String::new(),
            error: None,
        }
    }

    pub fn lang(&self) -> &str {
        &self.lang
    }

    pub fn is_supported(&self) -> bool {
        self.is_supported
    }

    pub fn is_listening(&self) -> bool {
        self.is_listening
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn interim_transcript(&self) -> &str {
        &self.interim_transcript
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn status(&self) -> RecognitionStatus {
        RecognitionStatus {
            is_listening: self.is_listening,
            transcript: self.transcript.clone(),
            interim_transcript: self.interim_transcript.clone(),
            is_supported: self.is_supported,
            error: self.error.clone(),
        }
    }

    /// Begin listening
    ///
    /// Returns `false` without touching the engine when unsupported or when
    /// a listening session is already active.
    pub fn start_listening(&mut self) -> bool {
        if !self.is_supported {
            self.error = Some(UNSUPPORTED_MESSAGE.to_string());
            return false;
        }

        if self.is_listening {
            return false;
        }
        let Some(engine) = self.engine.as_mut() else {
            return false;
        };

        self.is_listening = true;
        self.error = None;

        match engine.start() {
            Ok(()) => {
                tracing::debug!("Speech recognition started ({})", self.lang);
                true
            }
            Err(e) => {
                tracing::error!("Failed to start speech recognition: {}", e);
                self.error = Some(START_FAILED_MESSAGE.to_string());
                self.is_listening = false;
                false
            }
        }
    }

    /// Ask the engine to stop; listening ends when it reports `End`
    pub fn stop_listening(&mut self) {
        if !self.is_listening {
            return;
        }
        if let Some(engine) = self.engine.as_mut() {
            engine.stop();
        }
    }

    /// Clear transcript, interim text and error; listening is unaffected
    pub fn reset_transcript(&mut self) {
        self.transcript.clear();
        self.interim_transcript.clear();
        self.error = None;
    }

    /// Apply an engine callback
    pub fn handle_event(&mut self, event: RecognitionEvent) {
        match event {
            RecognitionEvent::Start => {
                self.is_listening = true;
                self.error = None;
            }
            RecognitionEvent::End => {
                self.is_listening = false;
            }
            RecognitionEvent::Result {
                result_index,
                results,
            } => {
                let mut final_text = String::new();
                let mut interim_text = String::new();

                for result in results.iter().skip(result_index) {
                    if result.is_final {
                        final_text.push_str(&result.transcript);
                    } else {
                        interim_text.push_str(&result.transcript);
                    }
                }

                if final_text.is_empty() {
                    self.interim_transcript = interim_text;
                } else {
                    self.transcript = final_text;
                    self.interim_transcript.clear();
                }
            }
            RecognitionEvent::Error { code, message } => {
                tracing::error!("Speech recognition error: {} {}", code, message);
                self.error = Some(recognition_error_message(&code).to_string());
                self.is_listening = false;
            }
        }
    }
}

impl Drop for VoiceRecognition {
    fn drop(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.abort();
        }
    }
}
