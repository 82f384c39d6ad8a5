//! Speech synthesis (text-to-speech) playback
//!
//! One utterance plays at a time: `speak` cancels whatever is in flight
//! before queueing the next. Every utterance gets a fresh id and engine
//! events carry it back, so late events from a superseded utterance are
//! dropped instead of resetting the new one.

use super::DEFAULT_LANG;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub type UtteranceId = u64;

/// Invoked when an utterance finishes playing
pub type EndCallback = Arc<dyn Fn() + Send + Sync>;

/// Invoked with a friendly message when playback fails
pub type ErrorCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Map an engine error code to the message shown to the child
pub fn synthesis_error_message(code: &str) -> String {
    let message = match code {
        "canceled" => "语音播放已取消",
        "interrupted" => "语音播放被打断",
        "audio-busy" => "音频设备忙碌",
        "audio-hardware" => "音频设备不可用",
        "network" => "网络连接问题",
        "synthesis-unavailable" => "语音合成不可用",
        "synthesis-failed" => "语音合成失败",
        "language-unavailable" => "该语言不支持",
        "voice-unavailable" => "该语音不可用",
        "text-too-long" => "文本太长",
        other => return format!("语音播放出现问题: {}", other),
    };
    message.to_string()
}

/// A voice offered by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Voice {
    pub name: String,
    pub lang: String,
    pub is_default: bool,
}

impl Voice {
    pub fn new(name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
            is_default: false,
        }
    }

    /// Whether this voice speaks `lang` (primary subtag or region match)
    pub fn matches_lang(&self, lang: &str) -> bool {
        let mut parts = lang.split(['-', '_']);
        let primary = parts.next().unwrap_or_default();
        let region = parts.next();

        (!primary.is_empty() && self.lang.starts_with(primary))
            || region.is_some_and(|r| !r.is_empty() && self.lang.contains(r))
    }
}

/// A fully resolved request handed to the engine
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub id: UtteranceId,
    pub text: String,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    pub lang: String,
    /// `None` lets the engine pick its default voice
    pub voice: Option<Voice>,
}

/// Platform speech-synthesis engine
pub trait SynthesisEngine: Send {
    fn voices(&self) -> Vec<Voice>;

    /// Queue an utterance; progress arrives as [`SynthesisEvent`]s
    fn speak(&mut self, utterance: Utterance);

    /// Drop the current and all queued utterances
    fn cancel(&mut self);

    fn pause(&mut self);

    fn resume(&mut self);

    /// Register or unregister interest in voice-list changes
    fn watch_voices(&mut self, enabled: bool);
}

/// Callbacks delivered by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisEvent {
    Start { id: UtteranceId },
    End { id: UtteranceId },
    Error { id: UtteranceId, code: String },
    Pause { id: UtteranceId },
    Resume { id: UtteranceId },
    VoicesChanged,
}

/// Playback defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechSettings {
    /// Speaking rate (slightly slow for young listeners)
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    pub lang: String,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            rate: 0.9,
            pitch: 1.0,
            volume: 1.0,
            lang: DEFAULT_LANG.to_string(),
        }
    }
}

/// Per-call overrides for [`SpeechSynthesis::speak`]
#[derive(Clone, Default)]
pub struct SpeakOptions {
    pub rate: Option<f32>,
    pub pitch: Option<f32>,
    pub volume: Option<f32>,
    pub lang: Option<String>,
    pub on_end: Option<EndCallback>,
    pub on_error: Option<ErrorCallback>,
}

impl SpeakOptions {
    pub fn on_end(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_end = Some(Arc::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }
}

/// Observable playback state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisStatus {
    pub is_speaking: bool,
    pub is_paused: bool,
    pub is_supported: bool,
    pub current_text: String,
}

struct ActiveUtterance {
    id: UtteranceId,
    text: String,
    on_end: Option<EndCallback>,
    on_error: Option<ErrorCallback>,
}

pub struct SpeechSynthesis {
    engine: Option<Box<dyn SynthesisEngine>>,
    settings: SpeechSettings,
    default_on_end: Option<EndCallback>,
    default_on_error: Option<ErrorCallback>,
    voices: Vec<Voice>,
    is_speaking: bool,
    is_paused: bool,
    current_text: String,
    active: Option<ActiveUtterance>,
    next_id: UtteranceId,
}

impl SpeechSynthesis {
    /// Wrap `engine`; `None` means the platform has no speech synthesis
    pub fn new(engine: Option<Box<dyn SynthesisEngine>>, settings: SpeechSettings) -> Self {
        let mut engine = engine;
        let voices = match engine.as_mut() {
            Some(engine) => {
                engine.watch_voices(true);
                engine.voices()
            }
            None => {
                tracing::warn!("Speech synthesis not available on this platform");
                Vec::new()
            }
        };
        tracing::debug!("Loaded {} synthesis voices", voices.len());

        Self {
            engine,
            settings,
            default_on_end: None,
            default_on_error: None,
            voices,
            is_speaking: false,
            is_paused: false,
            current_text: String::new(),
            active: None,
            next_id: 1,
        }
    }

    pub fn with_on_end(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.default_on_end = Some(Arc::new(callback));
        self
    }

    pub fn with_on_error(mut self, callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.default_on_error = Some(Arc::new(callback));
        self
    }

    pub fn is_supported(&self) -> bool {
        self.engine.is_some()
    }

    pub fn is_speaking(&self) -> bool {
        self.is_speaking
    }

    pub fn is_paused(&self) -> bool {
        self.is_paused
    }

    pub fn current_text(&self) -> &str {
        &self.current_text
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn settings(&self) -> &SpeechSettings {
        &self.settings
    }

    pub fn status(&self) -> SynthesisStatus {
        SynthesisStatus {
            is_speaking: self.is_speaking,
            is_paused: self.is_paused,
            is_supported: self.is_supported(),
            current_text: self.current_text.clone(),
        }
    }

    /// Voice used for `lang`: first language match, else the first voice
    pub fn select_voice(&self, lang: &str) -> Option<&Voice> {
        self.voices
            .iter()
            .find(|v| v.matches_lang(lang))
            .or_else(|| self.voices.first())
    }

    /// Speak `text`, replacing anything currently playing
    ///
    /// Returns `false` when synthesis is unsupported or the text is blank.
    pub fn speak(&mut self, text: &str, options: SpeakOptions) -> bool {
        if self.engine.is_none() {
            tracing::error!("Speech synthesis is not supported");
            return false;
        }
        if text.trim().is_empty() {
            tracing::warn!("Cannot speak empty text");
            return false;
        }

        let id = self.next_id;
        self.next_id += 1;

        let lang = options.lang.unwrap_or_else(|| self.settings.lang.clone());
        let utterance = Utterance {
            id,
            text: text.to_string(),
            rate: options.rate.unwrap_or(self.settings.rate),
            pitch: options.pitch.unwrap_or(self.settings.pitch),
            volume: options.volume.unwrap_or(self.settings.volume),
            voice: self.select_voice(&lang).cloned(),
            lang,
        };

        self.active = Some(ActiveUtterance {
            id,
            text: utterance.text.clone(),
            on_end: options.on_end.or_else(|| self.default_on_end.clone()),
            on_error: options.on_error.or_else(|| self.default_on_error.clone()),
        });

        if let Some(engine) = self.engine.as_mut() {
            engine.cancel();
            tracing::debug!("Speaking utterance {} ({} chars)", id, utterance.text.chars().count());
            engine.speak(utterance);
        }
        true
    }

    /// Pause playback; only effective while speaking and not already paused
    pub fn pause(&mut self) {
        if !(self.is_speaking && !self.is_paused) {
            return;
        }
        if let Some(engine) = self.engine.as_mut() {
            engine.pause();
        }
    }

    /// Resume playback; only effective while paused
    pub fn resume(&mut self) {
        if !self.is_paused {
            return;
        }
        if let Some(engine) = self.engine.as_mut() {
            engine.resume();
        }
    }

    /// Stop playback and reset state unconditionally
    pub fn cancel(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.cancel();
        }
        self.reset();
        self.active = None;
    }

    /// Apply an engine callback
    pub fn handle_event(&mut self, event: SynthesisEvent) {
        match event {
            SynthesisEvent::VoicesChanged => {
                if let Some(engine) = self.engine.as_ref() {
                    self.voices = engine.voices();
                    tracing::debug!("Synthesis voices changed ({} available)", self.voices.len());
                }
            }
            SynthesisEvent::Start { id } => {
                let Some(active) = self.active_for(id) else {
                    return;
                };
                let text = active.text.clone();
                self.is_speaking = true;
                self.is_paused = false;
                self.current_text = text;
            }
            SynthesisEvent::Pause { id } => {
                if self.active_for(id).is_some() {
                    self.is_paused = true;
                }
            }
            SynthesisEvent::Resume { id } => {
                if self.active_for(id).is_some() {
                    self.is_paused = false;
                }
            }
            SynthesisEvent::End { id } => {
                if self.active_for(id).is_none() {
                    return;
                }
                let finished = self.active.take();
                self.reset();
                if let Some(on_end) = finished.and_then(|a| a.on_end) {
                    on_end();
                }
            }
            SynthesisEvent::Error { id, code } => {
                if self.active_for(id).is_none() {
                    tracing::debug!("Ignoring error '{}' from superseded utterance {}", code, id);
                    return;
                }
                tracing::error!("Speech synthesis error: {}", code);
                let failed = self.active.take();
                self.reset();

                let message = synthesis_error_message(&code);
                if let Some(on_error) = failed.and_then(|a| a.on_error) {
                    on_error(&message);
                }
            }
        }
    }

    fn active_for(&self, id: UtteranceId) -> Option<&ActiveUtterance> {
        self.active.as_ref().filter(|a| a.id == id)
    }

    fn reset(&mut self) {
        self.is_speaking = false;
        self.is_paused = false;
        self.current_text.clear();
    }
}

impl Drop for SpeechSynthesis {
    fn drop(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.watch_voices(false);
            engine.cancel();
        }
    }
}
