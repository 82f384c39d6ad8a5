//! Sustained-silence detection over a live microphone stream
//!
//! The detector attaches an analyser to the stream, samples it at a bounded
//! rate and reports the volume of every sampled frame. Once the input stays
//! below the threshold for the configured duration it fires a one-shot
//! silence callback, which the voice flow uses to stop listening.
//!
//! Sampling piggybacks on an external frame cadence: whoever owns the
//! detector calls [`SilenceDetector::on_frame`] once per frame, and frames
//! arriving faster than `check_interval_ms` are skipped.
//! [`run_frame_loop`] is the tokio driver for that cadence.

use super::metering::{VolumeLevel, DEFAULT_SILENCE_THRESHOLD};
use super::{AnalyserSettings, AudioAnalyser, AudioEngine, AudioError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cadence used by [`run_frame_loop`] callers that mimic a 60 Hz display
pub const DEFAULT_FRAME_PERIOD: Duration = Duration::from_millis(16);

/// Silence detector tuning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SilenceDetectorConfig {
    /// Level (0.0-1.0) below which a frame counts as silent
    pub threshold: f32,
    /// How long the input must stay silent before the callback fires
    pub silence_duration_ms: u64,
    /// Minimum spacing between two sampled frames
    pub check_interval_ms: u64,
}

impl Default for SilenceDetectorConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_SILENCE_THRESHOLD,
            silence_duration_ms: 3000,
            check_interval_ms: 100,
        }
    }
}

/// Snapshot returned by [`SilenceDetector::status`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SilenceStatus {
    pub is_running: bool,
    /// Milliseconds since the current silent run began, if silent
    pub silence_time: Option<u64>,
}

type SilenceCallback = Box<dyn FnMut() + Send>;
type VolumeCallback = Box<dyn FnMut(&VolumeLevel) + Send>;

/// Detects sustained silence on an audio stream
///
/// Callbacks run synchronously inside [`on_frame`](Self::on_frame). When the
/// detector is shared through [`run_frame_loop`] the lock is held while they
/// run, so they must not lock the detector themselves. Use
/// [`stop_on_silence`](Self::stop_on_silence) to have the detector stop
/// itself once silence fires; the frame loop then exits on the next tick.
pub struct SilenceDetector<E: AudioEngine> {
    engine: E,
    config: SilenceDetectorConfig,
    on_silence_detected: Option<SilenceCallback>,
    on_volume_change: Option<VolumeCallback>,
    analyser: Option<Box<dyn AudioAnalyser>>,
    buffer: Vec<f32>,
    silence_started_at: Option<Instant>,
    last_check: Option<Instant>,
    running: bool,
    stop_on_silence: bool,
}

impl<E: AudioEngine> SilenceDetector<E> {
    /// Create a detector that will open streams through `engine`
    pub fn new(engine: E, config: SilenceDetectorConfig) -> Self {
        Self {
            engine,
            config,
            on_silence_detected: None,
            on_volume_change: None,
            analyser: None,
            buffer: Vec::new(),
            silence_started_at: None,
            last_check: None,
            running: false,
            stop_on_silence: false,
        }
    }

    /// Register the callback fired once per sustained silent run
    pub fn on_silence_detected(mut self, callback: impl FnMut() + Send + 'static) -> Self {
        self.on_silence_detected = Some(Box::new(callback));
        self
    }

    /// Register the callback fired for every sampled frame
    pub fn on_volume_change(
        mut self,
        callback: impl FnMut(&VolumeLevel) + Send + 'static,
    ) -> Self {
        self.on_volume_change = Some(Box::new(callback));
        self
    }

    /// Stop sampling right after the silence callback fires
    pub fn stop_on_silence(mut self) -> Self {
        self.stop_on_silence = true;
        self
    }

    pub fn config(&self) -> &SilenceDetectorConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Start sampling `stream`
    ///
    /// Calling this while already running logs a warning and leaves the
    /// existing sampling untouched.
    pub fn start(&mut self, stream: &E::Stream) -> Result<(), AudioError> {
        self.start_at(stream, Instant::now())
    }

    /// Start sampling with an explicit start time
    pub fn start_at(&mut self, stream: &E::Stream, now: Instant) -> Result<(), AudioError> {
        if self.running {
            tracing::warn!("SilenceDetector is already running");
            return Ok(());
        }

        let settings = AnalyserSettings::default();
        let analyser = match self.engine.open(stream, &settings) {
            Ok(analyser) => analyser,
            Err(e) => {
                tracing::error!("Failed to start SilenceDetector: {}", e);
                self.stop();
                return Err(e);
            }
        };

        self.buffer = vec![0.0; settings.frame_size()];
        self.analyser = Some(analyser);
        self.running = true;
        self.silence_started_at = None;
        self.last_check = Some(now);

        tracing::debug!(
            "SilenceDetector started (threshold={}, duration={}ms, interval={}ms)",
            self.config.threshold,
            self.config.silence_duration_ms,
            self.config.check_interval_ms
        );
        Ok(())
    }

    /// Stop sampling and release the analyser
    ///
    /// Safe to call repeatedly or before [`start`](Self::start).
    pub fn stop(&mut self) {
        let was_running = self.running;
        self.running = false;

        if let Some(mut analyser) = self.analyser.take() {
            analyser.close();
        }

        self.buffer.clear();
        self.silence_started_at = None;
        self.last_check = None;

        if was_running {
            tracing::debug!("SilenceDetector stopped");
        }
    }

    /// Clear the silence timer without touching the sampling state
    pub fn reset_silence_timer(&mut self) {
        self.silence_started_at = None;
    }

    /// Advance the detector by one display frame
    ///
    /// Returns the reading when this frame was sampled, `None` when the
    /// detector is stopped or the frame fell inside the check interval.
    pub fn on_frame(&mut self, now: Instant) -> Option<VolumeLevel> {
        if !self.running {
            return None;
        }
        let analyser = self.analyser.as_mut()?;

        let interval = Duration::from_millis(self.config.check_interval_ms);
        if let Some(last) = self.last_check {
            if now.saturating_duration_since(last) < interval {
                return None;
            }
        }
        self.last_check = Some(now);

        analyser.read_time_domain(&mut self.buffer);
        let volume = VolumeLevel::from_samples(&self.buffer, self.config.threshold);

        if let Some(callback) = self.on_volume_change.as_mut() {
            callback(&volume);
        }

        if volume.is_silent {
            match self.silence_started_at {
                None => self.silence_started_at = Some(now),
                Some(started) => {
                    let silent_for = now.saturating_duration_since(started);
                    if silent_for >= Duration::from_millis(self.config.silence_duration_ms) {
                        tracing::debug!("Silence detected after {}ms", silent_for.as_millis());
                        if let Some(callback) = self.on_silence_detected.as_mut() {
                            callback();
                        }
                        self.silence_started_at = None;
                        if self.stop_on_silence {
                            self.stop();
                        }
                    }
                }
            }
        } else {
            self.silence_started_at = None;
        }

        Some(volume)
    }

    /// Current running state and silence time
    pub fn status(&self) -> SilenceStatus {
        self.status_at(Instant::now())
    }

    /// Running state and silence time as seen at `now`
    pub fn status_at(&self, now: Instant) -> SilenceStatus {
        SilenceStatus {
            is_running: self.running,
            silence_time: self
                .silence_started_at
                .map(|started| now.saturating_duration_since(started).as_millis() as u64),
        }
    }
}

impl<E: AudioEngine> Drop for SilenceDetector<E> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Drive a shared detector from a tokio interval until it is stopped
///
/// Each tick reschedules the next one, so stopping the detector (from any
/// task holding the `Arc`, or by itself via `stop_on_silence`) ends the loop
/// on the following frame.
pub async fn run_frame_loop<E>(detector: Arc<Mutex<SilenceDetector<E>>>, frame_period: Duration)
where
    E: AudioEngine,
{
    let mut ticker = tokio::time::interval(frame_period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let now = tokio::time::Instant::now().into_std();

        let running = {
            let mut guard = detector.lock();
            if guard.is_running() {
                guard.on_frame(now);
                true
            } else {
                false
            }
        };
        if !running {
            break;
        }
    }

    tracing::debug!("Silence frame loop finished");
}

/// Take a one-off volume reading of `stream`
///
/// Samples every display frame for `duration` and returns the last reading,
/// using the default silence threshold. The analyser is closed before
/// returning.
pub async fn detect_volume_level<E>(
    engine: &mut E,
    stream: &E::Stream,
    duration: Duration,
) -> Result<VolumeLevel, AudioError>
where
    E: AudioEngine,
{
    let settings = AnalyserSettings::default();
    let mut analyser = engine.open(stream, &settings)?;
    let mut buffer = vec![0.0f32; settings.frame_size()];

    let started = tokio::time::Instant::now();
    let mut ticker = tokio::time::interval(DEFAULT_FRAME_PERIOD);

    let level = loop {
        ticker.tick().await;
        analyser.read_time_domain(&mut buffer);
        let level = VolumeLevel::from_samples(&buffer, DEFAULT_SILENCE_THRESHOLD);

        if started.elapsed() >= duration {
            break level;
        }
    };

    analyser.close();
    Ok(level)
}
