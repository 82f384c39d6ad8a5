//! Audio subsystem for Sprout
//!
//! Volume metering and sustained-silence detection over a microphone
//! stream. The platform audio stack (Web Audio, cpal, ...) is reached through
//! the [`AudioEngine`] and [`AudioAnalyser`] traits so the detection logic can
//! run against fakes in tests.

pub mod metering;
pub mod silence;

pub use metering::{VolumeLevel, DEFAULT_SILENCE_THRESHOLD};
pub use silence::{
    detect_volume_level, run_frame_loop, SilenceDetector, SilenceDetectorConfig, SilenceStatus,
};

/// Errors raised while attaching to an audio stream
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("Audio engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Failed to attach to audio stream: {0}")]
    StreamRejected(String),
}

/// Analyser parameters requested when opening a stream
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyserSettings {
    /// FFT size; the time-domain frame holds half as many samples
    pub fft_size: usize,
    /// Smoothing between successive analyser frames (0.0-1.0)
    pub smoothing_time_constant: f32,
}

impl Default for AnalyserSettings {
    fn default() -> Self {
        Self {
            fft_size: 256,
            smoothing_time_constant: 0.8,
        }
    }
}

impl AnalyserSettings {
    /// Number of samples in one time-domain frame
    pub fn frame_size(&self) -> usize {
        self.fft_size / 2
    }
}

/// An analyser attached to a live stream
pub trait AudioAnalyser: Send {
    /// Fill `buffer` with the most recent time-domain samples (-1.0..1.0)
    fn read_time_domain(&mut self, buffer: &mut [f32]);

    /// Disconnect from the stream and release the processing context
    fn close(&mut self);
}

/// Platform audio stack able to attach analysers to input streams
pub trait AudioEngine: Send + 'static {
    /// Handle to a live input stream (e.g. a browser `MediaStream`)
    type Stream;

    /// Open a processing context on `stream` and attach an analyser to it
    fn open(
        &mut self,
        stream: &Self::Stream,
        settings: &AnalyserSettings,
    ) -> Result<Box<dyn AudioAnalyser>, AudioError>;
}
