//! Volume metering for microphone input
//!
//! Converts a frame of time-domain samples into the normalised level,
//! silence flag and approximate decibel value shown in the UI.

use serde::Serialize;

/// Gain applied to raw RMS before clamping to 0.0-1.0
///
/// Speech from a laptop microphone rarely exceeds 0.1 RMS, so the raw value
/// is scaled up to make the level meter usable.
pub const LEVEL_GAIN: f32 = 10.0;

/// Default level below which a frame counts as silent
pub const DEFAULT_SILENCE_THRESHOLD: f32 = 0.02;

/// Volume reading for one sampling tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeLevel {
    /// Normalised level, 0.0-1.0
    pub level: f32,
    /// Whether `level` is below the silence threshold
    pub is_silent: bool,
    /// Approximate dB of the raw RMS (negative infinity for digital silence)
    pub decibels: f32,
}

impl VolumeLevel {
    /// Measure a frame of samples against `threshold`
    pub fn from_samples(samples: &[f32], threshold: f32) -> Self {
        let rms = calculate_rms(samples);
        let level = normalised_level(rms);

        Self {
            level,
            is_silent: level < threshold,
            decibels: amplitude_to_db(rms),
        }
    }
}

/// Calculate RMS level for a buffer of samples
pub fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Map raw RMS onto the 0.0-1.0 display range
pub fn normalised_level(rms: f32) -> f32 {
    (rms * LEVEL_GAIN).min(1.0)
}

/// Convert linear amplitude to decibels
pub fn amplitude_to_db(amplitude: f32) -> f32 {
    if amplitude > 0.0 {
        20.0 * amplitude.log10()
    } else {
        -f32::INFINITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_frame() {
        let samples = vec![0.0f32; 128];
        let level = VolumeLevel::from_samples(&samples, DEFAULT_SILENCE_THRESHOLD);

        assert_eq!(level.level, 0.0);
        assert!(level.is_silent);
        assert_eq!(level.decibels, -f32::INFINITY);
    }

    #[test]
    fn test_full_scale_frame_clamps_level() {
        let samples = vec![1.0f32; 128];
        let level = VolumeLevel::from_samples(&samples, DEFAULT_SILENCE_THRESHOLD);

        assert!((level.level - 1.0).abs() < 0.001);
        assert!(!level.is_silent);
        assert!(level.decibels.abs() < 0.1);
    }

    #[test]
    fn test_quiet_frame_is_scaled() {
        // RMS 0.05 -> level 0.5
        let samples = vec![0.05f32; 128];
        let level = VolumeLevel::from_samples(&samples, DEFAULT_SILENCE_THRESHOLD);

        assert!((level.level - 0.5).abs() < 0.001);
        assert!(!level.is_silent);
        assert!((level.decibels - (-26.02)).abs() < 0.1);
    }

    #[test]
    fn test_threshold_boundary() {
        // RMS 0.001 -> level 0.01, below the default threshold
        let quiet = VolumeLevel::from_samples(&[0.001f32; 64], DEFAULT_SILENCE_THRESHOLD);
        assert!(quiet.is_silent);

        // RMS 0.003 -> level 0.03, above it
        let audible = VolumeLevel::from_samples(&[0.003f32; 64], DEFAULT_SILENCE_THRESHOLD);
        assert!(!audible.is_silent);
    }

    #[test]
    fn test_calculate_rms() {
        let samples = vec![0.5f32; 100];
        let rms = calculate_rms(&samples);
        assert!((rms - 0.5).abs() < 0.001);
        assert_eq!(calculate_rms(&[]), 0.0);
    }

    #[test]
    fn test_amplitude_to_db() {
        assert!((amplitude_to_db(1.0) - 0.0).abs() < 0.001);
        assert!((amplitude_to_db(0.5) - (-6.02)).abs() < 0.1);
        assert!((amplitude_to_db(0.1) - (-20.0)).abs() < 0.1);
        assert_eq!(amplitude_to_db(0.0), -f32::INFINITY);
    }
}
