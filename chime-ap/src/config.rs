//! chime-ap runtime configuration
//!
//! [`PlayerConfig`] is the typed, validated form of the shared TOML file.
//! Everything the controller and the decode engine need is resolved here once,
//! at startup.

use crate::audio::frame::MAX_FRAME_LEN;
use crate::audio::stream::DecodeConfig;
use crate::audio::tone::ToneParams;
use crate::error::{Error, Result};
use chime_common::TomlConfig;
use std::time::Duration;

/// Audio player configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerConfig {
    /// Fixed operating sample rate
    pub sample_rate: u32,

    /// Decode engine tuning
    pub decode: DecodeConfig,

    /// Tone played when no file is selected
    pub tone: ToneParams,

    /// Stereo frames per synthesized block
    pub tone_block_frames: usize,

    /// Mailbox poll interval while paused
    pub pause_poll: Duration,

    /// Bounded wait for the source descriptor lock
    pub source_lock_timeout: Duration,

    /// Timeout for one blocking sink write
    pub write_timeout: Duration,

    /// Sink buffer size in stereo frames
    pub output_buffer_frames: usize,

    /// Output device name (None = default)
    pub output_device: Option<String>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            decode: DecodeConfig::default(),
            tone: ToneParams::default(),
            tone_block_frames: 17_640,
            pause_poll: Duration::from_millis(100),
            source_lock_timeout: Duration::from_millis(1_000),
            write_timeout: Duration::from_millis(2_000),
            output_buffer_frames: 32 * 1024,
            output_device: None,
        }
    }
}

impl PlayerConfig {
    /// Build and validate the runtime configuration from the TOML file
    ///
    /// # Errors
    /// - `Config` naming the first invalid setting
    pub fn from_toml(toml: &TomlConfig) -> Result<Self> {
        let audio = &toml.audio;

        if audio.sample_rate == 0 {
            return Err(Error::Config("audio.sample_rate must be positive".to_string()));
        }
        if audio.attenuation_divisor < 1 {
            return Err(Error::Config(format!(
                "audio.attenuation_divisor must be at least 1 (got {})",
                audio.attenuation_divisor
            )));
        }
        if audio.input_buffer_bytes < MAX_FRAME_LEN {
            return Err(Error::Config(format!(
                "audio.input_buffer_bytes must hold the largest frame ({} bytes), got {}",
                MAX_FRAME_LEN, audio.input_buffer_bytes
            )));
        }
        if audio.lookahead_bytes >= audio.input_buffer_bytes {
            return Err(Error::Config(format!(
                "audio.lookahead_bytes ({}) must be smaller than audio.input_buffer_bytes ({})",
                audio.lookahead_bytes, audio.input_buffer_bytes
            )));
        }
        if audio.frames_per_batch == 0 {
            return Err(Error::Config("audio.frames_per_batch must be at least 1".to_string()));
        }

        let tone = &toml.tone;
        if tone.frequency_hz == 0 || tone.frequency_hz >= audio.sample_rate / 2 {
            return Err(Error::Config(format!(
                "tone.frequency_hz must be between 0 and {} Hz (got {})",
                audio.sample_rate / 2,
                tone.frequency_hz
            )));
        }
        let tone_block_frames = (audio.sample_rate as u64 * tone.block_ms as u64 / 1000) as usize;
        if tone_block_frames == 0 {
            return Err(Error::Config("tone.block_ms is too short for one frame".to_string()));
        }
        if toml.output.buffer_frames == 0 {
            return Err(Error::Config("output.buffer_frames must be at least 1".to_string()));
        }

        Ok(Self {
            sample_rate: audio.sample_rate,
            decode: DecodeConfig {
                input_capacity: audio.input_buffer_bytes,
                frames_per_batch: audio.frames_per_batch,
                lookahead: audio.lookahead_bytes,
                attenuation: audio.attenuation_divisor,
                sample_rate: audio.sample_rate,
            },
            tone: ToneParams {
                frequency_hz: tone.frequency_hz,
                amplitude: tone.amplitude,
            },
            tone_block_frames,
            pause_poll: Duration::from_millis(toml.control.pause_poll_ms),
            source_lock_timeout: Duration::from_millis(toml.control.source_lock_timeout_ms),
            write_timeout: Duration::from_millis(toml.control.write_timeout_ms),
            output_buffer_frames: toml.output.buffer_frames,
            output_device: toml.output.device.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_agree_with_toml_defaults() {
        let config = PlayerConfig::from_toml(&TomlConfig::default()).unwrap();
        assert_eq!(config, PlayerConfig::default());
    }

    #[test]
    fn test_rejects_invalid_settings() {
        let cases = [
            "[audio]\nattenuation_divisor = 0\n",
            "[audio]\nsample_rate = 0\n",
            "[audio]\ninput_buffer_bytes = 1000\nlookahead_bytes = 500\n",
            "[audio]\nlookahead_bytes = 16000\n",
            "[audio]\nframes_per_batch = 0\n",
            "[tone]\nfrequency_hz = 30000\n",
            "[tone]\nfrequency_hz = 0\n",
            "[tone]\nblock_ms = 0\n",
        ];

        for case in cases {
            let toml = TomlConfig::from_toml_str(case).unwrap();
            assert!(
                matches!(PlayerConfig::from_toml(&toml), Err(Error::Config(_))),
                "accepted: {}",
                case
            );
        }
    }

    #[test]
    fn test_custom_attenuation_flows_to_decoder() {
        let toml = TomlConfig::from_toml_str("[audio]\nattenuation_divisor = 4\n").unwrap();
        let config = PlayerConfig::from_toml(&toml).unwrap();
        assert_eq!(config.decode.attenuation, 4);
    }
}
