//! Configuration loading and config-file resolution
//!
//! The device reads a single TOML file at boot. Every field carries a built-in
//! default, so a missing file, a missing section or a missing key never stops
//! the device from starting: it logs a warning and falls back to defaults.
//!
//! # Config File Priority
//!
//! 1. Command-line argument (highest priority)
//! 2. `CHIME_CONFIG` environment variable
//! 3. `<user config dir>/chime/config.toml`
//! 4. `/etc/chime/config.toml`
//! 5. Built-in defaults (no file)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "CHIME_CONFIG";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Decode path settings
    pub audio: AudioConfig,

    /// Tone synthesizer settings
    pub tone: ToneConfig,

    /// Controller timing
    pub control: ControlConfig,

    /// Output sink settings
    pub output: OutputConfig,

    /// What to play at power-on
    pub startup: StartupConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Decode path settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Fixed operating sample rate of the output sink (Hz)
    pub sample_rate: u32,

    /// Every decoded sample is integer-divided by this value
    pub attenuation_divisor: i16,

    /// Capacity of the compressed input buffer (bytes)
    pub input_buffer_bytes: usize,

    /// Maximum frames decoded per loop iteration
    pub frames_per_batch: usize,

    /// Batch stops once fewer than this many input bytes remain
    pub lookahead_bytes: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            attenuation_divisor: 2,
            input_buffer_bytes: 16_000,
            frames_per_batch: 10,
            lookahead_bytes: 8_000,
        }
    }
}

/// Tone synthesizer settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToneConfig {
    /// Default tone frequency (Hz)
    pub frequency_hz: u32,

    /// Peak amplitude in 16-bit sample units
    pub amplitude: i16,

    /// Length of one synthesized block (ms)
    pub block_ms: u32,
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 441,
            amplitude: 0x00ff,
            block_ms: 400,
        }
    }
}

/// Controller timing
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Mailbox poll interval while paused (ms)
    pub pause_poll_ms: u64,

    /// Bounded wait for the source descriptor lock (ms)
    pub source_lock_timeout_ms: u64,

    /// Timeout for one blocking sink write (ms)
    pub write_timeout_ms: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            pause_poll_ms: 100,
            source_lock_timeout_ms: 1_000,
            write_timeout_ms: 2_000,
        }
    }
}

/// Output sink settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Sink buffer size in stereo frames (DMA buffer count x length)
    pub buffer_frames: usize,

    /// Output device name (None = default device)
    pub device: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            buffer_frames: 32 * 1024,
            device: None,
        }
    }
}

/// What to play at power-on
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StartupConfig {
    /// Storage mount point
    pub mount_point: PathBuf,

    /// Explicit audio file (takes precedence over `filename_file`)
    pub audio_file: Option<PathBuf>,

    /// File under the mount point whose first line names the audio file
    pub filename_file: PathBuf,

    /// Start playing immediately after boot
    pub autoplay: bool,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            mount_point: PathBuf::from("/sd"),
            audio_file: None,
            filename_file: PathBuf::from("config.txt"),
            autoplay: false,
        }
    }
}

impl StartupConfig {
    /// Resolve the audio file to play at power-on.
    ///
    /// Returns `audio_file` when set, otherwise the first non-empty line of
    /// `<mount_point>/<filename_file>` joined under the mount point. `None`
    /// means the device should fall back to the tone.
    pub fn resolve_audio_file(&self) -> Option<PathBuf> {
        if let Some(path) = &self.audio_file {
            return Some(path.clone());
        }

        let listing = self.mount_point.join(&self.filename_file);
        let content = match std::fs::read_to_string(&listing) {
            Ok(content) => content,
            Err(e) => {
                debug!("No filename file at {}: {}", listing.display(), e);
                return None;
            }
        };

        let name = content.lines().map(str::trim).find(|line| !line.is_empty())?;
        let name = name.trim_start_matches('/');
        info!("Startup audio file from {}: {}", listing.display(), name);
        Some(self.mount_point.join(name))
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl TomlConfig {
    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a TOML file
    ///
    /// # Errors
    /// - File cannot be read
    /// - TOML syntax or type error
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded TOML configuration from {}", path.display());
        Ok(config)
    }

    /// Load configuration, degrading to defaults instead of failing.
    ///
    /// A missing or malformed file is logged and replaced by built-in
    /// defaults; the device always boots.
    pub fn load_or_default(cli_path: Option<&Path>) -> Self {
        match resolve_config_path(cli_path) {
            Some(path) => match Self::load(&path) {
                Ok(config) => config,
                Err(e) => {
                    warn!("{} - using built-in defaults", e);
                    Self::default()
                }
            },
            None => {
                warn!("No config file found - using built-in defaults");
                Self::default()
            }
        }
    }
}

/// Locate the configuration file following the documented priority order.
///
/// A CLI or environment path is returned even if it does not exist, so the
/// caller reports the explicit request instead of silently picking another
/// file.
pub fn resolve_config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3/4: user then system config file
    let user_config = dirs::config_dir().map(|d| d.join("chime").join("config.toml"));
    let system_config = PathBuf::from("/etc/chime/config.toml");

    user_config
        .into_iter()
        .chain(std::iter::once(system_config))
        .find(|path| path.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_device_firmware() {
        let config = TomlConfig::default();
        assert_eq!(config.audio.sample_rate, 44_100);
        assert_eq!(config.audio.input_buffer_bytes, 16_000);
        assert_eq!(config.audio.frames_per_batch, 10);
        assert_eq!(config.audio.lookahead_bytes, 8_000);
        assert_eq!(config.audio.attenuation_divisor, 2);
        assert_eq!(config.tone.amplitude, 255);
        assert_eq!(config.control.pause_poll_ms, 100);
        assert_eq!(config.output.buffer_frames, 32_768);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = TomlConfig::from_toml_str(
            r#"
            [audio]
            attenuation_divisor = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.audio.attenuation_divisor, 4);
        assert_eq!(config.audio.input_buffer_bytes, 16_000);
        assert_eq!(config.tone.frequency_hz, 441);
    }

    #[test]
    fn test_type_error_is_reported() {
        let result = TomlConfig::from_toml_str("[audio]\nsample_rate = \"fast\"\n");
        assert!(matches!(result, Err(Error::Toml(_))));
    }

    #[test]
    fn test_explicit_audio_file_wins() {
        let startup = StartupConfig {
            audio_file: Some(PathBuf::from("/sd/alarm.mp3")),
            ..StartupConfig::default()
        };
        assert_eq!(startup.resolve_audio_file(), Some(PathBuf::from("/sd/alarm.mp3")));
    }
}
