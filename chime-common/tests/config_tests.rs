//! Integration tests for configuration loading and graceful degradation
//!
//! Uses serial_test to prevent CHIME_CONFIG environment variable races.
//! Tests that touch the variable are marked with #[serial].

use chime_common::config::{resolve_config_path, StartupConfig, TomlConfig, CONFIG_ENV_VAR};
use serial_test::serial;
use std::env;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_load_full_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
        [audio]
        sample_rate = 48000
        frames_per_batch = 4

        [tone]
        frequency_hz = 880

        [control]
        pause_poll_ms = 50

        [startup]
        mount_point = "/media/card"
        autoplay = true

        [logging]
        level = "debug"
        "#,
    )
    .unwrap();

    let config = TomlConfig::load(&path).unwrap();
    assert_eq!(config.audio.sample_rate, 48_000);
    assert_eq!(config.audio.frames_per_batch, 4);
    assert_eq!(config.tone.frequency_hz, 880);
    assert_eq!(config.control.pause_poll_ms, 50);
    assert_eq!(config.startup.mount_point, PathBuf::from("/media/card"));
    assert!(config.startup.autoplay);
    assert_eq!(config.logging.level, "debug");

    // Untouched keys keep their defaults
    assert_eq!(config.audio.lookahead_bytes, 8_000);
    assert_eq!(config.control.write_timeout_ms, 2_000);
}

#[test]
fn test_missing_file_is_an_error_for_load() {
    let result = TomlConfig::load(&PathBuf::from("/nonexistent/chime/config.toml"));
    assert!(result.is_err());
}

#[test]
fn test_missing_file_degrades_to_defaults() {
    let config = TomlConfig::load_or_default(Some(&PathBuf::from("/nonexistent/chime.toml")));
    assert_eq!(config.audio.input_buffer_bytes, 16_000);
    assert_eq!(config.tone.frequency_hz, 441);
}

#[test]
fn test_malformed_file_degrades_to_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[audio\nsample_rate = ").unwrap();

    let config = TomlConfig::load_or_default(Some(&path));
    assert_eq!(config.audio.sample_rate, 44_100);
}

#[test]
#[serial]
fn test_cli_path_beats_environment() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/chime-env.toml");

    let cli = PathBuf::from("/tmp/chime-cli.toml");
    assert_eq!(resolve_config_path(Some(&cli)), Some(cli.clone()));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_environment_variable_used_without_cli() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/chime-env.toml");

    assert_eq!(
        resolve_config_path(None),
        Some(PathBuf::from("/tmp/chime-env.toml"))
    );

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
fn test_startup_file_from_filename_listing() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("config.txt"), "\n  /wake.mp3  \nignored.mp3\n").unwrap();

    let startup = StartupConfig {
        mount_point: dir.path().to_path_buf(),
        ..StartupConfig::default()
    };

    assert_eq!(startup.resolve_audio_file(), Some(dir.path().join("wake.mp3")));
}

#[test]
fn test_startup_without_listing_falls_back_to_tone() {
    let dir = TempDir::new().unwrap();
    let startup = StartupConfig {
        mount_point: dir.path().to_path_buf(),
        ..StartupConfig::default()
    };

    assert_eq!(startup.resolve_audio_file(), None);
}

#[test]
fn test_empty_listing_falls_back_to_tone() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("config.txt"), "\n   \n").unwrap();

    let startup = StartupConfig {
        mount_point: dir.path().to_path_buf(),
        ..StartupConfig::default()
    };

    assert_eq!(startup.resolve_audio_file(), None);
}
