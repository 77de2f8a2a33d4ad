//! Error types for chime-ap
//!
//! Session-level failures use [`Error`]. Control requests use the separate,
//! always-recoverable [`RequestError`]: a rejected request is reported to the
//! caller and never affects the controller.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for chime-ap
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid runtime configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Audio file could not be opened (after retry)
    #[error("Failed to open {path}: {source}")]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Audio file read failed (after retry)
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Session buffers could not be allocated
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Frame decoder could not be created
    #[error("Decoder error: {0}")]
    Decoder(String),

    /// Output sink errors
    #[error("Audio output error: {0}")]
    Sink(String),

    /// Controller thread failed to start
    #[error("Startup error: {0}")]
    Startup(String),

    /// Shared configuration/logging errors
    #[error(transparent)]
    Common(#[from] chime_common::Error),
}

/// Convenience Result type using chime-ap Error
pub type Result<T> = std::result::Result<T, Error>;

/// Why a control request was rejected.
///
/// Every variant is transient or caller-side: the caller decides whether to
/// retry or drop the request (e.g. a stale button edge).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// Another requester holds the source descriptor
    #[error("audio source is locked by another request")]
    SourceBusy,

    /// The previous command has not been consumed yet
    #[error("a previous command is still pending")]
    MailboxFull,

    /// Path exceeds the descriptor's bound
    #[error("path is {len} bytes, limit is {max}")]
    PathTooLong { len: usize, max: usize },

    /// Path does not reference a playable audio file
    #[error("not an mp3 file: {0}")]
    NotAudioFile(String),

    /// The playback controller has shut down
    #[error("playback controller is not running")]
    ControllerGone,
}
