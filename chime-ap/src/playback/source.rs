//! Source Descriptor: what the controller plays next
//!
//! Requesters write the descriptor under its lock, the controller copies it
//! out under the same lock right after accepting a command. Nothing else
//! ever touches it.

use crate::audio::tone::ToneParams;
use crate::error::RequestError;
use std::path::{Path, PathBuf};

/// Longest accepted file path, in bytes
pub const MAX_PATH_LEN: usize = 128;

/// Audio source selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Synthesized sine tone
    Tone(ToneParams),

    /// Compressed audio file
    File(PathBuf),
}

impl Default for Source {
    fn default() -> Self {
        Source::Tone(ToneParams::default())
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Tone(params) => write!(f, "tone {} Hz", params.frequency_hz),
            Source::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Lock-protected source record. Requesters use a zero-wait `try_lock`,
/// the controller a bounded `try_lock_for`.
pub type SourceDescriptor = parking_lot::Mutex<Source>;

/// Check that `path` fits the descriptor and names an mp3 file
///
/// # Errors
/// - `PathTooLong` if the path exceeds [`MAX_PATH_LEN`] bytes
/// - `NotAudioFile` if the extension is not `.mp3` (any case)
pub fn validate_audio_path(path: &Path) -> Result<(), RequestError> {
    let len = path.as_os_str().len();
    if len > MAX_PATH_LEN {
        return Err(RequestError::PathTooLong {
            len,
            max: MAX_PATH_LEN,
        });
    }

    let is_mp3 = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mp3"));
    if !is_mp3 {
        return Err(RequestError::NotAudioFile(path.display().to_string()));
    }

    Ok(())
}
