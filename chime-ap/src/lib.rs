//! # chime Audio Player Library (chime-ap)
//!
//! Playback subsystem for a battery-powered chime: one controller thread
//! streams either a decoded MP3 file or a synthesized tone to an output sink,
//! and reacts to play/pause/resume/stop/swap requests from any other thread.
//!
//! **Architecture:** single controller thread + single-slot command mailbox +
//! lock-protected source descriptor, decoding with symphonia, output through
//! a software-clocked sink or cpal (feature `device`).

pub mod audio;
pub mod config;
pub mod error;
pub mod playback;

pub use config::PlayerConfig;
pub use error::{Error, RequestError, Result};
pub use playback::{AudioHandle, AudioPlayer, PlaybackState, Source};
