//! Playback control: source descriptor, mailbox, controller and request API

pub mod controller;
pub mod mailbox;
pub mod requests;
pub mod source;
pub mod state;

pub use mailbox::{Command, Mailbox};
pub use requests::{AudioHandle, AudioPlayer};
pub use source::{Source, MAX_PATH_LEN};
pub use state::{PlaybackState, PlayerStats};
