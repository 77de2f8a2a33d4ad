//! Playback state and counters shared with request contexts

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
            PlaybackState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Lock-free cell publishing the controller's state.
///
/// Only the controller stores; anyone may load.
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new(state: PlaybackState) -> Self {
        Self(AtomicU8::new(Self::encode(state)))
    }

    pub fn load(&self) -> PlaybackState {
        match self.0.load(Ordering::Acquire) {
            1 => PlaybackState::Playing,
            2 => PlaybackState::Paused,
            _ => PlaybackState::Stopped,
        }
    }

    pub fn store(&self, state: PlaybackState) {
        self.0.store(Self::encode(state), Ordering::Release);
    }

    fn encode(state: PlaybackState) -> u8 {
        match state {
            PlaybackState::Stopped => 0,
            PlaybackState::Playing => 1,
            PlaybackState::Paused => 2,
        }
    }
}

/// Snapshot of controller activity counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerStats {
    /// Sessions opened (tone or file)
    pub sessions_opened: u64,

    /// Blocks handed to the sink
    pub blocks_written: u64,

    /// Sink writes that timed out before accepting the whole block
    pub short_writes: u64,

    /// Sessions that ended on an I/O or allocation failure
    pub session_errors: u64,
}

/// Counters behind [`PlayerStats`]
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub sessions_opened: AtomicU64,
    pub blocks_written: AtomicU64,
    pub short_writes: AtomicU64,
    pub session_errors: AtomicU64,
}

impl StatsCounters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PlayerStats {
        PlayerStats {
            sessions_opened: self.sessions_opened.load(Ordering::Relaxed),
            blocks_written: self.blocks_written.load(Ordering::Relaxed),
            short_writes: self.short_writes.load(Ordering::Relaxed),
            session_errors: self.session_errors.load(Ordering::Relaxed),
        }
    }
}
