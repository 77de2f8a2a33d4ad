//! Command Mailbox
//!
//! Single-slot, overwrite-protected inbox between request contexts and the
//! playback controller. A post into an occupied slot fails instead of
//! replacing the pending command; the controller empties the slot when it
//! reads it.
//!
//! The same lock also tracks whether the controller is parked, so "wake the
//! parked controller, otherwise post Swap" is a single atomic decision.

use parking_lot::{Condvar, Mutex};
use std::time::Duration;
use tracing::trace;

/// Control command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Resume a paused session
    Play,
    /// Halt output, keep the session
    Pause,
    /// Replace the session with the descriptor's current source
    Swap,
    /// End the session and park
    Stop,
}

/// How a source request reached the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// `Swap` was posted to a running controller
    Posted,
    /// A parked controller was woken
    Woken,
}

#[derive(Debug, Default)]
struct Slot {
    pending: Option<Command>,
    parked: bool,
    wake: bool,
    shutdown: bool,
}

/// One-slot command inbox
#[derive(Debug, Default)]
pub struct Mailbox {
    slot: Mutex<Slot>,
    signal: Condvar,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Post `command` if the slot is empty.
    ///
    /// A parked controller has no session to act on, so the command is
    /// accepted and dropped without occupying the slot.
    ///
    /// Returns the command back when a previous one is still pending.
    pub fn try_post(&self, command: Command) -> Result<(), Command> {
        let mut slot = self.slot.lock();
        if slot.parked && !slot.shutdown {
            trace!("Dropping {:?}: controller parked", command);
            return Ok(());
        }
        if slot.pending.is_some() {
            return Err(command);
        }
        slot.pending = Some(command);
        self.signal.notify_all();
        trace!("Posted {:?}", command);
        Ok(())
    }

    /// Take the pending command, leaving the slot empty
    pub fn take(&self) -> Option<Command> {
        self.slot.lock().pending.take()
    }

    /// Take the pending command, waiting up to `timeout` for one to arrive
    pub fn wait_for(&self, timeout: Duration) -> Option<Command> {
        let mut slot = self.slot.lock();
        if slot.pending.is_none() && !slot.shutdown {
            self.signal.wait_for(&mut slot, timeout);
        }
        slot.pending.take()
    }

    /// Wake a parked controller, or post `Swap` to a running one.
    ///
    /// Waking discards whatever was posted while the controller was parked;
    /// a parked controller reads the descriptor on its own.
    pub fn post_swap_or_wake(&self) -> Result<Delivery, Command> {
        let mut slot = self.slot.lock();
        if slot.parked {
            if let Some(stale) = slot.pending.take() {
                trace!("Discarding {:?} posted while parked", stale);
            }
            slot.wake = true;
            self.signal.notify_all();
            return Ok(Delivery::Woken);
        }

        if slot.pending.is_some() {
            return Err(Command::Swap);
        }
        slot.pending = Some(Command::Swap);
        self.signal.notify_all();
        Ok(Delivery::Posted)
    }

    /// Block until woken by a source request or shutdown.
    ///
    /// A `Swap` that was posted just before parking counts as a wake; any
    /// other pending command is stale and dropped.
    ///
    /// # Returns
    /// `false` if the mailbox was shut down
    pub fn park(&self) -> bool {
        let mut slot = self.slot.lock();
        match slot.pending.take() {
            Some(Command::Swap) => return !slot.shutdown,
            Some(stale) => trace!("Discarding {:?} on park", stale),
            None => {}
        }

        slot.parked = true;
        slot.wake = false;
        while !slot.wake && !slot.shutdown {
            self.signal.wait(&mut slot);
        }
        slot.parked = false;
        slot.wake = false;
        !slot.shutdown
    }

    /// Whether the controller is currently parked
    pub fn is_parked(&self) -> bool {
        self.slot.lock().parked
    }

    /// Release every waiter and make future waits return immediately
    pub fn shutdown(&self) {
        let mut slot = self.slot.lock();
        slot.shutdown = true;
        self.signal.notify_all();
    }

    pub fn is_shut_down(&self) -> bool {
        self.slot.lock().shutdown
    }
}
