//! Request API
//!
//! [`AudioPlayer`] owns the controller thread; [`AudioHandle`] is the cheap,
//! cloneable front door handed to button monitors, network handlers and the
//! console. Every request is non-blocking: a zero-wait lock attempt and a
//! single mailbox post. A rejected request leaves descriptor and controller
//! untouched, and the caller decides whether to retry.

use crate::audio::decoder::FrameDecoder;
use crate::audio::sink::OutputSink;
use crate::audio::tone::ToneParams;
use crate::config::PlayerConfig;
use crate::error::{Error, RequestError, Result};
use crate::playback::controller::{Controller, Shared};
use crate::playback::mailbox::{Command, Delivery};
use crate::playback::source::{validate_audio_path, Source};
use crate::playback::state::{PlaybackState, PlayerStats};
use std::fs::File;
use std::path::Path;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

/// Name of the controller thread
pub const CONTROLLER_THREAD_NAME: &str = "chime-playback";

/// Request front door to the playback controller
#[derive(Debug, Clone)]
pub struct AudioHandle {
    shared: Arc<Shared>,
}

impl AudioHandle {
    /// Switch to playing `path`.
    ///
    /// A stopped controller is woken directly, a running one gets `Swap`.
    ///
    /// # Errors
    /// - `PathTooLong` / `NotAudioFile` for paths the descriptor cannot hold
    /// - `SourceBusy` if another request holds the descriptor
    /// - `MailboxFull` if a previous command is still pending
    /// - `ControllerGone` after shutdown
    pub fn play_file(&self, path: impl AsRef<Path>) -> std::result::Result<(), RequestError> {
        let path = path.as_ref();
        validate_audio_path(path)?;
        self.select_source(Source::File(path.to_path_buf()))
    }

    /// Switch to playing a tone
    ///
    /// # Errors
    /// Same as [`AudioHandle::play_file`], minus path validation
    pub fn play_tone(&self, params: ToneParams) -> std::result::Result<(), RequestError> {
        self.select_source(Source::Tone(params))
    }

    /// Pause the current session
    ///
    /// Pause, resume and stop are accepted and dropped while the controller
    /// is parked; there is no session for them to act on.
    ///
    /// # Errors
    /// - `MailboxFull` if a previous command is still pending
    /// - `ControllerGone` after shutdown
    pub fn pause(&self) -> std::result::Result<(), RequestError> {
        self.post(Command::Pause)
    }

    /// Resume a paused session
    pub fn resume(&self) -> std::result::Result<(), RequestError> {
        self.post(Command::Play)
    }

    /// End the current session and park the controller. A no-op when
    /// already stopped.
    pub fn stop(&self) -> std::result::Result<(), RequestError> {
        self.post(Command::Stop)
    }

    /// Current playback state
    pub fn state(&self) -> PlaybackState {
        self.shared.state.load()
    }

    /// Controller activity counters
    pub fn stats(&self) -> PlayerStats {
        self.shared.stats.snapshot()
    }

    fn select_source(&self, source: Source) -> std::result::Result<(), RequestError> {
        self.ensure_running()?;

        let mut descriptor = self.shared.source.try_lock().ok_or_else(|| {
            debug!("Rejected {}: descriptor busy", source);
            RequestError::SourceBusy
        })?;

        // The descriptor is written only once the controller has been told,
        // still under the lock, so the controller never sees a half update.
        let delivery = self.shared.mailbox.post_swap_or_wake().map_err(|_| {
            debug!("Rejected {}: command pending", source);
            RequestError::MailboxFull
        })?;

        match delivery {
            Delivery::Woken => info!("Waking controller for {}", source),
            Delivery::Posted => info!("Switching to {}", source),
        }
        *descriptor = source;
        Ok(())
    }

    fn post(&self, command: Command) -> std::result::Result<(), RequestError> {
        self.ensure_running()?;
        self.shared.mailbox.try_post(command).map_err(|rejected| {
            debug!("Rejected {:?}: command pending", rejected);
            RequestError::MailboxFull
        })
    }

    fn ensure_running(&self) -> std::result::Result<(), RequestError> {
        if self.shared.mailbox.is_shut_down() {
            return Err(RequestError::ControllerGone);
        }
        Ok(())
    }
}

/// Owner of the playback controller thread.
///
/// Dropping the player shuts the controller down and joins its thread.
pub struct AudioPlayer {
    handle: AudioHandle,
    thread: Option<JoinHandle<()>>,
}

impl AudioPlayer {
    /// Spawn the controller thread.
    ///
    /// The sink is built on the controller thread by `make_sink` (device
    /// streams cannot move between threads); `make_decoder` is called once
    /// per file session. The descriptor starts out as the configured tone.
    ///
    /// # Errors
    /// - `Startup` if the thread cannot be spawned
    /// - Whatever `make_sink` returns
    pub fn spawn<S, SF, D, DF>(config: PlayerConfig, make_sink: SF, make_decoder: DF) -> Result<Self>
    where
        S: OutputSink + 'static,
        SF: FnOnce() -> Result<S> + Send + 'static,
        D: FrameDecoder + 'static,
        DF: Fn() -> Result<D> + Send + 'static,
    {
        let shared = Arc::new(Shared::new(Source::Tone(config.tone)));
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<()>>(1);

        let thread_shared = Arc::clone(&shared);
        let thread = thread::Builder::new()
            .name(CONTROLLER_THREAD_NAME.to_string())
            .spawn(move || {
                let sink = match make_sink() {
                    Ok(sink) => {
                        let _ = ready_tx.send(Ok(()));
                        sink
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let open_reader = |path: &Path| File::open(path);
                Controller::new(thread_shared, config, sink, open_reader, make_decoder).run();
            })
            .map_err(|e| Error::Startup(format!("Failed to spawn playback thread: {}", e)))?;

        let startup = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(Error::Startup("Playback thread exited during startup".to_string())));
        if let Err(e) = startup {
            shared.mailbox.shutdown();
            let _ = thread.join();
            return Err(e);
        }

        info!("Audio player started");
        Ok(Self {
            handle: AudioHandle { shared },
            thread: Some(thread),
        })
    }

    /// Cloneable request handle
    pub fn handle(&self) -> AudioHandle {
        self.handle.clone()
    }

    /// Stop the controller and wait for its thread to exit.
    ///
    /// The active session is closed and the sink halted on the way out.
    pub fn shutdown(mut self) {
        self.join_controller();
    }

    fn join_controller(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };

        info!("Shutting down audio player");
        self.handle.shared.mailbox.shutdown();
        if thread.join().is_err() {
            error!("Playback thread panicked");
        }
    }
}

impl Drop for AudioPlayer {
    fn drop(&mut self) {
        self.join_controller();
    }
}
