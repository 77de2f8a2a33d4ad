//! Playback Controller
//!
//! The one long-lived playback context. It owns the sink, the active source
//! and the playback state; request contexts reach it only through the
//! mailbox and the source descriptor.
//!
//! Loop, by state:
//! - **Stopped**: parked on the mailbox until a source request wakes it
//! - **Paused**: waits on the mailbox with the pause poll interval as timeout
//! - **Playing**: takes any pending command, applies it, then (if still
//!   playing) produces one block and writes it to the sink. The blocking
//!   write paces the loop.
//!
//! | Current | Command | Action | Next |
//! |---|---|---|---|
//! | Stopped | (woken) | read descriptor, open session, start sink | Playing |
//! | Paused | Play | start sink | Playing |
//! | Playing | Pause | stop sink (position retained) | Paused |
//! | Playing/Paused | Swap | stop sink, zero, close, reopen from descriptor | Playing |
//! | Playing/Paused | Stop | stop sink, zero, close | Stopped |
//!
//! Play while Playing and Pause while Paused are no-ops, so every sink
//! start/stop call matches a state change.

use crate::audio::decoder::FrameDecoder;
use crate::audio::sink::{OutputSink, SinkClock};
use crate::audio::stream::{Batch, DecodeSession};
use crate::audio::tone::ToneSynth;
use crate::config::PlayerConfig;
use crate::error::Result;
use crate::playback::mailbox::{Command, Mailbox};
use crate::playback::source::{Source, SourceDescriptor};
use crate::playback::state::{PlaybackState, StateCell, StatsCounters};
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// State shared between the controller and request contexts
#[derive(Debug)]
pub(crate) struct Shared {
    pub source: SourceDescriptor,
    pub mailbox: Mailbox,
    pub state: StateCell,
    pub stats: StatsCounters,
}

impl Shared {
    pub fn new(initial: Source) -> Self {
        Self {
            source: SourceDescriptor::new(initial),
            mailbox: Mailbox::new(),
            state: StateCell::new(PlaybackState::Stopped),
            stats: StatsCounters::default(),
        }
    }
}

/// Source currently feeding the sink
enum ActiveSource<R: Read, D: FrameDecoder> {
    Tone(ToneSynth),
    File(DecodeSession<R, D>),
}

/// What one produce step left behind
enum Produced {
    Continue,
    Finished,
}

/// Owns the sink and the active session. `open_reader` and `make_decoder`
/// are called once per file session.
pub(crate) struct Controller<S, R, RF, D, DF>
where
    S: OutputSink,
    R: Read,
    RF: Fn(&Path) -> io::Result<R>,
    D: FrameDecoder,
    DF: Fn() -> Result<D>,
{
    shared: Arc<Shared>,
    config: PlayerConfig,
    sink: S,
    open_reader: RF,
    make_decoder: DF,
    active: Option<ActiveSource<R, D>>,
    state: PlaybackState,
}

impl<S, R, RF, D, DF> Controller<S, R, RF, D, DF>
where
    S: OutputSink,
    R: Read,
    RF: Fn(&Path) -> io::Result<R>,
    D: FrameDecoder,
    DF: Fn() -> Result<D>,
{
    pub fn new(
        shared: Arc<Shared>,
        config: PlayerConfig,
        sink: S,
        open_reader: RF,
        make_decoder: DF,
    ) -> Self {
        Self {
            shared,
            config,
            sink,
            open_reader,
            make_decoder,
            active: None,
            state: PlaybackState::Stopped,
        }
    }

    /// Run until the mailbox is shut down
    pub fn run(mut self) {
        info!("Playback controller started");

        while !self.shared.mailbox.is_shut_down() {
            match self.state {
                PlaybackState::Stopped => {
                    if !self.shared.mailbox.park() {
                        break;
                    }
                    self.begin_session();
                }
                PlaybackState::Paused => {
                    if let Some(command) = self.shared.mailbox.wait_for(self.config.pause_poll) {
                        self.apply(command);
                    }
                }
                PlaybackState::Playing => {
                    if let Some(command) = self.shared.mailbox.take() {
                        self.apply(command);
                    }
                    if self.state == PlaybackState::Playing {
                        self.produce();
                    }
                }
            }
        }

        if self.state != PlaybackState::Stopped {
            self.end_session();
            self.set_state(PlaybackState::Stopped);
        }
        info!("Playback controller stopped");
    }

    fn apply(&mut self, command: Command) {
        debug!("Applying {:?} in state {}", command, self.state);

        match command {
            Command::Play => {
                if self.state == PlaybackState::Paused {
                    match self.sink.start() {
                        Ok(()) => self.set_state(PlaybackState::Playing),
                        Err(e) => self.abort_session(&e),
                    }
                }
            }
            Command::Pause => {
                if self.state == PlaybackState::Playing {
                    if let Err(e) = self.sink.stop() {
                        warn!("Sink stop failed: {}", e);
                    }
                    self.set_state(PlaybackState::Paused);
                }
            }
            Command::Swap => {
                self.end_session();
                self.begin_session();
            }
            Command::Stop => {
                self.end_session();
                self.set_state(PlaybackState::Stopped);
            }
        }
    }

    /// Read the descriptor and start playing it. Any failure parks the
    /// controller.
    fn begin_session(&mut self) {
        // Copy out and release before touching controller state
        let copied = self
            .shared
            .source
            .try_lock_for(self.config.source_lock_timeout)
            .map(|descriptor| descriptor.clone());
        let source = match copied {
            Some(source) => source,
            None => {
                warn!(
                    "Source descriptor still locked after {:?}, parking",
                    self.config.source_lock_timeout
                );
                self.set_state(PlaybackState::Stopped);
                return;
            }
        };

        match self.open_session(&source) {
            Ok(active) => {
                info!("Playing {}", source);
                self.active = Some(active);
                StatsCounters::bump(&self.shared.stats.sessions_opened);
                self.set_state(PlaybackState::Playing);
            }
            Err(e) => {
                error!("Failed to start {}: {}", source, e);
                StatsCounters::bump(&self.shared.stats.session_errors);
                self.set_state(PlaybackState::Stopped);
            }
        }
    }

    fn open_session(&mut self, source: &Source) -> Result<ActiveSource<R, D>> {
        let active = match source {
            Source::Tone(params) => ActiveSource::Tone(ToneSynth::new(
                *params,
                self.config.sample_rate,
                self.config.tone_block_frames,
            )),
            Source::File(path) => {
                let decoder = (self.make_decoder)()?;
                ActiveSource::File(DecodeSession::open_with(
                    path,
                    &self.open_reader,
                    decoder,
                    self.config.decode,
                )?)
            }
        };

        self.sink
            .configure_clock(SinkClock::stereo16(self.config.sample_rate))?;
        self.sink.start()?;
        Ok(active)
    }

    /// Halt and flush the sink, then drop the session (closing its file)
    fn end_session(&mut self) {
        if self.state == PlaybackState::Playing {
            if let Err(e) = self.sink.stop() {
                warn!("Sink stop failed: {}", e);
            }
        }
        if let Err(e) = self.sink.zero_buffer() {
            warn!("Sink zero-buffer failed: {}", e);
        }
        if self.active.take().is_some() {
            debug!("Session closed");
        }
    }

    fn abort_session(&mut self, err: &crate::error::Error) {
        error!("Aborting session: {}", err);
        StatsCounters::bump(&self.shared.stats.session_errors);
        self.end_session();
        self.set_state(PlaybackState::Stopped);
    }

    /// Produce one block from the active source and write it
    fn produce(&mut self) {
        let timeout = self.config.write_timeout;
        let stats = &self.shared.stats;

        let produced = match &mut self.active {
            Some(ActiveSource::Tone(synth)) => {
                write_block(&mut self.sink, stats, synth.next_block(), timeout)
                    .map(|()| Produced::Continue)
            }
            Some(ActiveSource::File(session)) => match session.next_batch() {
                Ok(Batch::Samples(samples)) => {
                    write_block(&mut self.sink, stats, samples, timeout).map(|()| Produced::Continue)
                }
                Ok(Batch::Empty) => Ok(Produced::Continue),
                Ok(Batch::Finished) => Ok(Produced::Finished),
                Err(e) => Err(e),
            },
            None => {
                warn!("Playing without an active source");
                Ok(Produced::Finished)
            }
        };

        match produced {
            Ok(Produced::Continue) => {}
            Ok(Produced::Finished) => {
                if let Some(ActiveSource::File(session)) = &self.active {
                    info!(
                        "Finished {}",
                        session.path().map(|p| p.display().to_string()).unwrap_or_default()
                    );
                }
                self.end_session();
                self.set_state(PlaybackState::Stopped);
            }
            Err(e) => self.abort_session(&e),
        }
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state != state {
            debug!("Playback state: {} -> {}", self.state, state);
        }
        self.state = state;
        self.shared.state.store(state);
    }
}

fn write_block<S: OutputSink>(
    sink: &mut S,
    stats: &StatsCounters,
    samples: &[i16],
    timeout: Duration,
) -> Result<()> {
    let written = sink.write(samples, timeout)?;
    StatsCounters::bump(&stats.blocks_written);
    if written < samples.len() {
        warn!(
            "Sink write timed out: {} of {} samples accepted",
            written,
            samples.len()
        );
        StatsCounters::bump(&stats.short_writes);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::decoder::{DecodedFrame, FrameError};
    use crate::audio::stream::DecodeConfig;
    use crate::playback::mailbox::Delivery;
    use std::fs::File;
    use std::io::{Cursor, ErrorKind};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Instant;

    #[derive(Clone, Default)]
    struct CountingSink {
        starts: Arc<AtomicUsize>,
        stops: Arc<AtomicUsize>,
        zeros: Arc<AtomicUsize>,
        writes: Arc<AtomicUsize>,
    }

    impl CountingSink {
        fn count(counter: &AtomicUsize) -> usize {
            counter.load(Ordering::SeqCst)
        }
    }

    impl OutputSink for CountingSink {
        fn configure_clock(&mut self, _clock: SinkClock) -> Result<()> {
            Ok(())
        }

        fn start(&mut self) -> Result<()> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&mut self) -> Result<()> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn zero_buffer(&mut self) -> Result<()> {
            self.zeros.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn write(&mut self, samples: &[i16], _timeout: Duration) -> Result<usize> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(1));
            Ok(samples.len())
        }
    }

    /// Decodes every well-formed frame to silence
    struct SilentDecoder;

    impl FrameDecoder for SilentDecoder {
        fn decode_frame(
            &mut self,
            input: &[u8],
            output: &mut [i16],
        ) -> std::result::Result<DecodedFrame, FrameError> {
            let info = self.frame_info(input)?;
            if input.len() < info.frame_len {
                return Err(FrameError::InDataUnderflow);
            }
            output[..info.output_samples].fill(0);
            Ok(DecodedFrame {
                consumed: info.frame_len,
                samples: info.output_samples,
                channels: info.channels,
            })
        }
    }

    /// Serves its bytes, then fails every read (card pulled mid-stream)
    struct FailingReader(Cursor<Vec<u8>>);

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.read(buf)? {
                0 => Err(io::Error::new(ErrorKind::Other, "card removed")),
                n => Ok(n),
            }
        }
    }

    fn silent_frames(count: usize) -> Vec<u8> {
        let mut bytes = Vec::new();
        for _ in 0..count {
            let start = bytes.len();
            bytes.extend_from_slice(&[0xFF, 0xFB, 0x90, 0x00]);
            bytes.resize(start + 417, 0);
        }
        bytes
    }

    fn wait_until(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "condition never held");
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_locked_descriptor_times_out_and_parks() {
        let shared = Arc::new(Shared::new(Source::default()));
        let sink = CountingSink::default();
        let config = PlayerConfig {
            source_lock_timeout: Duration::from_millis(50),
            tone_block_frames: 441,
            ..PlayerConfig::default()
        };

        let controller = Controller::new(
            Arc::clone(&shared),
            config,
            sink.clone(),
            |path: &Path| File::open(path),
            || Ok(SilentDecoder),
        );
        let thread = thread::spawn(move || controller.run());
        wait_until(|| shared.mailbox.is_parked());

        {
            let _held = shared.source.lock();
            assert_eq!(shared.mailbox.post_swap_or_wake(), Ok(Delivery::Woken));
            thread::sleep(Duration::from_millis(150));
            assert!(shared.mailbox.is_parked());
            assert_eq!(shared.state.load(), PlaybackState::Stopped);
            assert_eq!(CountingSink::count(&sink.starts), 0);
        }

        assert_eq!(shared.mailbox.post_swap_or_wake(), Ok(Delivery::Woken));
        wait_until(|| CountingSink::count(&sink.writes) >= 2);
        assert_eq!(shared.state.load(), PlaybackState::Playing);
        assert_eq!(CountingSink::count(&sink.starts), 1);

        shared.mailbox.shutdown();
        thread.join().unwrap();
        assert_eq!(shared.state.load(), PlaybackState::Stopped);
    }

    #[test]
    fn test_read_failure_mid_session_aborts_and_parks() {
        let shared = Arc::new(Shared::new(Source::File(PathBuf::from("/sd/alarm.mp3"))));
        let sink = CountingSink::default();
        let config = PlayerConfig {
            decode: DecodeConfig {
                input_capacity: 4_000,
                frames_per_batch: 2,
                lookahead: 1_500,
                ..DecodeConfig::default()
            },
            ..PlayerConfig::default()
        };

        let stream = silent_frames(20);
        let controller = Controller::new(
            Arc::clone(&shared),
            config,
            sink.clone(),
            move |_: &Path| Ok(FailingReader(Cursor::new(stream.clone()))),
            || Ok(SilentDecoder),
        );
        let thread = thread::spawn(move || controller.run());
        wait_until(|| shared.mailbox.is_parked());

        assert_eq!(shared.mailbox.post_swap_or_wake(), Ok(Delivery::Woken));
        wait_until(|| shared.stats.snapshot().session_errors == 1);
        wait_until(|| shared.mailbox.is_parked());

        assert_eq!(shared.state.load(), PlaybackState::Stopped);
        assert!(CountingSink::count(&sink.writes) >= 1);
        assert_eq!(CountingSink::count(&sink.starts), 1);
        assert_eq!(CountingSink::count(&sink.stops), 1);
        assert_eq!(CountingSink::count(&sink.zeros), 1);
        assert_eq!(shared.stats.snapshot().sessions_opened, 1);

        shared.mailbox.shutdown();
        thread.join().unwrap();
    }
}
