//! Output sink that records every call
//!
//! Writes can be held at a gate so a test can pin the controller inside its
//! blocking write and exercise the mailbox deterministically.

use chime_ap::audio::sink::{OutputSink, SinkClock};
use chime_ap::Result;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One call into the sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Clock(SinkClock),
    Start,
    Stop,
    Zero,
    Write(Vec<i16>),
}

#[derive(Default)]
struct LogInner {
    events: Mutex<Vec<SinkEvent>>,
    held: Mutex<bool>,
    gate: Condvar,
}

/// Shared view of everything a [`RecordingSink`] was asked to do
#[derive(Clone, Default)]
pub struct SinkLog {
    inner: Arc<LogInner>,
}

impl SinkLog {
    pub fn events(&self) -> Vec<SinkEvent> {
        self.inner.events.lock().clone()
    }

    /// Samples of every write, in order
    pub fn writes(&self) -> Vec<Vec<i16>> {
        self.inner
            .events
            .lock()
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Write(samples) => Some(samples.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn write_count(&self) -> usize {
        self.inner
            .events
            .lock()
            .iter()
            .filter(|e| matches!(e, SinkEvent::Write(_)))
            .count()
    }

    pub fn count(&self, event: &SinkEvent) -> usize {
        self.inner.events.lock().iter().filter(|e| *e == event).count()
    }

    /// Block writes after they are recorded until [`SinkLog::release_writes`]
    pub fn hold_writes(&self) {
        *self.inner.held.lock() = true;
    }

    pub fn release_writes(&self) {
        *self.inner.held.lock() = false;
        self.inner.gate.notify_all();
    }

    fn record(&self, event: SinkEvent) {
        self.inner.events.lock().push(event);
    }

    fn wait_at_gate(&self) {
        // Bounded so a failing test cannot hang the suite
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut held = self.inner.held.lock();
        while *held && Instant::now() < deadline {
            self.inner.gate.wait_for(&mut held, Duration::from_millis(50));
        }
    }
}

/// Sink that accepts everything and records it
pub struct RecordingSink {
    log: SinkLog,
    write_delay: Duration,
}

impl RecordingSink {
    pub fn new(log: SinkLog, write_delay: Duration) -> Self {
        Self { log, write_delay }
    }
}

impl OutputSink for RecordingSink {
    fn configure_clock(&mut self, clock: SinkClock) -> Result<()> {
        self.log.record(SinkEvent::Clock(clock));
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.log.record(SinkEvent::Start);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.log.record(SinkEvent::Stop);
        Ok(())
    }

    fn zero_buffer(&mut self) -> Result<()> {
        self.log.record(SinkEvent::Zero);
        Ok(())
    }

    fn write(&mut self, samples: &[i16], _timeout: Duration) -> Result<usize> {
        self.log.record(SinkEvent::Write(samples.to_vec()));
        self.log.wait_at_gate();
        std::thread::sleep(self.write_delay);
        Ok(samples.len())
    }
}
