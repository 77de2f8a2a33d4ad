//! Output sink interface
//!
//! The playback controller talks to the audio output only through
//! [`OutputSink`]: start, stop, zero-buffer, configure-clock and a blocking
//! write with timeout. The sink is assumed to buffer samples internally
//! (DMA-style), so `write` only blocks while that buffer is full. This is the
//! loop's natural backpressure point.
//!
//! [`ClockedSink`] is a software stand-in for the DMA peripheral: it accepts
//! samples into a virtual buffer that drains at the configured sample rate.
//! The device-backed sink lives in [`crate::audio::output`].

use crate::error::Result;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Output clock configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkClock {
    /// Frames per second
    pub sample_rate: u32,

    /// Bits per sample (always 16)
    pub bits_per_sample: u16,

    /// Interleaved channel count (always 2)
    pub channels: u16,
}

impl SinkClock {
    /// 16-bit interleaved stereo at `sample_rate`
    pub fn stereo16(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            bits_per_sample: 16,
            channels: 2,
        }
    }

    /// Wall-clock duration of `frames` frames
    pub fn frames_to_duration(&self, frames: u64) -> Duration {
        Duration::from_nanos(frames.saturating_mul(1_000_000_000) / self.sample_rate.max(1) as u64)
    }

    /// Frames covering `duration` (rounded up, so a partially played frame
    /// still counts as queued)
    pub fn duration_to_frames(&self, duration: Duration) -> u64 {
        let scaled = duration.as_nanos() * self.sample_rate as u128;
        scaled.div_ceil(1_000_000_000) as u64
    }
}

/// Hardware-facing audio output.
///
/// Start/stop calls are issued by the controller so that `Playing` is the only
/// state in which the sink is running.
pub trait OutputSink {
    /// Set sample rate, sample width and channel layout
    fn configure_clock(&mut self, clock: SinkClock) -> Result<()>;

    /// Start consuming buffered samples
    fn start(&mut self) -> Result<()>;

    /// Halt output; buffered samples and position are retained
    fn stop(&mut self) -> Result<()>;

    /// Discard all buffered samples
    fn zero_buffer(&mut self) -> Result<()>;

    /// Write interleaved samples, blocking up to `timeout` while the buffer
    /// is full.
    ///
    /// # Returns
    /// Number of samples accepted (less than `samples.len()` on timeout)
    fn write(&mut self, samples: &[i16], timeout: Duration) -> Result<usize>;
}

impl<S: OutputSink + ?Sized> OutputSink for Box<S> {
    fn configure_clock(&mut self, clock: SinkClock) -> Result<()> {
        (**self).configure_clock(clock)
    }

    fn start(&mut self) -> Result<()> {
        (**self).start()
    }

    fn stop(&mut self) -> Result<()> {
        (**self).stop()
    }

    fn zero_buffer(&mut self) -> Result<()> {
        (**self).zero_buffer()
    }

    fn write(&mut self, samples: &[i16], timeout: Duration) -> Result<usize> {
        (**self).write(samples, timeout)
    }
}

/// Queue position of the virtual DMA buffer
#[derive(Debug, Clone, Copy)]
enum Backlog {
    /// Running: queued audio finishes playing at this instant
    Running { busy_until: Instant },
    /// Halted: this much audio is waiting
    Halted { queued: Duration },
}

/// Software-clocked sink.
///
/// Models a DMA-backed peripheral without hardware: the buffer holds
/// `capacity_frames` frames and drains in real time while started. Writes
/// sleep until space frees up, so a loop writing into it is paced exactly as
/// it would be by real hardware.
pub struct ClockedSink {
    clock: SinkClock,
    capacity_frames: u64,
    backlog: Backlog,
    frames_accepted: u64,
}

impl ClockedSink {
    /// Create a halted sink with room for `capacity_frames` stereo frames
    pub fn new(clock: SinkClock, capacity_frames: usize) -> Self {
        Self {
            clock,
            capacity_frames: capacity_frames.max(1) as u64,
            backlog: Backlog::Halted {
                queued: Duration::ZERO,
            },
            frames_accepted: 0,
        }
    }

    /// Frames currently waiting to be played
    pub fn queued_frames(&self) -> u64 {
        self.clock.duration_to_frames(self.queued_duration(Instant::now()))
    }

    /// Total frames accepted since creation
    pub fn frames_accepted(&self) -> u64 {
        self.frames_accepted
    }

    /// Whether the sink is currently consuming samples
    pub fn is_running(&self) -> bool {
        matches!(self.backlog, Backlog::Running { .. })
    }

    fn queued_duration(&self, now: Instant) -> Duration {
        match self.backlog {
            Backlog::Running { busy_until } => busy_until.saturating_duration_since(now),
            Backlog::Halted { queued } => queued,
        }
    }

    fn enqueue(&mut self, now: Instant, frames: u64) {
        let added = self.clock.frames_to_duration(frames);
        self.backlog = match self.backlog {
            Backlog::Running { busy_until } => Backlog::Running {
                busy_until: busy_until.max(now) + added,
            },
            Backlog::Halted { queued } => Backlog::Halted {
                queued: queued + added,
            },
        };
        self.frames_accepted += frames;
    }
}

impl OutputSink for ClockedSink {
    fn configure_clock(&mut self, clock: SinkClock) -> Result<()> {
        debug!(
            "Sink clock: {} Hz, {} bit, {} channels",
            clock.sample_rate, clock.bits_per_sample, clock.channels
        );
        self.clock = clock;
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        if let Backlog::Halted { queued } = self.backlog {
            self.backlog = Backlog::Running {
                busy_until: Instant::now() + queued,
            };
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if let Backlog::Running { busy_until } = self.backlog {
            self.backlog = Backlog::Halted {
                queued: busy_until.saturating_duration_since(Instant::now()),
            };
        }
        Ok(())
    }

    fn zero_buffer(&mut self) -> Result<()> {
        self.backlog = match self.backlog {
            Backlog::Running { .. } => Backlog::Running {
                busy_until: Instant::now(),
            },
            Backlog::Halted { .. } => Backlog::Halted {
                queued: Duration::ZERO,
            },
        };
        Ok(())
    }

    fn write(&mut self, samples: &[i16], timeout: Duration) -> Result<usize> {
        let channels = self.clock.channels.max(1) as usize;
        let total_frames = (samples.len() / channels) as u64;
        let deadline = Instant::now() + timeout;
        let mut accepted = 0u64;

        while accepted < total_frames {
            let now = Instant::now();
            let queued = self.clock.duration_to_frames(self.queued_duration(now));
            let free = self.capacity_frames.saturating_sub(queued);

            if free > 0 {
                let take = free.min(total_frames - accepted);
                self.enqueue(now, take);
                accepted += take;
                continue;
            }

            if now >= deadline {
                break;
            }

            // Sleep until enough has drained for the rest (or at least one
            // buffer's worth), bounded by the deadline. A halted sink never
            // drains, so it simply waits out the timeout.
            let wait = if self.is_running() {
                let wanted = (total_frames - accepted).min(self.capacity_frames);
                self.clock.frames_to_duration(wanted).max(Duration::from_micros(100))
            } else {
                deadline - now
            };
            std::thread::sleep(wait.min(deadline - now));
        }

        trace!("Sink accepted {} of {} frames", accepted, total_frames);
        Ok(accepted as usize * channels)
    }
}
