//! Streaming Decode Engine
//!
//! Turns a compressed byte stream into interleaved stereo PCM, one bounded
//! batch at a time:
//!
//! 1. **Refill** - top up the input buffer from the reader
//! 2. **Decode** - up to `frames_per_batch` frames, stopping early once fewer
//!    than `lookahead` bytes remain (so the next sync search never runs off
//!    the tail)
//! 3. **Upmix / attenuate** - mono frames duplicated into both channels,
//!    every sample divided by the attenuation divisor
//! 4. **Compact** - move the unconsumed tail to the front of the buffer
//!
//! Decoder failures never escape this module. They are skipped, or end the
//! batch early, and show up only as a smaller (possibly zero) sample count.
//! Only decoded frames count toward `frames_per_batch`. A sync search that
//! finds nothing empties the input buffer and drops the whole batch.

use crate::audio::decoder::FrameDecoder;
use crate::audio::frame::MAX_SAMPLES_PER_FRAME;
use crate::error::{Error, Result};
use std::fs::File;
use std::io::{self, ErrorKind, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

/// Decode engine tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeConfig {
    /// Input buffer capacity in bytes
    pub input_capacity: usize,

    /// Maximum frames decoded per batch
    pub frames_per_batch: usize,

    /// A batch stops once this many input bytes or fewer remain
    /// (ignored after end of stream)
    pub lookahead: usize,

    /// Every output sample is integer-divided by this
    pub attenuation: i16,

    /// Operating sample rate of the sink
    pub sample_rate: u32,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            input_capacity: 16_000,
            frames_per_batch: 10,
            lookahead: 8_000,
            attenuation: 2,
            sample_rate: 44_100,
        }
    }
}

/// Outcome of one engine iteration
#[derive(Debug, PartialEq, Eq)]
pub enum Batch<'a> {
    /// Interleaved stereo samples ready for the sink
    Samples(&'a [i16]),

    /// Nothing decoded this time; keep going
    Empty,

    /// Stream ended and the input buffer is drained
    Finished,
}

/// Per-file decode state: reader, frame decoder and both buffers.
///
/// Dropping the session closes the reader and frees the buffers.
pub struct DecodeSession<R: Read, D: FrameDecoder> {
    reader: R,
    decoder: D,
    config: DecodeConfig,
    path: Option<PathBuf>,
    input: Vec<u8>,
    filled: usize,
    output: Vec<i16>,
    eof: bool,
    rate_mismatch_logged: bool,
}

impl<D: FrameDecoder> DecodeSession<File, D> {
    /// Open the file at `path` and start a session over it.
    ///
    /// # Errors
    /// Same as [`DecodeSession::open_with`]
    pub fn open(path: &Path, decoder: D, config: DecodeConfig) -> Result<Self> {
        Self::open_with(path, |path| File::open(path), decoder, config)
    }
}

impl<R: Read, D: FrameDecoder> DecodeSession<R, D> {
    /// Open `path` through `open` and start a session over the reader.
    ///
    /// A failed open is retried once before giving up.
    ///
    /// # Errors
    /// - `FileOpen` if `open` fails twice in a row
    /// - `ResourceExhausted` if the buffers cannot be allocated
    pub fn open_with<F>(path: &Path, open: F, decoder: D, config: DecodeConfig) -> Result<Self>
    where
        F: Fn(&Path) -> io::Result<R>,
    {
        let reader = match open(path) {
            Ok(reader) => reader,
            Err(e) => {
                warn!("Failed to open {} ({}), retrying", path.display(), e);
                open(path).map_err(|source| Error::FileOpen {
                    path: path.to_path_buf(),
                    source,
                })?
            }
        };

        let mut session = Self::from_reader(reader, decoder, config)?;
        session.path = Some(path.to_path_buf());
        debug!("Opened decode session for {}", path.display());
        Ok(session)
    }

    /// Start a session over an arbitrary byte stream
    ///
    /// # Errors
    /// - `ResourceExhausted` if the buffers cannot be allocated
    pub fn from_reader(reader: R, decoder: D, config: DecodeConfig) -> Result<Self> {
        let input = alloc_buffer::<u8>(config.input_capacity, "input")?;
        let output = alloc_buffer::<i16>(
            config.frames_per_batch.max(1) * MAX_SAMPLES_PER_FRAME,
            "output",
        )?;

        Ok(Self {
            reader,
            decoder,
            config,
            path: None,
            input,
            filled: 0,
            output,
            eof: false,
            rate_mismatch_logged: false,
        })
    }

    /// Bytes currently held in the input buffer
    pub fn filled(&self) -> usize {
        self.filled
    }

    /// Input buffer capacity
    pub fn capacity(&self) -> usize {
        self.input.len()
    }

    /// Whether the reader has reported end of stream
    pub fn at_eof(&self) -> bool {
        self.eof
    }

    /// File this session reads from (`None` for `from_reader` sessions)
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Top the input buffer up to capacity.
    ///
    /// Reads until the buffer is full or the reader reports end of stream.
    /// A read error is retried once.
    ///
    /// # Returns
    /// Bytes added to the buffer
    ///
    /// # Errors
    /// - `Read` if the reader fails twice
    pub fn refill(&mut self) -> Result<usize> {
        let mut added = 0;
        let mut retried = false;

        while !self.eof && self.filled < self.input.len() {
            match self.reader.read(&mut self.input[self.filled..]) {
                Ok(0) => {
                    debug!("End of stream after {} buffered bytes", self.filled);
                    self.eof = true;
                }
                Ok(n) => {
                    self.filled += n;
                    added += n;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) if !retried => {
                    warn!("Read failed ({}), retrying once", e);
                    retried = true;
                }
                Err(source) => {
                    return Err(Error::Read {
                        path: self
                            .path
                            .clone()
                            .unwrap_or_else(|| PathBuf::from("<stream>")),
                        source,
                    });
                }
            }
        }

        trace!("Refill added {} bytes ({}/{})", added, self.filled, self.input.len());
        Ok(added)
    }

    /// Decode one batch from the buffered input.
    ///
    /// # Returns
    /// Number of interleaved stereo samples now at the front of the output
    /// buffer (0 when nothing could be decoded)
    pub fn decode_batch(&mut self) -> usize {
        let end = self.filled;
        let threshold = if self.eof { 0 } else { self.config.lookahead };
        let mut offset = 0;
        let mut produced = 0;
        let mut frames = 0;

        while frames < self.config.frames_per_batch && end - offset > threshold {
            if self.output.len() - produced < MAX_SAMPLES_PER_FRAME {
                break;
            }

            let Some(sync) = self.decoder.find_sync_word(&self.input[offset..end]) else {
                debug!("No sync word in {} bytes, discarding input", end - offset);
                offset = end;
                produced = 0;
                break;
            };
            offset += sync;

            let info = match self.decoder.frame_info(&self.input[offset..end]) {
                Ok(info) => info,
                Err(e) => {
                    trace!("Bad frame header at {} ({}), resyncing", offset, e);
                    offset += 1;
                    continue;
                }
            };

            if info.sample_rate != self.config.sample_rate && !self.rate_mismatch_logged {
                warn!(
                    "Stream sample rate {} Hz differs from output rate {} Hz",
                    info.sample_rate, self.config.sample_rate
                );
                self.rate_mismatch_logged = true;
            }

            let out = &mut self.output[produced..];
            match self.decoder.decode_frame(&self.input[offset..end], out) {
                Ok(frame) => {
                    frames += 1;
                    offset += frame.consumed.clamp(1, end - offset);
                    if frame.channels == 1 {
                        upmix_mono_in_place(out, frame.samples);
                        produced += frame.samples * 2;
                    } else {
                        produced += frame.samples;
                    }
                }
                Err(e) if e.aborts_batch() => {
                    debug!("Frame decode failed ({}), ending batch", e);
                    offset += 1;
                    break;
                }
                Err(e) => {
                    debug!("Frame decode failed ({}), skipping", e);
                    offset += 1;
                }
            }
        }

        attenuate(&mut self.output[..produced], self.config.attenuation);

        self.input.copy_within(offset..end, 0);
        self.filled = end - offset;

        trace!(
            "Batch: {} frames, {} samples, {} bytes left",
            frames,
            produced,
            self.filled
        );
        produced
    }

    /// Refill, then decode one batch.
    ///
    /// # Errors
    /// - `Read` if the reader fails twice
    pub fn next_batch(&mut self) -> Result<Batch<'_>> {
        self.refill()?;

        if self.eof && self.filled == 0 {
            return Ok(Batch::Finished);
        }

        match self.decode_batch() {
            0 => Ok(Batch::Empty),
            n => Ok(Batch::Samples(&self.output[..n])),
        }
    }
}

/// Allocate a zeroed buffer, reporting allocation failure instead of aborting
fn alloc_buffer<T: Copy + Default>(len: usize, what: &str) -> Result<Vec<T>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|e| {
        Error::ResourceExhausted(format!("{} buffer of {} entries: {}", what, len, e))
    })?;
    buf.resize(len, T::default());
    Ok(buf)
}

/// Expand `mono` samples at the front of `buf` to interleaved stereo
pub fn upmix_mono_in_place(buf: &mut [i16], mono: usize) {
    let mono = mono.min(buf.len() / 2);
    for i in (0..mono).rev() {
        let sample = buf[i];
        buf[2 * i] = sample;
        buf[2 * i + 1] = sample;
    }
}

/// Integer-divide every sample by `divisor` (no-op for divisors <= 1)
pub fn attenuate(samples: &mut [i16], divisor: i16) {
    if divisor <= 1 {
        return;
    }
    for sample in samples {
        *sample /= divisor;
    }
}
