//! Frame decoder seam
//!
//! The Streaming Decode Engine never touches the compressed format directly.
//! It asks a [`FrameDecoder`] to find a sync word, describe the frame at the
//! sync point and decode exactly one frame into PCM. [`MpegFrameDecoder`] is
//! the production implementation, backed by symphonia's MPEG audio decoder.

use crate::audio::frame::{self, FrameHeader};
use crate::error::{Error, Result};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CodecParameters, Decoder, DecoderOptions, CODEC_TYPE_MP3};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::Packet;
use thiserror::Error;
use tracing::{debug, warn};

/// Decoder failure categories.
///
/// Everything except [`FrameError::InvalidHuffCodes`] is handled by skipping
/// forward and continuing the batch.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("not enough input data")]
    InDataUnderflow,

    #[error("bit reservoir underflow")]
    MainDataUnderflow,

    #[error("free-format bitrate")]
    FreeBitrateSync,

    #[error("decoder out of memory")]
    OutOfMemory,

    #[error("invalid frame header")]
    InvalidFrameHeader,

    #[error("invalid side info")]
    InvalidSideInfo,

    #[error("invalid scale factors")]
    InvalidScaleFactor,

    #[error("corrupt huffman codes")]
    InvalidHuffCodes,

    #[error("dequantization failed")]
    InvalidDequantize,

    #[error("IMDCT failed")]
    InvalidImdct,

    #[error("subband synthesis failed")]
    InvalidSubband,

    #[error("unknown decoder error")]
    Unknown,
}

impl FrameError {
    /// Whether this error ends the current batch (samples decoded so far are
    /// kept)
    pub fn aborts_batch(self) -> bool {
        matches!(self, FrameError::InvalidHuffCodes)
    }
}

/// Description of the frame at a sync point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    /// Encoded channel count (1 or 2)
    pub channels: u16,

    /// Sample rate in Hz
    pub sample_rate: u32,

    pub bitrate_kbps: u32,

    /// Samples this frame decodes to (all channels)
    pub output_samples: usize,

    /// Frame length in bytes, header included
    pub frame_len: usize,
}

impl From<FrameHeader> for FrameInfo {
    fn from(header: FrameHeader) -> Self {
        Self {
            channels: header.channels(),
            sample_rate: header.sample_rate,
            bitrate_kbps: header.bitrate_kbps,
            output_samples: header.samples_per_channel() * header.channels() as usize,
            frame_len: header.frame_len(),
        }
    }
}

/// Result of decoding one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedFrame {
    /// Input bytes consumed
    pub consumed: usize,

    /// Samples written to the output slice (mono frames write mono samples)
    pub samples: usize,

    /// Channel count of the written samples
    pub channels: u16,
}

/// One-frame-at-a-time compressed audio decoder
pub trait FrameDecoder {
    /// Offset of the first frame sync word in `input`
    fn find_sync_word(&self, input: &[u8]) -> Option<usize> {
        frame::find_sync_word(input)
    }

    /// Describe the frame starting at `input[0]`
    fn frame_info(&self, input: &[u8]) -> std::result::Result<FrameInfo, FrameError> {
        FrameHeader::parse(input).map(FrameInfo::from)
    }

    /// Decode the frame starting at `input[0]` into `output`.
    ///
    /// `output` always has room for [`frame::MAX_SAMPLES_PER_FRAME`] samples.
    fn decode_frame(
        &mut self,
        input: &[u8],
        output: &mut [i16],
    ) -> std::result::Result<DecodedFrame, FrameError>;
}

impl<D: FrameDecoder + ?Sized> FrameDecoder for Box<D> {
    fn find_sync_word(&self, input: &[u8]) -> Option<usize> {
        (**self).find_sync_word(input)
    }

    fn frame_info(&self, input: &[u8]) -> std::result::Result<FrameInfo, FrameError> {
        (**self).frame_info(input)
    }

    fn decode_frame(
        &mut self,
        input: &[u8],
        output: &mut [i16],
    ) -> std::result::Result<DecodedFrame, FrameError> {
        (**self).decode_frame(input, output)
    }
}

/// MPEG Layer III decoder backed by symphonia.
///
/// Each frame is handed to symphonia as its own packet. The bit reservoir
/// lives inside the symphonia decoder, so frames must be fed in stream order
/// and a new `MpegFrameDecoder` is needed for every session.
pub struct MpegFrameDecoder {
    decoder: Box<dyn Decoder>,
    sample_buf: Option<SampleBuffer<i16>>,
    /// (rate, channels, capacity) the sample buffer was built for
    buf_shape: (u32, usize, u64),
    next_ts: u64,
}

impl MpegFrameDecoder {
    /// Create a decoder for a fresh stream
    ///
    /// # Errors
    /// - symphonia was built without MPEG audio support
    pub fn new() -> Result<Self> {
        let mut params = CodecParameters::new();
        params.for_codec(CODEC_TYPE_MP3);

        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| Error::Decoder(format!("Failed to create MPEG decoder: {}", e)))?;

        debug!("Created MPEG frame decoder");

        Ok(Self {
            decoder,
            sample_buf: None,
            buf_shape: (0, 0, 0),
            next_ts: 0,
        })
    }

    fn classify(&mut self, err: SymphoniaError) -> FrameError {
        match err {
            SymphoniaError::DecodeError(msg) => {
                debug!("Frame decode error: {}", msg);
                classify_decode_message(msg)
            }
            SymphoniaError::IoError(_) => FrameError::InDataUnderflow,
            SymphoniaError::Unsupported(_) => FrameError::InvalidFrameHeader,
            SymphoniaError::LimitError(_) => FrameError::OutOfMemory,
            SymphoniaError::ResetRequired => {
                warn!("MPEG decoder requested reset");
                self.decoder.reset();
                FrameError::Unknown
            }
            other => {
                debug!("Frame decode error: {}", other);
                FrameError::Unknown
            }
        }
    }
}

/// Map symphonia's decode-error text onto a failure category
fn classify_decode_message(msg: &str) -> FrameError {
    let msg = msg.to_ascii_lowercase();
    if msg.contains("huffman") {
        FrameError::InvalidHuffCodes
    } else if msg.contains("main_data") || msg.contains("main data") || msg.contains("reservoir") {
        FrameError::MainDataUnderflow
    } else if msg.contains("side") {
        FrameError::InvalidSideInfo
    } else if msg.contains("scale") {
        FrameError::InvalidScaleFactor
    } else if msg.contains("header") || msg.contains("sync") {
        FrameError::InvalidFrameHeader
    } else {
        FrameError::Unknown
    }
}

impl FrameDecoder for MpegFrameDecoder {
    fn decode_frame(
        &mut self,
        input: &[u8],
        output: &mut [i16],
    ) -> std::result::Result<DecodedFrame, FrameError> {
        let info = self.frame_info(input)?;
        let frame = input
            .get(..info.frame_len)
            .ok_or(FrameError::InDataUnderflow)?;

        let duration = (info.output_samples / info.channels as usize) as u64;
        let packet = Packet::new_from_slice(0, self.next_ts, duration, frame);
        self.next_ts += duration;

        let decoded = match self.decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(e) => return Err(self.classify(e)),
        };

        let spec = *decoded.spec();
        let shape = (spec.rate, spec.channels.count(), decoded.capacity() as u64);
        if self.sample_buf.is_none() || self.buf_shape != shape {
            self.sample_buf = Some(SampleBuffer::<i16>::new(shape.2, spec));
            self.buf_shape = shape;
        }
        let sample_buf = self.sample_buf.as_mut().ok_or(FrameError::OutOfMemory)?;
        sample_buf.copy_interleaved_ref(decoded);

        let samples = sample_buf.samples();
        let dest = output
            .get_mut(..samples.len())
            .ok_or(FrameError::OutOfMemory)?;
        dest.copy_from_slice(samples);

        Ok(DecodedFrame {
            consumed: info.frame_len,
            samples: samples.len(),
            channels: shape.1 as u16,
        })
    }
}
