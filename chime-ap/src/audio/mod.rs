//! Audio processing: output sinks, frame parsing, decoding and synthesis

pub mod decoder;
pub mod frame;
#[cfg(feature = "device")]
pub mod output;
pub mod sink;
pub mod stream;
pub mod tone;

pub use decoder::{FrameDecoder, FrameError, MpegFrameDecoder};
#[cfg(feature = "device")]
pub use output::DeviceSink;
pub use sink::{ClockedSink, OutputSink, SinkClock};
pub use stream::{Batch, DecodeConfig, DecodeSession};
pub use tone::{ToneParams, ToneSynth};
