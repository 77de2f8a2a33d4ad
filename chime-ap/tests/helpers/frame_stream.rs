//! Synthetic MPEG frame streams
//!
//! Each frame carries a real MPEG-1 Layer III header (128 kbps, 44.1 kHz,
//! 417 bytes) so the production header parser finds and sizes it. Byte 4
//! holds a tag identifying the frame, byte 5 an injected error (0 = none).
//! [`ScriptedDecoder`] decodes a frame to `tag * 100` in every sample, which
//! the engine attenuates to `tag * 50`.

use chime_ap::audio::decoder::{DecodedFrame, FrameDecoder, FrameError};
use std::path::{Path, PathBuf};

/// Bytes per synthetic frame
pub const FRAME_LEN: usize = 417;

/// Stereo samples produced per frame (after upmix for mono)
pub const FRAME_SAMPLES: usize = 2 * 1152;

const STEREO_HEADER: [u8; 4] = [0xFF, 0xFB, 0x90, 0x00];
const MONO_HEADER: [u8; 4] = [0xFF, 0xFB, 0x90, 0xC0];

/// Error categories by injection code (code = index + 1)
const INJECTABLE: [FrameError; 12] = [
    FrameError::InDataUnderflow,
    FrameError::MainDataUnderflow,
    FrameError::FreeBitrateSync,
    FrameError::OutOfMemory,
    FrameError::InvalidFrameHeader,
    FrameError::InvalidSideInfo,
    FrameError::InvalidScaleFactor,
    FrameError::InvalidHuffCodes,
    FrameError::InvalidDequantize,
    FrameError::InvalidImdct,
    FrameError::InvalidSubband,
    FrameError::Unknown,
];

/// One piece of a synthetic stream
#[derive(Debug, Clone, Copy)]
pub enum FrameSpec {
    Stereo(u8),
    Mono(u8),
    Corrupt(u8, FrameError),
    /// Bytes containing no sync word
    Garbage(usize),
}

impl FrameSpec {
    fn append_to(self, out: &mut Vec<u8>) {
        let (header, tag, code) = match self {
            FrameSpec::Stereo(tag) => (STEREO_HEADER, tag, 0),
            FrameSpec::Mono(tag) => (MONO_HEADER, tag, 0),
            FrameSpec::Corrupt(tag, err) => {
                let code = INJECTABLE
                    .iter()
                    .position(|e| *e == err)
                    .map(|i| i as u8 + 1)
                    .unwrap_or(0);
                (STEREO_HEADER, tag, code)
            }
            FrameSpec::Garbage(len) => {
                out.extend(std::iter::repeat(0x55).take(len));
                return;
            }
        };

        let start = out.len();
        out.extend_from_slice(&header);
        out.resize(start + FRAME_LEN, 0);
        out[start + 4] = tag;
        out[start + 5] = code;
    }
}

/// Stereo frames tagged `1..=count`
pub fn numbered_frames(count: u8) -> Vec<FrameSpec> {
    (1..=count).map(FrameSpec::Stereo).collect()
}

pub fn build_stream(frames: &[FrameSpec]) -> Vec<u8> {
    let mut out = Vec::new();
    for frame in frames {
        frame.append_to(&mut out);
    }
    out
}

/// Write a stream to `dir/name` and return its path
pub fn write_stream(dir: &Path, name: &str, frames: &[FrameSpec]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, build_stream(frames)).expect("write test stream");
    path
}

/// Recover the frame tags from file writes (tone blocks are skipped)
pub fn frame_tags(writes: &[Vec<i16>], tone_block_samples: usize) -> Vec<u8> {
    writes
        .iter()
        .filter(|w| w.len() != tone_block_samples)
        .flat_map(|w| w.chunks(FRAME_SAMPLES).map(|frame| (frame[0] / 50) as u8))
        .collect()
}

/// Decoder for synthetic frames, using the production header parser
pub struct ScriptedDecoder;

impl FrameDecoder for ScriptedDecoder {
    fn decode_frame(
        &mut self,
        input: &[u8],
        output: &mut [i16],
    ) -> Result<DecodedFrame, FrameError> {
        let info = self.frame_info(input)?;
        if input.len() < info.frame_len {
            return Err(FrameError::InDataUnderflow);
        }

        match input[5] {
            0 => {}
            code => {
                return Err(INJECTABLE
                    .get(code as usize - 1)
                    .copied()
                    .unwrap_or(FrameError::Unknown))
            }
        }

        let value = input[4] as i16 * 100;
        output[..info.output_samples].fill(value);
        Ok(DecodedFrame {
            consumed: info.frame_len,
            samples: info.output_samples,
            channels: info.channels,
        })
    }
}
