//! MPEG audio frame sync and header parsing
//!
//! Locates frame boundaries in a raw byte stream and reads the 4-byte frame
//! header. Only Layer III is accepted; anything else at a sync position is
//! treated as a malformed header so the decode loop resyncs one byte further.
//!
//! Header layout (MSB first):
//!
//! ```text
//! AAAAAAAA AAABBCCD EEEEFFGH IIJJKLMM
//! A sync   B version   C layer   D no-CRC   E bitrate   F sample rate
//! G padding   H private   I channel mode   J mode ext   K copyright ...
//! ```

use crate::audio::decoder::FrameError;

/// Length of a frame header in bytes
pub const HEADER_LEN: usize = 4;

/// Interleaved stereo samples in the largest Layer III frame (1152 x 2)
pub const MAX_SAMPLES_PER_FRAME: usize = 1152 * 2;

/// Largest possible Layer III frame in bytes (320 kbps at 32 kHz, padded)
pub const MAX_FRAME_LEN: usize = 1441;

/// Layer III bitrates in kbps, MPEG-1
const BITRATES_V1: [u32; 15] = [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320];

/// Layer III bitrates in kbps, MPEG-2 and MPEG-2.5
const BITRATES_V2: [u32; 15] = [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160];

/// MPEG version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    Mpeg1,
    Mpeg2,
    Mpeg2_5,
}

impl MpegVersion {
    fn sample_rates(self) -> [u32; 3] {
        match self {
            MpegVersion::Mpeg1 => [44_100, 48_000, 32_000],
            MpegVersion::Mpeg2 => [22_050, 24_000, 16_000],
            MpegVersion::Mpeg2_5 => [11_025, 12_000, 8_000],
        }
    }
}

/// Channel mode from the header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    Stereo,
    JointStereo,
    DualChannel,
    Mono,
}

/// Parsed Layer III frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: MpegVersion,
    pub bitrate_kbps: u32,
    pub sample_rate: u32,
    pub padding: bool,
    pub has_crc: bool,
    pub channel_mode: ChannelMode,
}

/// Find the first frame sync word (11 set bits) in `input`.
///
/// Returns the offset of the sync's first byte.
pub fn find_sync_word(input: &[u8]) -> Option<usize> {
    input
        .windows(2)
        .position(|pair| pair[0] == 0xFF && pair[1] & 0xE0 == 0xE0)
}

impl FrameHeader {
    /// Parse the header at the start of `input`.
    ///
    /// # Errors
    /// - `InDataUnderflow` if fewer than 4 bytes are available
    /// - `InvalidFrameHeader` for a missing sync, reserved fields, a layer
    ///   other than III or a bad bitrate index
    /// - `FreeBitrateSync` for free-format streams (frame length unknown)
    pub fn parse(input: &[u8]) -> Result<Self, FrameError> {
        let bytes: [u8; HEADER_LEN] = input
            .get(..HEADER_LEN)
            .and_then(|b| b.try_into().ok())
            .ok_or(FrameError::InDataUnderflow)?;

        if bytes[0] != 0xFF || bytes[1] & 0xE0 != 0xE0 {
            return Err(FrameError::InvalidFrameHeader);
        }

        let version = match (bytes[1] >> 3) & 0x03 {
            0b00 => MpegVersion::Mpeg2_5,
            0b10 => MpegVersion::Mpeg2,
            0b11 => MpegVersion::Mpeg1,
            _ => return Err(FrameError::InvalidFrameHeader),
        };

        // Layer bits 01 = Layer III
        if (bytes[1] >> 1) & 0x03 != 0b01 {
            return Err(FrameError::InvalidFrameHeader);
        }
        let has_crc = bytes[1] & 0x01 == 0;

        let bitrate_index = (bytes[2] >> 4) as usize;
        let bitrate_kbps = match bitrate_index {
            0 => return Err(FrameError::FreeBitrateSync),
            15 => return Err(FrameError::InvalidFrameHeader),
            i if version == MpegVersion::Mpeg1 => BITRATES_V1[i],
            i => BITRATES_V2[i],
        };

        let rate_index = ((bytes[2] >> 2) & 0x03) as usize;
        let sample_rate = *version
            .sample_rates()
            .get(rate_index)
            .ok_or(FrameError::InvalidFrameHeader)?;

        let padding = (bytes[2] >> 1) & 0x01 == 1;
        let channel_mode = match bytes[3] >> 6 {
            0b00 => ChannelMode::Stereo,
            0b01 => ChannelMode::JointStereo,
            0b10 => ChannelMode::DualChannel,
            _ => ChannelMode::Mono,
        };

        Ok(Self {
            version,
            bitrate_kbps,
            sample_rate,
            padding,
            has_crc,
            channel_mode,
        })
    }

    /// Total frame length in bytes, header included
    pub fn frame_len(&self) -> usize {
        let coefficient = match self.version {
            MpegVersion::Mpeg1 => 144,
            MpegVersion::Mpeg2 | MpegVersion::Mpeg2_5 => 72,
        };
        (coefficient * self.bitrate_kbps * 1000 / self.sample_rate) as usize + self.padding as usize
    }

    /// PCM samples per channel produced by this frame
    pub fn samples_per_channel(&self) -> usize {
        match self.version {
            MpegVersion::Mpeg1 => 1152,
            MpegVersion::Mpeg2 | MpegVersion::Mpeg2_5 => 576,
        }
    }

    /// Number of encoded channels
    pub fn channels(&self) -> u16 {
        match self.channel_mode {
            ChannelMode::Mono => 1,
            _ => 2,
        }
    }
}
