//! Tone Synthesizer
//!
//! Phase-continuous sine generator. The sample index keeps counting across
//! blocks, so consecutive blocks join without a phase jump. A new synth (and
//! so index 0) is created only when a tone session opens.

use std::f64::consts::TAU;

/// Tone selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToneParams {
    /// Tone frequency (Hz)
    pub frequency_hz: u32,

    /// Peak amplitude in 16-bit sample units
    pub amplitude: i16,
}

impl Default for ToneParams {
    fn default() -> Self {
        Self {
            frequency_hz: 441,
            amplitude: 0x00ff,
        }
    }
}

/// Sine generator emitting fixed-size interleaved stereo blocks
#[derive(Debug, Clone)]
pub struct ToneSynth {
    params: ToneParams,
    sample_rate: u32,
    index: u64,
    block: Vec<i16>,
}

impl ToneSynth {
    /// Create a synth producing `block_frames` stereo frames per block
    pub fn new(params: ToneParams, sample_rate: u32, block_frames: usize) -> Self {
        Self {
            params,
            sample_rate: sample_rate.max(1),
            index: 0,
            block: vec![0; block_frames.max(1) * 2],
        }
    }

    pub fn params(&self) -> ToneParams {
        self.params
    }

    /// Index of the next sample to be generated
    pub fn position(&self) -> u64 {
        self.index
    }

    /// Waveform value at absolute sample `index`.
    ///
    /// Phase is reduced with integer arithmetic first, so precision does not
    /// degrade as the index grows.
    pub fn sample_at(&self, index: u64) -> i16 {
        waveform(self.params, self.sample_rate, index)
    }

    /// Generate the next block (left = right)
    pub fn next_block(&mut self) -> &[i16] {
        let start = self.index;
        for (i, frame) in self.block.chunks_exact_mut(2).enumerate() {
            let sample = waveform(self.params, self.sample_rate, start + i as u64);
            frame[0] = sample;
            frame[1] = sample;
        }
        self.index += (self.block.len() / 2) as u64;
        &self.block
    }
}

fn waveform(params: ToneParams, sample_rate: u32, index: u64) -> i16 {
    let rate = sample_rate as u64;
    let phase = (index % rate) * params.frequency_hz as u64 % rate;
    let angle = TAU * phase as f64 / rate as f64;
    (angle.sin() * params.amplitude as f64) as i16
}
