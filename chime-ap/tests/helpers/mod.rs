//! Test helper modules for chime-ap integration tests
//!
//! - RecordingSink: output sink that logs every call
//! - frame_stream: synthetic MPEG frame files plus a scripted decoder

#![allow(dead_code)]

pub mod frame_stream;
pub mod recording_sink;

pub use frame_stream::{
    frame_tags, numbered_frames, write_stream, FrameSpec, ScriptedDecoder, FRAME_SAMPLES,
};
pub use recording_sink::{RecordingSink, SinkEvent, SinkLog};

use chime_ap::audio::stream::DecodeConfig;
use chime_ap::audio::tone::ToneParams;
use chime_ap::{AudioPlayer, PlaybackState, PlayerConfig};
use std::time::{Duration, Instant};

/// Stereo frames per tone block in [`test_config`]
pub const TONE_BLOCK_FRAMES: usize = 441;

/// Small, fast configuration: 4 KB input buffer, 2 frames per batch
pub fn test_config() -> PlayerConfig {
    PlayerConfig {
        sample_rate: 44_100,
        decode: DecodeConfig {
            input_capacity: 4_000,
            frames_per_batch: 2,
            lookahead: 1_500,
            attenuation: 2,
            sample_rate: 44_100,
        },
        tone: ToneParams::default(),
        tone_block_frames: TONE_BLOCK_FRAMES,
        pause_poll: Duration::from_millis(10),
        source_lock_timeout: Duration::from_millis(200),
        write_timeout: Duration::from_millis(500),
        output_buffer_frames: 4_096,
        output_device: None,
    }
}

/// Spawn a player writing into a [`RecordingSink`] that takes
/// `write_delay` per write
pub fn spawn_recording(config: PlayerConfig, write_delay: Duration) -> (AudioPlayer, SinkLog) {
    let log = SinkLog::default();
    let sink_log = log.clone();

    let player = AudioPlayer::spawn(
        config,
        move || Ok(RecordingSink::new(sink_log, write_delay)),
        || Ok(ScriptedDecoder),
    )
    .expect("player should start");

    (player, log)
}

/// Poll `condition` until it holds or `timeout` elapses
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
}

/// Wait for the player to reach `state`
pub fn wait_for_state(handle: &chime_ap::AudioHandle, state: PlaybackState) -> bool {
    wait_until(Duration::from_secs(5), || handle.state() == state)
}

/// Every sink start must be followed by a stop before the next start
pub fn assert_start_stop_alternate(events: &[SinkEvent]) {
    let mut running = false;
    for (i, event) in events.iter().enumerate() {
        match event {
            SinkEvent::Start => {
                assert!(!running, "second start without stop at event {}", i);
                running = true;
            }
            SinkEvent::Stop => {
                assert!(running, "stop without start at event {}", i);
                running = false;
            }
            _ => {}
        }
    }
}
