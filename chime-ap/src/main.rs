//! Audio Player (chime-ap) - Main entry point
//!
//! Boots the playback controller and stands in for the device's button and
//! network collaborators with a line-oriented console on stdin:
//!
//! ```text
//! play [path]   play a file (no path: the startup source)
//! tone [hz]     play a tone
//! pause | resume | stop
//! toggle        button press: stopped -> play, playing -> pause, paused -> resume
//! status        print state and counters
//! quit
//! ```

use std::io::{self, BufRead};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chime_ap::audio::tone::ToneParams;
use chime_ap::audio::MpegFrameDecoder;
use chime_ap::playback::source::validate_audio_path;
use chime_ap::{AudioHandle, AudioPlayer, PlaybackState, PlayerConfig, RequestError, Source};
use chime_common::TomlConfig;
use clap::Parser;
use tracing::{info, warn};

/// Command-line arguments for chime-ap
#[derive(Parser, Debug)]
#[command(name = "chime-ap")]
#[command(about = "Chime audio player")]
#[command(version)]
struct Args {
    /// Configuration file (overrides CHIME_CONFIG and the default locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Audio file to use as the startup source
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Use a tone of this frequency (Hz) as the startup source
    #[arg(short, long, conflicts_with = "file")]
    tone: Option<u32>,

    /// Start playing the startup source immediately
    #[arg(long)]
    autoplay: bool,
}

/// One console line
#[derive(Debug, Clone, PartialEq, Eq)]
enum ConsoleCommand {
    Play(Option<PathBuf>),
    Tone(Option<u32>),
    Pause,
    Resume,
    Toggle,
    Stop,
    Status,
    Quit,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let toml = TomlConfig::load_or_default(args.config.as_deref());
    chime_common::logging::init(&toml.logging).context("Failed to initialize logging")?;

    info!("Starting chime audio player v{}", env!("CARGO_PKG_VERSION"));

    let config = PlayerConfig::from_toml(&toml).context("Invalid configuration")?;
    let startup = startup_source(&args, &toml, &config);
    info!("Startup source: {}", startup);

    let player = spawn_player(&config)?;
    let handle = player.handle();

    if args.autoplay || toml.startup.autoplay {
        if let Err(e) = select(&handle, &startup) {
            warn!("Autoplay rejected: {}", e);
        }
    }

    run_console(&handle, &startup, &config)?;

    player.shutdown();
    info!("chime audio player exited");
    Ok(())
}

/// CLI tone, then CLI file, then the configured startup file, then the tone
fn startup_source(args: &Args, toml: &TomlConfig, config: &PlayerConfig) -> Source {
    if let Some(frequency_hz) = args.tone {
        return Source::Tone(ToneParams {
            frequency_hz,
            ..config.tone
        });
    }

    let file = args
        .file
        .clone()
        .or_else(|| toml.startup.resolve_audio_file());

    match file {
        Some(path) => match validate_audio_path(&path) {
            Ok(()) => Source::File(path),
            Err(e) => {
                warn!("Ignoring startup file: {}", e);
                Source::Tone(config.tone)
            }
        },
        None => Source::Tone(config.tone),
    }
}

#[cfg(not(feature = "device"))]
fn spawn_player(config: &PlayerConfig) -> Result<AudioPlayer> {
    use chime_ap::audio::{ClockedSink, SinkClock};

    let clock = SinkClock::stereo16(config.sample_rate);
    let buffer_frames = config.output_buffer_frames;
    AudioPlayer::spawn(
        config.clone(),
        move || Ok(ClockedSink::new(clock, buffer_frames)),
        MpegFrameDecoder::new,
    )
    .context("Failed to start audio player")
}

#[cfg(feature = "device")]
fn spawn_player(config: &PlayerConfig) -> Result<AudioPlayer> {
    use chime_ap::audio::DeviceSink;

    let device = config.output_device.clone();
    let buffer_frames = config.output_buffer_frames;
    AudioPlayer::spawn(
        config.clone(),
        move || DeviceSink::new(device.as_deref(), buffer_frames),
        MpegFrameDecoder::new,
    )
    .context("Failed to start audio player")
}

fn select(handle: &AudioHandle, source: &Source) -> std::result::Result<(), RequestError> {
    match source {
        Source::Tone(params) => handle.play_tone(*params),
        Source::File(path) => handle.play_file(path),
    }
}

fn run_console(handle: &AudioHandle, startup: &Source, config: &PlayerConfig) -> Result<()> {
    let stdin = io::stdin();

    for line in stdin.lock().lines() {
        let line = line.context("Failed to read console input")?;
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                warn!("{}", e);
                continue;
            }
        };

        let result = match command {
            ConsoleCommand::Play(Some(path)) => handle.play_file(path),
            ConsoleCommand::Play(None) => select(handle, startup),
            ConsoleCommand::Tone(frequency_hz) => handle.play_tone(ToneParams {
                frequency_hz: frequency_hz.unwrap_or(config.tone.frequency_hz),
                ..config.tone
            }),
            ConsoleCommand::Pause => handle.pause(),
            ConsoleCommand::Resume => handle.resume(),
            ConsoleCommand::Toggle => match handle.state() {
                PlaybackState::Stopped => select(handle, startup),
                PlaybackState::Playing => handle.pause(),
                PlaybackState::Paused => handle.resume(),
            },
            ConsoleCommand::Stop => handle.stop(),
            ConsoleCommand::Status => {
                let stats = handle.stats();
                println!(
                    "{} (sessions {}, blocks {}, short writes {}, errors {})",
                    handle.state(),
                    stats.sessions_opened,
                    stats.blocks_written,
                    stats.short_writes,
                    stats.session_errors
                );
                Ok(())
            }
            ConsoleCommand::Quit => break,
        };

        if let Err(e) = result {
            warn!("Request rejected: {}", e);
        }
    }

    Ok(())
}

fn parse_command(line: &str) -> std::result::Result<Option<ConsoleCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let arg = words.next();

    let command = match verb {
        "play" => ConsoleCommand::Play(arg.map(PathBuf::from)),
        "tone" => ConsoleCommand::Tone(
            arg.map(|hz| {
                hz.parse::<u32>()
                    .map_err(|_| format!("Invalid tone frequency: {}", hz))
            })
            .transpose()?,
        ),
        "pause" => ConsoleCommand::Pause,
        "resume" => ConsoleCommand::Resume,
        "toggle" => ConsoleCommand::Toggle,
        "stop" => ConsoleCommand::Stop,
        "status" => ConsoleCommand::Status,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => return Err(format!("Unknown command: {}", other)),
    };
    Ok(Some(command))
}
