//! Audio output using cpal
//!
//! [`DeviceSink`] implements [`OutputSink`] on a real sound device. Samples
//! written by the controller go into a lock-free ring; the cpal callback pops
//! from the ring and plays silence whenever it runs dry.
//!
//! The ring plays the role of the DMA buffer: `write` blocks only while it
//! is full. Stopping pauses the stream (ring contents stay put); zeroing the
//! buffer drops stream and ring together, and they are rebuilt on the next
//! `start` or `write`.

use crate::audio::sink::{OutputSink, SinkClock};
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Poll interval while the ring is full
const FULL_BACKOFF: Duration = Duration::from_millis(1);

/// Sound-device output sink.
///
/// Must be created and used on one thread (cpal streams are not `Send`).
pub struct DeviceSink {
    device: Device,
    config: StreamConfig,
    sample_format: SampleFormat,
    capacity_samples: usize,
    stream: Option<Stream>,
    producer: Option<HeapProd<i16>>,
    playing: bool,
}

impl DeviceSink {
    /// Open an output device.
    ///
    /// # Arguments
    /// - `device_name`: Device to use (None = default, unknown names fall
    ///   back to the default device)
    /// - `buffer_frames`: Ring capacity in stereo frames
    pub fn new(device_name: Option<&str>, buffer_frames: usize) -> Result<Self> {
        let host = cpal::default_host();

        let named = match device_name {
            Some(name) => {
                let found = host
                    .output_devices()
                    .map_err(|e| Error::Sink(format!("Failed to enumerate devices: {}", e)))?
                    .find(|d| d.name().ok().as_deref() == Some(name));
                if found.is_none() {
                    warn!("Requested device '{}' not found, falling back to default device", name);
                }
                found
            }
            None => None,
        };

        let device = match named {
            Some(device) => device,
            None => host
                .default_output_device()
                .ok_or_else(|| Error::Sink("No default output device found".to_string()))?,
        };

        let supported = device
            .default_output_config()
            .map_err(|e| Error::Sink(format!("Failed to query device config: {}", e)))?;
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.into();

        info!(
            "Using audio device: {} ({:?})",
            device.name().unwrap_or_else(|_| "Unknown".to_string()),
            sample_format
        );

        Ok(Self {
            device,
            config,
            sample_format,
            capacity_samples: buffer_frames.max(1) * 2,
            stream: None,
            producer: None,
            playing: false,
        })
    }

    /// Build stream and ring if they were torn down
    fn ensure_stream(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let (producer, consumer) = HeapRb::<i16>::new(self.capacity_samples).split();
        let stream = match self.sample_format {
            SampleFormat::F32 => self.build_stream::<f32>(consumer)?,
            SampleFormat::I16 => self.build_stream::<i16>(consumer)?,
            SampleFormat::U16 => self.build_stream::<u16>(consumer)?,
            other => {
                return Err(Error::Sink(format!("Unsupported sample format: {:?}", other)));
            }
        };

        // Some hosts start streams on creation
        stream
            .pause()
            .map_err(|e| Error::Sink(format!("Failed to pause new stream: {}", e)))?;

        debug!(
            "Built output stream: {} Hz, {} channels, ring {} samples",
            self.config.sample_rate.0, self.config.channels, self.capacity_samples
        );
        self.stream = Some(stream);
        self.producer = Some(producer);
        self.playing = false;
        Ok(())
    }

    fn build_stream<T>(&self, mut consumer: HeapCons<i16>) -> Result<Stream>
    where
        T: SizedSample + FromSample<i16>,
    {
        self.device
            .build_output_stream(
                &self.config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    for out in data.iter_mut() {
                        *out = consumer
                            .try_pop()
                            .map_or(T::EQUILIBRIUM, |s| T::from_sample(s));
                    }
                },
                |err| error!("Audio stream error: {}", err),
                None,
            )
            .map_err(|e| Error::Sink(format!("Failed to build stream: {}", e)))
    }

    fn teardown(&mut self) {
        self.stream = None;
        self.producer = None;
        self.playing = false;
    }
}

impl OutputSink for DeviceSink {
    fn configure_clock(&mut self, clock: SinkClock) -> Result<()> {
        if clock.bits_per_sample != 16 {
            return Err(Error::Sink(format!(
                "Unsupported sample width: {} bits",
                clock.bits_per_sample
            )));
        }
        self.config.sample_rate = cpal::SampleRate(clock.sample_rate);
        self.config.channels = clock.channels;
        self.teardown();
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.ensure_stream()?;
        if let Some(stream) = &self.stream {
            stream
                .play()
                .map_err(|e| Error::Sink(format!("Failed to start stream: {}", e)))?;
            self.playing = true;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(stream) = &self.stream {
            if self.playing {
                stream
                    .pause()
                    .map_err(|e| Error::Sink(format!("Failed to pause stream: {}", e)))?;
            }
        }
        self.playing = false;
        Ok(())
    }

    fn zero_buffer(&mut self) -> Result<()> {
        let was_playing = self.playing;
        self.teardown();
        if was_playing {
            self.start()?;
        }
        Ok(())
    }

    fn write(&mut self, samples: &[i16], timeout: Duration) -> Result<usize> {
        self.ensure_stream()?;
        let producer = self
            .producer
            .as_mut()
            .ok_or_else(|| Error::Sink("Output ring missing".to_string()))?;

        let deadline = Instant::now() + timeout;
        let mut written = 0;
        while written < samples.len() {
            written += producer.push_slice(&samples[written..]);
            if written == samples.len() || Instant::now() >= deadline {
                break;
            }
            std::thread::sleep(FULL_BACKOFF);
        }
        Ok(written)
    }
}
