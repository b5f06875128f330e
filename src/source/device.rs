use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, StreamConfig};
use parking_lot::{Condvar, Mutex};

use super::SampleSource;
use crate::error::CaptureError;
use crate::models::{AudioFrame, SAMPLE_RATE};

/// Frames of headroom kept before the oldest samples are dropped.
const BUFFERED_FRAMES: usize = 2;

/// How long `read` waits for samples before treating the device as gone.
const READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Samples handed over from the driver callback to the reader.
#[derive(Default)]
struct Pending {
    samples: VecDeque<i16>,
    overflows: u64,
    overflowing: bool,
    error: Option<String>,
}

impl Pending {
    /// Downmix interleaved `data` to mono and append it, keeping at most
    /// `capacity` of the newest samples.
    fn push_interleaved<T>(&mut self, data: &[T], channels: usize, capacity: usize)
    where
        T: cpal::Sample,
        i16: cpal::FromSample<T>,
    {
        for frame in data.chunks(channels.max(1)) {
            let sum: i32 = frame
                .iter()
                .map(|&s| <i16 as cpal::Sample>::from_sample(s) as i32)
                .sum();
            self.samples.push_back((sum / frame.len() as i32) as i16);
        }

        if self.samples.len() > capacity {
            let excess = self.samples.len() - capacity;
            self.samples.drain(..excess);
            self.overflows += 1;
            if !self.overflowing {
                log::debug!("Input overflow: reader is behind, dropping oldest samples");
            }
            self.overflowing = true;
        } else {
            self.overflowing = false;
        }
    }

    /// Mark the stream as failed. Buffered samples remain readable.
    fn fail(&mut self, message: String) {
        self.error.get_or_insert(message);
    }

    /// Next full frame, or the stream error once no full frame is left.
    fn take_frame(&mut self, frame_size: usize) -> Option<Result<Vec<i16>, CaptureError>> {
        if self.samples.len() >= frame_size {
            return Some(Ok(self.samples.drain(..frame_size).collect()));
        }
        self.error
            .as_ref()
            .map(|message| Err(CaptureError::Disconnected(message.clone())))
    }
}

type Shared = Arc<(Mutex<Pending>, Condvar)>;

/// Live capture from a cpal input device, downmixed to mono `i16`.
///
/// The driver callback fills a bounded buffer; `read` drains one frame at a
/// time. When the reader falls behind, the oldest samples are discarded.
pub struct DeviceSource {
    stream: cpal::Stream,
    shared: Shared,
    frame_size: usize,
    name: String,
}

impl DeviceSource {
    /// Open `device_name`, or the default input device when `None`, and start
    /// capturing.
    pub fn open(device_name: Option<&str>, frame_size: usize) -> Result<Self, CaptureError> {
        let host = cpal::default_host();

        let device = match device_name {
            Some(name) => host
                .input_devices()
                .map_err(|e| CaptureError::ConfigError(e.to_string()))?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| CaptureError::DeviceNotFound(name.to_string()))?,
            None => host
                .default_input_device()
                .ok_or(CaptureError::NoInputDevice)?,
        };
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        // Prefer mono at the nominal rate, otherwise take the device default
        let preferred = device
            .supported_input_configs()
            .map_err(|e| CaptureError::ConfigError(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate().0 <= SAMPLE_RATE
                    && c.max_sample_rate().0 >= SAMPLE_RATE
            })
            .map(|c| c.with_sample_rate(cpal::SampleRate(SAMPLE_RATE)));
        let config = match preferred {
            Some(config) => config,
            None => device
                .default_input_config()
                .map_err(|e| CaptureError::ConfigError(e.to_string()))?,
        };

        let sample_rate = config.sample_rate().0;
        let channels = config.channels() as usize;
        if sample_rate != SAMPLE_RATE {
            log::warn!(
                "Input device runs at {} Hz instead of {} Hz; frames cover a different duration",
                sample_rate,
                SAMPLE_RATE
            );
        }
        log::info!("Audio capture: {} ({} Hz, {} channels)", name, sample_rate, channels);

        let shared: Shared = Arc::new((Mutex::new(Pending::default()), Condvar::new()));
        let capacity = frame_size * BUFFERED_FRAMES;
        let stream_config: StreamConfig = config.config();

        let stream = match config.sample_format() {
            SampleFormat::I16 => {
                build_stream::<i16>(&device, &stream_config, shared.clone(), channels, capacity)
            }
            SampleFormat::I32 => {
                build_stream::<i32>(&device, &stream_config, shared.clone(), channels, capacity)
            }
            SampleFormat::U16 => {
                build_stream::<u16>(&device, &stream_config, shared.clone(), channels, capacity)
            }
            SampleFormat::F32 => {
                build_stream::<f32>(&device, &stream_config, shared.clone(), channels, capacity)
            }
            SampleFormat::F64 => {
                build_stream::<f64>(&device, &stream_config, shared.clone(), channels, capacity)
            }
            other => {
                return Err(CaptureError::ConfigError(format!(
                    "Unsupported sample format: {:?}",
                    other
                )))
            }
        }
        .map_err(|e| CaptureError::StreamError(e.to_string()))?;

        stream
            .play()
            .map_err(|e| CaptureError::PlayError(e.to_string()))?;

        Ok(Self {
            stream,
            shared,
            frame_size,
            name,
        })
    }

    /// Number of times buffered samples were dropped because the reader fell behind.
    pub fn overflows(&self) -> u64 {
        self.shared.0.lock().overflows
    }
}

impl SampleSource for DeviceSource {
    fn read(&mut self) -> Result<AudioFrame, CaptureError> {
        wait_frame(&self.shared, self.frame_size, READ_TIMEOUT).map(AudioFrame::new)
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

impl Drop for DeviceSource {
    fn drop(&mut self) {
        if let Err(e) = self.stream.pause() {
            log::debug!("Failed to pause input stream: {}", e);
        }
        log::info!(
            "Audio capture released: {} ({} overflows)",
            self.name,
            self.overflows()
        );
    }
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    shared: Shared,
    channels: usize,
    capacity: usize,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::Sample + cpal::SizedSample,
    i16: cpal::FromSample<T>,
{
    let error_shared = shared.clone();

    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let (lock, ready) = &*shared;
            lock.lock().push_interleaved(data, channels, capacity);
            ready.notify_one();
        },
        move |err| match err {
            cpal::StreamError::DeviceNotAvailable => {
                log::error!("Audio stream error: {}", err);
                let (lock, ready) = &*error_shared;
                lock.lock().fail(err.to_string());
                ready.notify_one();
            }
            // Backend hiccups such as xruns; capture carries on
            other => log::debug!("Transient audio stream error: {}", other),
        },
        None,
    )
}

/// Block until a full frame is buffered, the stream fails, or `timeout`
/// passes without a frame.
fn wait_frame(
    shared: &Shared,
    frame_size: usize,
    timeout: Duration,
) -> Result<Vec<i16>, CaptureError> {
    let (lock, ready) = &**shared;
    let mut pending = lock.lock();
    loop {
        if let Some(result) = pending.take_frame(frame_size) {
            return result;
        }
        if ready.wait_for(&mut pending, timeout).timed_out() {
            return pending.take_frame(frame_size).unwrap_or_else(|| {
                Err(CaptureError::Disconnected(format!(
                    "no samples received for {}s",
                    timeout.as_secs_f32()
                )))
            });
        }
    }
}
