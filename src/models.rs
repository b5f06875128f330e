use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Samples per capture frame.
pub const FRAME_SIZE: usize = 1024;
/// Nominal capture rate in Hz.
pub const SAMPLE_RATE: u32 = 44100;
/// Number of intensities kept for the trend display.
pub const HISTORY_CAPACITY: usize = 100;
/// Upper bound of the threshold range, in the same units as intensity.
pub const MAX_INTENSITY: f64 = 10000.0;
pub const DEFAULT_THRESHOLD: f64 = 3000.0;
pub const TICK_INTERVAL: Duration = Duration::from_millis(50);
pub const EVENTS_FILENAME: &str = "eventos.json";

/// One capture window of mono 16-bit samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    samples: Vec<i16>,
}

impl AudioFrame {
    pub fn new(samples: Vec<i16>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }
}

/// A recorded threshold crossing, as stored in the event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Local wall-clock time, `DD/MM/YYYY HH:MM:SS`.
    #[serde(rename = "data")]
    pub date: String,
    #[serde(rename = "intensidade")]
    pub intensity: i64,
}

/// Settings shared by the detection loop and its hosts.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub events_path: PathBuf,
    pub history_capacity: usize,
    pub interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            events_path: PathBuf::from(EVENTS_FILENAME),
            history_capacity: HISTORY_CAPACITY,
            interval: TICK_INTERVAL,
        }
    }
}

/// Output of one detection tick, handed to the presenter.
#[derive(Debug, Clone)]
pub struct Tick {
    pub intensity: f64,
    /// Oldest-first copy of the rolling history after this tick.
    pub history: Vec<f64>,
    pub alert: bool,
    /// Event written during this tick, if any.
    pub recorded: Option<Event>,
    /// Set when the tick was an alert but the event could not be persisted.
    pub persist_error: Option<String>,
}

/// Why the detection loop left the running state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Termination requested by the host.
    Requested,
    /// A replayed recording ran out of frames.
    SourceExhausted,
    /// The sample source failed while running.
    SourceFailed(String),
}

impl StopReason {
    pub fn is_fatal(&self) -> bool {
        matches!(self, StopReason::SourceFailed(_))
    }
}
