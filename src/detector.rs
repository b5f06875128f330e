//! Detection loop: per-tick capture, measurement, history and event recording

use std::time::{Duration, Instant};

use anyhow::Result;

use crate::error::{CaptureError, DetectorError};
use crate::events::EventStore;
use crate::history::RollingHistory;
use crate::meter;
use crate::models::{MonitorConfig, StopReason, Tick};
use crate::source::SampleSource;

/// Lifecycle of the detection loop. `Stopped` is terminal.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopState {
    Idle,
    Running,
    Stopped(StopReason),
}

/// Owns the sample source, the rolling history and the event store while running.
pub struct Detector<S: SampleSource> {
    config: MonitorConfig,
    state: LoopState,
    source: Option<S>,
    history: Option<RollingHistory>,
    store: Option<EventStore>,
}

impl<S: SampleSource> Detector<S> {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            state: LoopState::Idle,
            source: None,
            history: None,
            store: None,
        }
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    pub fn history_capacity(&self) -> usize {
        self.config.history_capacity
    }

    pub fn store(&self) -> Option<&EventStore> {
        self.store.as_ref()
    }

    /// Open the event log and take ownership of `source`.
    ///
    /// On error the detector stays idle and `source` is dropped.
    pub fn start(&mut self, source: S) -> Result<(), DetectorError> {
        if self.state != LoopState::Idle {
            return Err(DetectorError::AlreadyStarted);
        }
        let history = RollingHistory::new(self.config.history_capacity)
            .ok_or(DetectorError::EmptyHistory)?;
        let store = EventStore::initialize(&self.config.events_path)?;

        log::info!(
            "Detection started on {} (history {}, log {})",
            source.describe(),
            history.capacity(),
            store.path().display()
        );

        self.source = Some(source);
        self.history = Some(history);
        self.store = Some(store);
        self.state = LoopState::Running;
        Ok(())
    }

    /// Run one capture → measure → compare → record cycle.
    ///
    /// Only an intensity strictly above `threshold` raises an alert. A failed
    /// event write is reported on the returned tick and does not stop the loop.
    /// A source failure stops the loop and releases the source.
    pub fn tick(&mut self, threshold: f64) -> Result<Tick, DetectorError> {
        if self.state != LoopState::Running {
            return Err(DetectorError::NotRunning);
        }
        let read = match self.source.as_mut() {
            Some(source) => source.read(),
            None => return Err(DetectorError::NotRunning),
        };

        let frame = match read {
            Ok(frame) => frame,
            Err(e) => {
                let reason = match &e {
                    CaptureError::EndOfStream => StopReason::SourceExhausted,
                    other => StopReason::SourceFailed(other.to_string()),
                };
                self.finish(reason);
                return Err(e.into());
            }
        };

        let (Some(history), Some(store)) = (self.history.as_mut(), self.store.as_ref()) else {
            return Err(DetectorError::NotRunning);
        };

        let intensity = meter::measure(frame.samples());
        history.push(intensity);

        let alert = intensity > threshold;
        let mut recorded = None;
        let mut persist_error = None;
        if alert {
            match store.append(intensity) {
                Ok(event) => recorded = Some(event),
                Err(e) => {
                    log::error!("Failed to record event: {}", e);
                    persist_error = Some(e.to_string());
                }
            }
        }

        Ok(Tick {
            intensity,
            history: history.snapshot(),
            alert,
            recorded,
            persist_error,
        })
    }

    /// Stop on request. Has no effect once stopped.
    pub fn stop(&mut self) {
        if !matches!(self.state, LoopState::Stopped(_)) {
            self.finish(StopReason::Requested);
        }
    }

    fn finish(&mut self, reason: StopReason) {
        match &reason {
            StopReason::SourceFailed(message) => log::error!("Detection stopped: {}", message),
            other => log::info!("Detection stopped: {:?}", other),
        }
        self.source = None;
        self.state = LoopState::Stopped(reason);
    }
}

/// What the presenter wants after handling a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

/// Consumer of tick output and owner of the live threshold.
pub trait Presenter {
    /// Threshold to compare the next tick against.
    fn threshold(&self) -> f64;

    fn render(&mut self, tick: &Tick) -> Result<()>;

    /// Wait up to `budget` before the next tick, handling any input.
    fn wait(&mut self, budget: Duration) -> Result<Control>;
}

/// Drive ticks at `interval` until the presenter quits or the source ends.
///
/// Ticks never overlap; an overrunning tick delays the next one. The source is
/// released before returning on every path.
pub fn run<S, P>(detector: &mut Detector<S>, presenter: &mut P, interval: Duration) -> Result<StopReason>
where
    S: SampleSource,
    P: Presenter,
{
    loop {
        let started = Instant::now();
        let threshold = presenter.threshold();

        let tick = match detector.tick(threshold) {
            Ok(tick) => tick,
            Err(DetectorError::Capture(_)) => break,
            Err(e) => {
                detector.stop();
                return Err(e.into());
            }
        };

        if let Err(e) = presenter.render(&tick) {
            detector.stop();
            return Err(e);
        }

        match presenter.wait(interval.saturating_sub(started.elapsed())) {
            Ok(Control::Continue) => {}
            Ok(Control::Quit) => {
                detector.stop();
                break;
            }
            Err(e) => {
                detector.stop();
                return Err(e);
            }
        }
    }

    match detector.state() {
        LoopState::Stopped(reason) => Ok(reason.clone()),
        _ => Ok(StopReason::Requested),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AudioFrame;
    use std::collections::VecDeque;
    use std::path::Path;

    /// Produces frames whose every sample equals the scripted intensity.
    struct Scripted {
        levels: VecDeque<i16>,
        fail_at_end: bool,
    }

    impl Scripted {
        fn new(levels: &[i16]) -> Self {
            Self {
                levels: levels.iter().copied().collect(),
                fail_at_end: false,
            }
        }
    }

    impl SampleSource for Scripted {
        fn read(&mut self) -> Result<AudioFrame, CaptureError> {
            match self.levels.pop_front() {
                Some(level) => Ok(AudioFrame::new(vec![level; 4])),
                None if self.fail_at_end => Err(CaptureError::Disconnected("unplugged".into())),
                None => Err(CaptureError::EndOfStream),
            }
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    struct Recorder {
        threshold: f64,
        ticks: Vec<Tick>,
        quit_after: Option<usize>,
    }

    impl Presenter for Recorder {
        fn threshold(&self) -> f64 {
            self.threshold
        }

        fn render(&mut self, tick: &Tick) -> Result<()> {
            self.ticks.push(tick.clone());
            Ok(())
        }

        fn wait(&mut self, _budget: Duration) -> Result<Control> {
            match self.quit_after {
                Some(n) if self.ticks.len() >= n => Ok(Control::Quit),
                _ => Ok(Control::Continue),
            }
        }
    }

    fn config(dir: &Path, history: usize) -> MonitorConfig {
        MonitorConfig {
            events_path: dir.join("eventos.json"),
            history_capacity: history,
            interval: Duration::ZERO,
        }
    }

    #[test]
    fn test_starts_idle_and_rejects_ticks() {
        let dir = tempfile::tempdir().unwrap();
        let mut detector: Detector<Scripted> = Detector::new(config(dir.path(), 3));
        assert_eq!(detector.state(), &LoopState::Idle);
        assert!(matches!(detector.tick(0.0), Err(DetectorError::NotRunning)));
    }

    #[test]
    fn test_equal_to_threshold_is_normal() {
        let dir = tempfile::tempdir().unwrap();
        let mut detector = Detector::new(config(dir.path(), 3));
        detector.start(Scripted::new(&[5000, 5000])).unwrap();

        let tick = detector.tick(5000.0).unwrap();
        assert!(!tick.alert);
        assert!(tick.recorded.is_none());

        let tick = detector.tick(4999.999).unwrap();
        assert!(tick.alert);
        assert_eq!(tick.recorded.unwrap().intensity, 5000);

        let events = detector.store().unwrap().load().unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_scenario_three_ticks_one_event() {
        let dir = tempfile::tempdir().unwrap();
        let mut detector = Detector::new(config(dir.path(), 3));
        detector.start(Scripted::new(&[1000, 2000, 6000])).unwrap();

        let flags: Vec<bool> = (0..3).map(|_| detector.tick(5000.0).unwrap().alert).collect();
        assert_eq!(flags, vec![false, false, true]);

        let events = detector.store().unwrap().load().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].intensity, 6000);
    }

    #[test]
    fn test_quiet_ticks_leave_log_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eventos.json");
        let existing = "[\n  {\n    \"data\": \"01/01/2024 10:00:00\",\n    \"intensidade\": 7000\n  }\n]";
        std::fs::write(&path, existing).unwrap();

        let mut detector = Detector::new(config(dir.path(), 100));
        detector.start(Scripted::new(&[500; 10])).unwrap();
        for _ in 0..10 {
            assert!(!detector.tick(5000.0).unwrap().alert);
        }

        assert_eq!(std::fs::read_to_string(&path).unwrap(), existing);
    }

    #[test]
    fn test_corrupt_log_keeps_detector_idle() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("eventos.json"), "garbage").unwrap();
        let mut detector = Detector::new(config(dir.path(), 3));
        let err = detector.start(Scripted::new(&[1])).unwrap_err();
        assert!(matches!(err, DetectorError::EventStore(_)));
        assert_eq!(detector.state(), &LoopState::Idle);
    }

    #[test]
    fn test_zero_history_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut detector = Detector::new(config(dir.path(), 0));
        assert!(matches!(
            detector.start(Scripted::new(&[1])),
            Err(DetectorError::EmptyHistory)
        ));
    }

    #[test]
    fn test_persist_failure_still_alerts() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        std::fs::create_dir(&logs).unwrap();
        let mut detector = Detector::new(config(&logs, 3));
        detector.start(Scripted::new(&[9000, 9000])).unwrap();
        std::fs::remove_dir_all(&logs).unwrap();

        let tick = detector.tick(100.0).unwrap();
        assert!(tick.alert);
        assert!(tick.recorded.is_none());
        assert!(tick.persist_error.is_some());
        assert_eq!(detector.state(), &LoopState::Running);
    }

    #[test]
    fn test_source_failure_stops_loop() {
        let dir = tempfile::tempdir().unwrap();
        let mut detector = Detector::new(config(dir.path(), 3));
        let mut source = Scripted::new(&[10]);
        source.fail_at_end = true;
        detector.start(source).unwrap();

        detector.tick(0.0).unwrap();
        assert!(detector.tick(0.0).is_err());
        assert!(matches!(
            detector.state(),
            LoopState::Stopped(StopReason::SourceFailed(_))
        ));
        assert!(matches!(detector.tick(0.0), Err(DetectorError::NotRunning)));
    }

    #[test]
    fn test_stop_is_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let mut detector = Detector::new(config(dir.path(), 3));
        detector.start(Scripted::new(&[10, 10])).unwrap();
        detector.stop();
        assert_eq!(detector.state(), &LoopState::Stopped(StopReason::Requested));
        assert!(detector.tick(0.0).is_err());
        assert!(matches!(
            detector.start(Scripted::new(&[10])),
            Err(DetectorError::AlreadyStarted)
        ));
    }

    #[test]
    fn test_run_until_source_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        let mut detector = Detector::new(config(dir.path(), 3));
        detector.start(Scripted::new(&[1000, 2000, 6000])).unwrap();
        let mut presenter = Recorder {
            threshold: 5000.0,
            ticks: Vec::new(),
            quit_after: None,
        };

        let reason = run(&mut detector, &mut presenter, Duration::ZERO).unwrap();

        assert_eq!(reason, StopReason::SourceExhausted);
        assert!(!reason.is_fatal());
        assert_eq!(presenter.ticks.len(), 3);
        assert_eq!(presenter.ticks[2].history, vec![1000.0, 2000.0, 6000.0]);
        assert!(presenter.ticks[2].alert);
    }

    #[test]
    fn test_run_stops_on_request() {
        let dir = tempfile::tempdir().unwrap();
        let mut detector = Detector::new(config(dir.path(), 3));
        detector.start(Scripted::new(&[1; 10])).unwrap();
        let mut presenter = Recorder {
            threshold: 5000.0,
            ticks: Vec::new(),
            quit_after: Some(4),
        };

        let reason = run(&mut detector, &mut presenter, Duration::ZERO).unwrap();

        assert_eq!(reason, StopReason::Requested);
        assert_eq!(presenter.ticks.len(), 4);
    }
}
