use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use loudwatch::detector::{self, Control, Detector, Presenter};
use loudwatch::events;
use loudwatch::format;
use loudwatch::models::{
    MonitorConfig, StopReason, Tick, DEFAULT_THRESHOLD, EVENTS_FILENAME, FRAME_SIZE,
    HISTORY_CAPACITY, TICK_INTERVAL,
};
use loudwatch::source::{self, DeviceSource, FileSource, SampleSource};
use loudwatch::threshold::Threshold;

#[derive(Parser)]
#[command(name = "loudwatch", about = "Live loudness monitor that logs threshold crossings")]
struct Cli {
    /// Event log file (JSON array, created if missing)
    #[arg(long, default_value = EVENTS_FILENAME)]
    events: PathBuf,

    /// Initial alert threshold (0-10000)
    #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
    threshold: f64,

    /// Number of recent intensities kept for the chart
    #[arg(long, default_value_t = HISTORY_CAPACITY)]
    history: usize,

    /// Milliseconds between ticks
    #[arg(long, default_value_t = TICK_INTERVAL.as_millis() as u64)]
    interval_ms: u64,

    /// Input device name (default input device otherwise)
    #[arg(long, conflicts_with = "input")]
    device: Option<String>,

    /// Replay a recorded audio file instead of a live device
    #[arg(long)]
    input: Option<PathBuf>,

    /// Print alerts to stdout instead of launching the UI
    #[arg(long, conflicts_with_all = ["list_events", "list_devices"])]
    headless: bool,

    /// Stop after this many ticks (headless only)
    #[arg(long, requires = "headless")]
    ticks: Option<usize>,

    /// List input devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Print the event log and exit
    #[arg(long)]
    list_events: bool,

    /// With --list-events, print JSON instead of a table
    #[arg(long, requires = "list_events")]
    json: bool,

    /// Write log output to this file (the UI otherwise runs without logging)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Cli {
    fn uses_tui(&self) -> bool {
        !(self.headless || self.list_devices || self.list_events)
    }
}

/// Where log records go for a given invocation.
#[derive(Debug, PartialEq, Eq)]
enum LogOutput {
    Stderr,
    File(PathBuf),
    /// Stderr would draw over the alternate screen.
    Off,
}

fn log_output(cli: &Cli) -> LogOutput {
    match cli.log_file {
        Some(ref path) => LogOutput::File(path.clone()),
        None if cli.uses_tui() => LogOutput::Off,
        None => LogOutput::Stderr,
    }
}

fn init_logging(cli: &Cli) -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    match log_output(cli) {
        LogOutput::Stderr => {}
        LogOutput::File(path) => {
            let file = File::create(&path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        LogOutput::Off => {
            builder.filter_level(log::LevelFilter::Off);
        }
    }
    builder.init();
    Ok(())
}

/// Console presenter: one line per alert, fixed threshold.
struct Headless {
    threshold: Threshold,
    max_ticks: Option<usize>,
    ticks: usize,
    alerts: usize,
    failed_writes: usize,
}

impl Presenter for Headless {
    fn threshold(&self) -> f64 {
        self.threshold.get()
    }

    fn render(&mut self, tick: &Tick) -> Result<()> {
        self.ticks += 1;
        if tick.alert {
            self.alerts += 1;
            println!("{}", format::format_alert(tick.intensity));
        }
        if let Some(ref message) = tick.persist_error {
            self.failed_writes += 1;
            eprintln!("Warning: failed to save event: {}", message);
        }
        Ok(())
    }

    fn wait(&mut self, budget: Duration) -> Result<Control> {
        if self.max_ticks.is_some_and(|max| self.ticks >= max) {
            return Ok(Control::Quit);
        }
        if !budget.is_zero() {
            std::thread::sleep(budget);
        }
        Ok(Control::Continue)
    }
}

fn run_headless<S: SampleSource>(
    detector: &mut Detector<S>,
    threshold: Threshold,
    max_ticks: Option<usize>,
    interval: Duration,
) -> Result<StopReason> {
    let mut presenter = Headless {
        threshold,
        max_ticks,
        ticks: 0,
        alerts: 0,
        failed_writes: 0,
    };
    let reason = detector::run(detector, &mut presenter, interval)?;
    eprintln!(
        "{}",
        format::format_summary(presenter.ticks, presenter.alerts, presenter.failed_writes, &reason)
    );
    Ok(reason)
}

fn open_source(cli: &Cli) -> Result<Box<dyn SampleSource>> {
    match cli.input {
        Some(ref path) => {
            let source = FileSource::open(path, FRAME_SIZE)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            Ok(Box::new(source))
        }
        None => {
            let source = DeviceSource::open(cli.device.as_deref(), FRAME_SIZE)
                .context("Failed to open audio input")?;
            Ok(Box::new(source))
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    if cli.list_devices {
        for name in source::list_input_devices().context("Failed to list input devices")? {
            println!("{}", name);
        }
        return Ok(());
    }

    if cli.list_events {
        let events = events::read_log(&cli.events)?;
        if cli.json {
            println!("{}", format::format_events_json(&events));
        } else {
            println!("{}", format::format_events_table(&events));
        }
        return Ok(());
    }

    if cli.history == 0 {
        anyhow::bail!("--history must be at least 1");
    }

    let config = MonitorConfig {
        events_path: cli.events.clone(),
        history_capacity: cli.history,
        interval: Duration::from_millis(cli.interval_ms),
    };
    let interval = config.interval;
    let threshold = Threshold::new(cli.threshold);

    let source = open_source(&cli)?;
    let source_name = source.describe();

    let mut detector = Detector::new(config);
    detector
        .start(source)
        .context("Failed to start detection")?;

    let reason = if cli.headless {
        run_headless(&mut detector, threshold, cli.ticks, interval)?
    } else {
        loudwatch::tui::run(&mut detector, threshold, source_name, interval)?
    };

    if let StopReason::SourceFailed(message) = reason {
        anyhow::bail!("Audio input failed: {}", message);
    }

    Ok(())
}
