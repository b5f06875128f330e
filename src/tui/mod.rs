pub mod app;
pub mod ui;

use std::io;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use crate::detector::{self, Control, Detector, Presenter};
use crate::models::{StopReason, Tick};
use crate::source::SampleSource;
use crate::threshold::Threshold;

use app::App;

/// Presenter that draws each tick in the terminal and turns key presses into
/// threshold changes.
struct TuiPresenter {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    app: App,
}

impl Presenter for TuiPresenter {
    fn threshold(&self) -> f64 {
        self.app.threshold.get()
    }

    fn render(&mut self, tick: &Tick) -> Result<()> {
        self.app.apply(tick);
        let app = &self.app;
        self.terminal.draw(|frame| ui::render(frame, app))?;
        Ok(())
    }

    fn wait(&mut self, budget: Duration) -> Result<Control> {
        let deadline = Instant::now() + budget;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if !event::poll(remaining)? {
                break;
            }
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                self.app.handle_key(key.code, key.modifiers);
                if self.app.should_quit {
                    return Ok(Control::Quit);
                }
                // Redraw so threshold changes show before the next tick
                let app = &self.app;
                self.terminal.draw(|frame| ui::render(frame, app))?;
            }
        }
        Ok(Control::Continue)
    }
}

/// Run the detection loop behind the terminal UI until the user quits or the
/// source stops.
pub fn run<S: SampleSource>(
    detector: &mut Detector<S>,
    threshold: Threshold,
    source_name: String,
    interval: Duration,
) -> Result<StopReason> {
    let (events_path, history_capacity) = match detector.store() {
        Some(store) => (store.path().to_path_buf(), detector.history_capacity()),
        None => anyhow::bail!("Detection loop must be started before the UI"),
    };

    let app = App::new(threshold, source_name, events_path, history_capacity);

    // Setup terminal
    enable_raw_mode()?;
    io::stdout().execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(io::stdout());
    let terminal = match Terminal::new(backend) {
        Ok(terminal) => terminal,
        Err(e) => {
            restore_terminal();
            return Err(e.into());
        }
    };

    let mut presenter = TuiPresenter { terminal, app };
    let result = detector::run(detector, &mut presenter, interval);

    restore_terminal();

    result
}

fn restore_terminal() {
    if let Err(e) = disable_raw_mode() {
        log::warn!("Failed to disable raw mode: {}", e);
    }
    if let Err(e) = io::stdout().execute(LeaveAlternateScreen) {
        log::warn!("Failed to leave alternate screen: {}", e);
    }
}
