use std::path::PathBuf;

use crossterm::event::{KeyCode, KeyModifiers};

use crate::models::{Event, Tick};
use crate::threshold::Threshold;

/// Threshold change for left/right.
pub const FINE_STEP: f64 = 100.0;
/// Threshold change for up/down.
pub const COARSE_STEP: f64 = 1000.0;

#[derive(Debug, Clone, PartialEq)]
pub enum View {
    Main,
    About,
}

pub struct App {
    pub threshold: Threshold,
    pub source_name: String,
    pub events_path: PathBuf,
    /// Oldest-first intensities from the latest tick
    pub history: Vec<f64>,
    pub intensity: f64,
    pub alert: bool,
    pub ticks: usize,
    pub alerts: usize,
    pub last_event: Option<Event>,
    pub last_error: Option<String>,
    pub view: View,
    pub should_quit: bool,
}

impl App {
    pub fn new(
        threshold: Threshold,
        source_name: String,
        events_path: PathBuf,
        history_capacity: usize,
    ) -> Self {
        Self {
            threshold,
            source_name,
            events_path,
            history: vec![0.0; history_capacity],
            intensity: 0.0,
            alert: false,
            ticks: 0,
            alerts: 0,
            last_event: None,
            last_error: None,
            view: View::Main,
            should_quit: false,
        }
    }

    pub fn apply(&mut self, tick: &Tick) {
        self.history.clone_from(&tick.history);
        self.intensity = tick.intensity;
        self.alert = tick.alert;
        self.ticks += 1;
        if tick.alert {
            self.alerts += 1;
        }
        if let Some(ref event) = tick.recorded {
            self.last_event = Some(event.clone());
            self.last_error = None;
        }
        if let Some(ref message) = tick.persist_error {
            self.last_error = Some(message.clone());
        }
    }

    pub fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        if code == KeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }
        match self.view {
            View::Main => match code {
                KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
                KeyCode::Char('a') => self.view = View::About,
                KeyCode::Left | KeyCode::Char('h') => {
                    self.threshold.adjust(-FINE_STEP);
                }
                KeyCode::Right | KeyCode::Char('l') => {
                    self.threshold.adjust(FINE_STEP);
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    self.threshold.adjust(-COARSE_STEP);
                }
                KeyCode::Up | KeyCode::Char('k') => {
                    self.threshold.adjust(COARSE_STEP);
                }
                _ => {}
            },
            View::About => {
                if matches!(code, KeyCode::Esc | KeyCode::Char('q')) {
                    self.view = View::Main;
                }
            }
        }
    }
}
