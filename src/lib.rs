pub mod detector;
pub mod error;
pub mod events;
pub mod format;
pub mod history;
pub mod meter;
pub mod models;
pub mod source;
pub mod threshold;
pub mod tui;
