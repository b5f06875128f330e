use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use tempfile::NamedTempFile;

use crate::error::EventStoreError;
use crate::models::Event;

/// Timestamp layout used in the event log.
pub const DATE_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Append-only event log kept as a single pretty-printed JSON array.
///
/// Every append rewrites the whole document through a temporary file in the
/// same directory, renamed over the target once fully written. Cost grows with
/// the number of stored events.
#[derive(Debug, Clone)]
pub struct EventStore {
    path: PathBuf,
}

impl EventStore {
    /// Open the log at `path`, creating it as `[]` when missing or zero-length.
    ///
    /// Existing content is validated and never rewritten; a file that does
    /// not parse as an event list, including one holding only whitespace, is
    /// an error rather than an empty log.
    pub fn initialize(path: impl Into<PathBuf>) -> Result<Self, EventStoreError> {
        let store = Self { path: path.into() };

        let existing = match std::fs::read_to_string(&store.path) {
            Ok(data) => Some(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(source) => {
                return Err(EventStoreError::Read {
                    path: store.path.clone(),
                    source,
                })
            }
        };

        match existing {
            Some(data) if !data.is_empty() => {
                let events = store.parse(&data)?;
                log::info!(
                    "Opened event log {} ({} events)",
                    store.path.display(),
                    events.len()
                );
            }
            _ => {
                store.write_all(&[])?;
                log::info!("Created empty event log {}", store.path.display());
            }
        }

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every stored event in insertion order.
    pub fn load(&self) -> Result<Vec<Event>, EventStoreError> {
        let data = std::fs::read_to_string(&self.path).map_err(|source| EventStoreError::Read {
            path: self.path.clone(),
            source,
        })?;
        self.parse(&data)
    }

    /// Record a crossing at the current local time.
    pub fn append(&self, intensity: f64) -> Result<Event, EventStoreError> {
        self.append_at(intensity, Local::now().naive_local())
    }

    /// Record a crossing with an explicit timestamp. The intensity is
    /// truncated toward zero.
    pub fn append_at(&self, intensity: f64, at: NaiveDateTime) -> Result<Event, EventStoreError> {
        let mut events = self.load()?;
        let event = Event {
            date: at.format(DATE_FORMAT).to_string(),
            intensity: intensity.trunc() as i64,
        };
        events.push(event.clone());
        self.write_all(&events)?;
        log::debug!("Recorded event {} ({} total)", event.intensity, events.len());
        Ok(event)
    }

    fn parse(&self, data: &str) -> Result<Vec<Event>, EventStoreError> {
        serde_json::from_str(data).map_err(|source| EventStoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn write_all(&self, events: &[Event]) -> Result<(), EventStoreError> {
        let write_err = |source| EventStoreError::Write {
            path: self.path.clone(),
            source,
        };

        let json = serde_json::to_string_pretty(events)
            .map_err(|e| write_err(std::io::Error::new(std::io::ErrorKind::Other, e)))?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(json.as_bytes()).map_err(write_err)?;
        // The replacement keeps the mode of the file it replaces
        if let Ok(metadata) = std::fs::metadata(&self.path) {
            tmp.as_file()
                .set_permissions(metadata.permissions())
                .map_err(write_err)?;
        }
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;
        Ok(())
    }
}

/// Read the log at `path` without creating it. A missing file reads as empty.
pub fn read_log(path: &Path) -> Result<Vec<Event>, EventStoreError> {
    let store = EventStore {
        path: path.to_path_buf(),
    };
    match std::fs::read_to_string(path) {
        Ok(data) if data.is_empty() => Ok(Vec::new()),
        Ok(data) => store.parse(&data),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(source) => Err(EventStoreError::Read {
            path: store.path,
            source,
        }),
    }
}
