//! Event Store Adapter: the interaction log, loaded once per process.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::cache::Memoized;
use crate::error::{AnalyticsError, Result};
use crate::models::InteractionEvent;

/// Immutable working table: the raw events plus the derived `converted` flag.
#[derive(Debug, Clone, PartialEq)]
pub struct EventTable {
    events: Vec<InteractionEvent>,
    converted: Vec<u8>,
}

impl EventTable {
    pub fn new(events: Vec<InteractionEvent>) -> Self {
        let converted = events.iter().map(|e| u8::from(e.is_purchase())).collect();
        Self { events, converted }
    }

    /// Parse CSV with at least `customer_id, interaction_type, channel, duration`.
    pub fn from_reader<R: Read>(reader: R, origin: &str) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(reader);
        let mut events = Vec::new();

        for (index, row) in reader.deserialize::<InteractionEvent>().enumerate() {
            let event = row.map_err(|e| {
                AnalyticsError::unavailable(origin, format!("row {}: {}", index + 1, e))
            })?;
            if !event.duration.is_finite() || event.duration < 0.0 {
                return Err(AnalyticsError::unavailable(
                    origin,
                    format!("row {}: negative or non-finite duration", index + 1),
                ));
            }
            events.push(event);
        }

        if events.is_empty() {
            return Err(AnalyticsError::unavailable(origin, "no interaction rows"));
        }

        debug!(origin, rows = events.len(), "parsed interaction log");
        Ok(Self::new(events))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|e| AnalyticsError::unavailable(path.display(), e))?;
        Self::from_reader(file, &path.display().to_string())
    }

    pub fn events(&self) -> &[InteractionEvent] {
        &self.events
    }

    /// `1` where the row is a purchase, `0` otherwise, aligned with `events()`.
    pub fn converted(&self) -> &[u8] {
        &self.converted
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Memoizing loader for one interaction log file.
#[derive(Debug)]
pub struct EventStore {
    path: PathBuf,
    table: Memoized<EventTable>,
}

impl EventStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            table: Memoized::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the cached table, reading the file only on the first call.
    pub fn load(&self) -> Result<Arc<EventTable>> {
        self.table.get_or_try_init(|| {
            let table = EventTable::from_path(&self.path)?;
            info!(path = %self.path.display(), rows = table.len(), "interaction log loaded");
            Ok(table)
        })
    }
}
