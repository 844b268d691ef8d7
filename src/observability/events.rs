//! Observable events
//!
//! Every log line names exactly one of these events.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    /// CLI command begins
    BootStart,
    /// Configuration loaded and validated
    ConfigLoaded,
    /// Table catalog loaded
    CatalogLoaded,
    /// Data directory initialized
    Initialized,

    // Snapshot
    /// Snapshot read and verified
    SnapshotLoaded,
    /// Snapshot written to disk
    SnapshotSaved,
    /// Snapshot failed checksum or shape checks
    SnapshotCorrupted,

    // Writes
    /// Row inserted
    RowInserted,
    /// Row updated
    RowUpdated,
    /// Row deleted
    RowDeleted,
    /// Dependent rows deleted or nulled by a delete
    CascadeApplied,
    /// Write rejected by a constraint
    WriteRejected,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::BootStart => "COURSEBASE_STARTUP_BEGIN",
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::CatalogLoaded => "CATALOG_LOADED",
            Event::Initialized => "DATA_DIR_INITIALIZED",

            Event::SnapshotLoaded => "SNAPSHOT_LOADED",
            Event::SnapshotSaved => "SNAPSHOT_SAVED",
            Event::SnapshotCorrupted => "SNAPSHOT_CORRUPTED",

            Event::RowInserted => "ROW_INSERTED",
            Event::RowUpdated => "ROW_UPDATED",
            Event::RowDeleted => "ROW_DELETED",
            Event::CascadeApplied => "CASCADE_APPLIED",
            Event::WriteRejected => "WRITE_REJECTED",
        }
    }

    /// Returns true if this event indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::SnapshotCorrupted)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_events_have_string_representation() {
        let events = [
            Event::BootStart,
            Event::ConfigLoaded,
            Event::CatalogLoaded,
            Event::Initialized,
            Event::SnapshotLoaded,
            Event::SnapshotSaved,
            Event::SnapshotCorrupted,
            Event::RowInserted,
            Event::RowUpdated,
            Event::RowDeleted,
            Event::CascadeApplied,
            Event::WriteRejected,
        ];

        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_ascii_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_fatal_events() {
        assert!(Event::SnapshotCorrupted.is_fatal());
        assert!(!Event::WriteRejected.is_fatal());
    }
}
