//! Embedded course platform store
//!
//! Rows live in memory and are persisted as a checksummed JSON snapshot.
//! All constraints declared in the schema are enforced on every write.

mod checksum;
mod database;
mod errors;
mod snapshot;

pub use database::{Database, DeleteSummary, NulledField, Row, RowRef};
pub use errors::{StoreError, StoreResult};
pub use snapshot::{read_snapshot, write_snapshot, SnapshotBody, FORMAT_VERSION};
