//! Storage for harvested extracts and the consolidated document.
//!
//! ## Layout
//!
//! ```text
//! data/
//! ├── config.toml           # Harvester configuration
//! ├── subject_survey.csv    # Extracts: append-only, one per target
//! ├── teacher_survey.csv
//! ├── teacher_roster.csv
//! ├── comments.csv
//! └── consolidated.json     # Document: rewritten atomically per run
//! ```

pub mod csv_sink;
pub mod local;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Record;

pub use csv_sink::CsvSink;
pub use local::{LocalStorage, Sources};

/// Append-only destination for harvested rows.
///
/// Implementations must be safe to call from concurrent workers: one call's
/// rows are never interleaved with another's.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Append `records`. An empty slice is a no-op.
    async fn append(&self, records: &[Record]) -> Result<()>;
}
