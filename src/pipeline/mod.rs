//! Pipeline entry points.
//!
//! - `run_harvest`: walk the form cascade for one target and append its extract
//! - `list_periods`: list the periods the form offers
//! - `run_consolidate`: join the extracts into the consolidated document

pub mod aggregate;
pub mod consolidate;
pub mod harvest;

pub use consolidate::{Consolidation, ConsolidationSummary, consolidate, run_consolidate};
pub use harvest::{
    HarvestOptions, HarvestReport, Harvester, SkippedUnit, list_periods, run_harvest,
};
