// src/lib.rs

//! Survey harvester library
//!
//! Two stages: a cascading concurrent harvester that writes tabular extracts,
//! and a consolidation engine that joins those extracts into one document
//! keyed by period and subject.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
