// src/models/mod.rs

//! Domain models for harvesting and consolidation.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod document;
mod form;
mod records;
mod target;

// Re-export all public types
pub use config::{Config, FormConfig, HarvestConfig, PathsConfig, WorkersConfig};
pub use document::{
    CommentEntry, ConsolidatedRecord, Document, QuestionAggregate, Responses, TeacherEntry,
};
pub use form::{FormOption, FormParams, LeafUnit, Period, PeriodScope, Stage, Subject, Teacher};
pub use records::{
    CommentRow, Record, RosterRow, SubjectSurveyRow, SurveyCell, TeacherSurveyRow,
    coerce_vote_count,
};
pub use target::{SourceKind, Target};
