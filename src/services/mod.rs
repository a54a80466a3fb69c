//! Service layer for talking to the survey form.
//!
//! - Page fetching over HTTP (`HttpFetcher`, behind the `PageFetcher` trait)
//! - HTML heuristics that turn a page body into options or rows (`parse`)

mod fetcher;
pub mod parse;

pub use fetcher::{HttpFetcher, PageFetcher, shape_rows};
