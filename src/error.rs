// src/error.rs

//! Unified error handling for harvesting and consolidation.

use std::fmt;

use thiserror::Error;

/// Result type alias for harvester operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// CSV reading or writing failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization failed
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Transport failure, timeout or non-success status on a fetch
    #[error("Network error for {context}: {message}")]
    Network { context: String, message: String },

    /// Expected structural anchor (select, heading, table) absent on a page
    #[error("No '{anchor}' found for {context}")]
    MissingAnchor { context: String, anchor: String },

    /// Discovery stage produced nothing usable
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Roster extract missing or empty at consolidation time
    #[error("Roster extract is required: {0}")]
    MissingRoster(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a network error with context.
    pub fn network(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Network {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a missing-anchor error.
    pub fn missing_anchor(context: impl Into<String>, anchor: impl Into<String>) -> Self {
        Self::MissingAnchor {
            context: context.into(),
            anchor: anchor.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a discovery error.
    pub fn discovery(message: impl Into<String>) -> Self {
        Self::Discovery(message.into())
    }

    /// Whether the page simply had no data for the requested unit.
    pub fn is_missing_anchor(&self) -> bool {
        matches!(self, Self::MissingAnchor { .. })
    }
}
