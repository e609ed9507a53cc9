//! Quote synchronization and field mapping for a tracked instrument list
//!
//! Polls a CSV quote feed, maps columns back to the requested fields and
//! reconciles rows against the stored instruments.

pub mod core;
pub mod feed;
pub mod infrastructure;
pub mod store;
pub mod sync;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types
pub use infrastructure::config::{ApiConfig, Config};

use thiserror::Error;

/// Main error type for the application edge
#[derive(Error, Debug)]
pub enum StockError {
    #[error("Configuration error: {0}")]
    Config(#[from] infrastructure::config::ConfigError),

    #[error("Field layout error: {0}")]
    Field(#[from] core::FieldError),

    #[error("Store error: {0}")]
    Store(#[from] store::StoreError),

    #[error("Search error: {0}")]
    Search(#[from] feed::SearchError),

    #[error("Import error: {0}")]
    Import(#[from] feed::ImportError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] feed::FetchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, StockError>;
