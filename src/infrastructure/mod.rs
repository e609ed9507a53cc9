//! Infrastructure - cold path only
//!
//! This module contains the ambient services:
//! - Logging and poll metrics
//! - Configuration management
//! - Autocomplete relay server

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;

pub use api::{start_server, RelayState};
pub use metrics::{PollMetrics, PollMetricsSnapshot};
