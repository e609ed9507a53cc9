//! Tracked instrument
//!
//! Identity is the ticker id. The serialized shape (`{"id","name"}`) is the
//! one persisted by the instrument store and produced by ticker search.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instrument {
    /// Exchange ticker symbol, e.g. `AAPL` or `^GSPC`
    pub id: String,
    /// Human readable name shown next to the quote
    #[serde(rename = "name")]
    pub display_name: String,
}

impl Instrument {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// Ids of the given instruments, in order
pub fn ids(instruments: &[Instrument]) -> Vec<&str> {
    instruments.iter().map(|i| i.id.as_str()).collect()
}
