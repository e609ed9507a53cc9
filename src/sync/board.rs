//! Tick results and the consumer-side quote board

use crate::core::{DisplayMode, QuoteDelta};
use crate::sync::ReconcileMismatch;

/// Deltas produced by one successful tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteBatch {
    /// Monotonic tick number within one scheduler
    pub sequence: u64,
    pub mode: DisplayMode,
    /// One per tracked instrument, in tracked order
    pub deltas: Vec<QuoteDelta>,
    /// Rows discarded for a wrong column count
    pub mismatches: Vec<ReconcileMismatch>,
    pub matched: usize,
}

impl QuoteBatch {
    pub fn empty(sequence: u64, mode: DisplayMode) -> Self {
        Self {
            sequence,
            mode,
            deltas: Vec::new(),
            mismatches: Vec::new(),
            matched: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }
}

/// Last delivered deltas plus the display mode the consumer chose.
/// Toggling re-labels retained values; it never needs a fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuoteBoard {
    mode: DisplayMode,
    deltas: Vec<QuoteDelta>,
}

impl QuoteBoard {
    pub fn new(mode: DisplayMode) -> Self {
        Self {
            mode,
            deltas: Vec::new(),
        }
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    pub fn deltas(&self) -> &[QuoteDelta] {
        &self.deltas
    }

    /// Replace the retained deltas with `batch`, shown in the board's mode
    pub fn apply(&mut self, batch: QuoteBatch) {
        let mut deltas = batch.deltas;
        if batch.mode != self.mode {
            deltas.iter_mut().for_each(QuoteDelta::toggle);
        }
        self.deltas = deltas;
    }

    /// Swap percent and absolute change for every instrument
    pub fn toggle_mode(&mut self) {
        self.mode = self.mode.toggled();
        self.deltas.iter_mut().for_each(QuoteDelta::toggle);
    }
}
