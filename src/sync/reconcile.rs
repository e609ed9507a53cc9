//! Row-to-instrument reconciliation
//!
//! Rows are matched to tracked instruments by the symbol column, never by
//! position: the feed drops rows for unknown or delisted ids. Output has one
//! delta per tracked instrument, in tracked order.

use crate::core::{DisplayMode, FieldError, FieldLayout, FieldSpec, Instrument, QuoteDelta};
use crate::feed::Row;
use std::collections::HashMap;

/// A decoded row whose cell count does not match the requested layout.
/// The row is discarded; the rest of the batch is still reconciled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Row {row} has {actual} columns, expected {expected}")]
pub struct ReconcileMismatch {
    pub row: usize,
    pub expected: usize,
    pub actual: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reconciliation {
    pub deltas: Vec<QuoteDelta>,
    pub mismatches: Vec<ReconcileMismatch>,
    /// Tracked instruments that found a row
    pub matched: usize,
}

/// Column positions resolved once from the request layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciler {
    expected: usize,
    symbol: usize,
    price: usize,
    percent: usize,
    change: usize,
    last_time: Option<usize>,
}

impl Reconciler {
    /// Fails if `layout` lacks symbol, last price or either change field
    pub fn new(layout: &FieldLayout) -> Result<Self, FieldError> {
        Ok(Self {
            expected: layout.len(),
            symbol: layout.column_of(FieldSpec::Symbol)?,
            price: layout.column_of(FieldSpec::LastPrice)?,
            percent: layout.column_of(FieldSpec::PercentChange)?,
            change: layout.column_of(FieldSpec::Change)?,
            last_time: layout.position(FieldSpec::LastTime),
        })
    }

    pub fn reconcile(&self, rows: &[Row], tracked: &[Instrument], mode: DisplayMode) -> Reconciliation {
        let mut mismatches = Vec::new();
        let mut by_symbol: HashMap<&str, &Row> = HashMap::with_capacity(rows.len());

        for (index, row) in rows.iter().enumerate() {
            if row.iter().all(|cell| cell.is_empty()) {
                continue;
            }
            if row.len() != self.expected {
                mismatches.push(ReconcileMismatch {
                    row: index,
                    expected: self.expected,
                    actual: row.len(),
                });
                continue;
            }
            // First row for a symbol wins.
            by_symbol.entry(row[self.symbol].trim()).or_insert(row);
        }

        let mut matched = 0;
        let deltas = tracked
            .iter()
            .map(|instrument| match by_symbol.get(instrument.id.as_str()) {
                Some(row) => {
                    matched += 1;
                    self.delta(&instrument.id, row, mode)
                }
                None => QuoteDelta::no_data(instrument.id.as_str()),
            })
            .collect();

        Reconciliation {
            deltas,
            mismatches,
            matched,
        }
    }

    fn delta(&self, symbol: &str, row: &Row, mode: DisplayMode) -> QuoteDelta {
        let delta = QuoteDelta::from_quote(
            symbol,
            row[self.price].as_str(),
            row[self.percent].as_str(),
            row[self.change].as_str(),
            mode,
        );
        match self.last_time {
            Some(col) => delta.with_last_trade(row[col].as_str()),
            None => delta,
        }
    }
}
