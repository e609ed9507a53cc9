//! Field-to-column mapping for the quote feed
//!
//! A quote request names the attributes it wants as a string of modifier
//! codes. The feed answers with one CSV column per code, in the same order.
//! `FieldLayout` owns that order, so the modifier string and the column of
//! every field always come from the same list.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Semantic quote attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSpec {
    Name,
    Symbol,
    LastPrice,
    LastTime,
    PercentChange,
    Change,
}

impl FieldSpec {
    pub const ALL: [FieldSpec; 6] = [
        FieldSpec::Name,
        FieldSpec::Symbol,
        FieldSpec::LastPrice,
        FieldSpec::LastTime,
        FieldSpec::PercentChange,
        FieldSpec::Change,
    ];

    /// Wire modifier code understood by the quote feed
    #[inline]
    pub const fn modifier(self) -> &'static str {
        match self {
            FieldSpec::Name => "n",
            FieldSpec::Symbol => "s",
            FieldSpec::LastPrice => "l1",
            FieldSpec::LastTime => "t1",
            FieldSpec::PercentChange => "p2",
            FieldSpec::Change => "c1",
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            FieldSpec::Name => "name",
            FieldSpec::Symbol => "symbol",
            FieldSpec::LastPrice => "last_price",
            FieldSpec::LastTime => "last_time",
            FieldSpec::PercentChange => "percent_change",
            FieldSpec::Change => "change",
        }
    }
}

impl fmt::Display for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldSpec {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldSpec::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| FieldError::Unknown(s.to_string()))
    }
}

/// Concatenated modifier codes of `fields`, in the given order
pub fn to_modifiers(fields: &[FieldSpec]) -> String {
    fields.iter().map(|f| f.modifier()).collect()
}

/// Column of `target` in rows returned for a request built from `fields`
pub fn column_of(fields: &[FieldSpec], target: FieldSpec) -> Result<usize, FieldError> {
    fields
        .iter()
        .position(|f| *f == target)
        .ok_or(FieldError::NotRequested(target))
}

/// Ordered field request, fixing the column layout of decoded rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLayout {
    fields: Vec<FieldSpec>,
}

impl FieldLayout {
    /// Build a layout from an ordered, duplicate-free field list
    pub fn new(fields: Vec<FieldSpec>) -> Result<Self, FieldError> {
        if fields.is_empty() {
            return Err(FieldError::Empty);
        }
        for (i, field) in fields.iter().enumerate() {
            if fields[..i].contains(field) {
                return Err(FieldError::Duplicate(*field));
            }
        }
        Ok(Self { fields })
    }

    /// Build a layout from field names such as `"last_price"`
    pub fn from_names<I, S>(names: I) -> Result<Self, FieldError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let fields = names
            .into_iter()
            .map(|name| name.as_ref().trim().parse())
            .collect::<Result<Vec<FieldSpec>, _>>()?;
        Self::new(fields)
    }

    /// Layout used by the poller: time, name, price, both changes, symbol
    pub fn quotes() -> Self {
        Self {
            fields: vec![
                FieldSpec::LastTime,
                FieldSpec::Name,
                FieldSpec::LastPrice,
                FieldSpec::PercentChange,
                FieldSpec::Change,
                FieldSpec::Symbol,
            ],
        }
    }

    /// Layout used to resolve display names when importing
    pub fn names() -> Self {
        Self {
            fields: vec![FieldSpec::Name, FieldSpec::Symbol],
        }
    }

    /// Concatenated modifier codes, in request order
    pub fn modifiers(&self) -> String {
        to_modifiers(&self.fields)
    }

    /// Column index of `target` in rows decoded for this layout
    pub fn column_of(&self, target: FieldSpec) -> Result<usize, FieldError> {
        column_of(&self.fields, target)
    }

    #[inline]
    pub fn position(&self, target: FieldSpec) -> Option<usize> {
        column_of(&self.fields, target).ok()
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Expected cell count of a well-formed row
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Field mapping errors. All of them are caller bugs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("Unknown field: {0}")]
    Unknown(String),

    #[error("Field {0} is not part of the requested layout")]
    NotRequested(FieldSpec),

    #[error("Field {0} requested twice")]
    Duplicate(FieldSpec),

    #[error("No fields requested")]
    Empty,
}
