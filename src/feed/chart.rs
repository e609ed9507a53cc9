//! Chart image requests
//!
//! Intraday ranges use `{base}{code}?s={id}&{nonce}`, longer ones
//! `{base}c/{code}/{id}?{nonce}`. The nonce keeps caches from serving a stale
//! image.

use crate::feed::request::is_feed_safe;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

pub const DEFAULT_CHART_URL: &str = "http://ichart.finance.yahoo.com/";

/// Time span shown by a chart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartRange {
    #[default]
    Today,
    LastWeek,
    ThreeMonths,
    SixMonths,
    LastYear,
    TwoYears,
    FiveYears,
    Max,
}

impl ChartRange {
    pub const ALL: [ChartRange; 8] = [
        ChartRange::Today,
        ChartRange::LastWeek,
        ChartRange::ThreeMonths,
        ChartRange::SixMonths,
        ChartRange::LastYear,
        ChartRange::TwoYears,
        ChartRange::FiveYears,
        ChartRange::Max,
    ];

    /// Range code understood by the chart service
    #[inline]
    pub const fn code(self) -> &'static str {
        match self {
            ChartRange::Today => "b",
            ChartRange::LastWeek => "w",
            ChartRange::ThreeMonths => "3m",
            ChartRange::SixMonths => "6m",
            ChartRange::LastYear => "1y",
            ChartRange::TwoYears => "2y",
            ChartRange::FiveYears => "5y",
            ChartRange::Max => "my",
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ChartRange::Today => "today",
            ChartRange::LastWeek => "last_week",
            ChartRange::ThreeMonths => "three_months",
            ChartRange::SixMonths => "six_months",
            ChartRange::LastYear => "last_year",
            ChartRange::TwoYears => "two_years",
            ChartRange::FiveYears => "five_years",
            ChartRange::Max => "max",
        }
    }

    /// Today and last week are served by the intraday endpoint
    #[inline]
    pub const fn is_intraday(self) -> bool {
        matches!(self, ChartRange::Today | ChartRange::LastWeek)
    }
}

impl fmt::Display for ChartRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts either the name (`last_year`) or the service code (`1y`)
impl FromStr for ChartRange {
    type Err = ChartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        ChartRange::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == s || r.code() == s)
            .ok_or_else(|| ChartError::UnknownRange(s.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct ChartRequestBuilder {
    base_url: String,
}

impl ChartRequestBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self { base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Chart URL for `id` with a fresh nonce
    pub fn build(&self, id: &str, range: ChartRange) -> Result<String, ChartError> {
        self.build_with_nonce(id, range, nonce())
    }

    pub fn build_with_nonce(
        &self,
        id: &str,
        range: ChartRange,
        nonce: u32,
    ) -> Result<String, ChartError> {
        if !is_feed_safe(id) {
            return Err(ChartError::UnsafeId(id.to_string()));
        }

        let url = if range.is_intraday() {
            format!("{}{}?s={}&{}", self.base_url, range.code(), id, nonce)
        } else {
            format!("{}c/{}/{}?{}", self.base_url, range.code(), id, nonce)
        };
        Ok(url)
    }
}

impl Default for ChartRequestBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_CHART_URL)
    }
}

fn nonce() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() % 1_000_000)
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChartError {
    #[error("Unknown chart range: {0}")]
    UnknownRange(String),

    #[error("Instrument id {0:?} cannot be sent to the chart service")]
    UnsafeId(String),
}
