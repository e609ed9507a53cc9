//! Presentation-ready quote values
//!
//! A `QuoteDelta` is recomputed every poll tick from one decoded row. It keeps
//! both change figures so the display mode can be flipped without a fetch.

use serde::{Deserialize, Serialize};
use time::macros::{format_description, offset};
use time::{Date, OffsetDateTime, Time, UtcOffset};

/// Shown in place of price and changes when the feed has no row
pub const PLACEHOLDER: &str = "—";

/// Offset the feed reports trade times in (exchange time, GMT-4)
pub const FEED_UTC_OFFSET: UtcOffset = offset!(-4);

/// Price movement classification, taken from the primary change cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Neutral,
}

impl Direction {
    /// `+` is up, `-` is down, anything else (including empty) is neutral
    #[inline]
    pub fn classify(change: &str) -> Self {
        match change.as_bytes().first() {
            Some(b'+') => Direction::Up,
            Some(b'-') => Direction::Down,
            _ => Direction::Neutral,
        }
    }
}

/// Which change figure is primary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Percent,
    Absolute,
}

impl DisplayMode {
    #[inline]
    pub fn toggled(self) -> Self {
        match self {
            DisplayMode::Percent => DisplayMode::Absolute,
            DisplayMode::Absolute => DisplayMode::Percent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteDelta {
    /// Id of the instrument this delta belongs to
    pub symbol: String,
    pub price: String,
    pub primary_change: String,
    pub alternate_change: String,
    pub direction: Direction,
    /// Raw last trade time cell, when requested and present
    pub last_trade: Option<String>,
}

impl QuoteDelta {
    /// Delta for a row whose percent and absolute change are known
    pub fn from_quote(
        symbol: impl Into<String>,
        price: impl Into<String>,
        percent_change: impl Into<String>,
        change: impl Into<String>,
        mode: DisplayMode,
    ) -> Self {
        let (primary, alternate) = match mode {
            DisplayMode::Percent => (percent_change.into(), change.into()),
            DisplayMode::Absolute => (change.into(), percent_change.into()),
        };
        Self {
            symbol: symbol.into(),
            price: price.into(),
            direction: Direction::classify(&primary),
            primary_change: primary,
            alternate_change: alternate,
            last_trade: None,
        }
    }

    /// Delta for an instrument the feed returned nothing for
    pub fn no_data(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            price: PLACEHOLDER.to_string(),
            primary_change: PLACEHOLDER.to_string(),
            alternate_change: PLACEHOLDER.to_string(),
            direction: Direction::Neutral,
            last_trade: None,
        }
    }

    pub fn with_last_trade(mut self, last_trade: impl Into<String>) -> Self {
        self.last_trade = Some(last_trade.into());
        self
    }

    /// Swap primary and alternate change, reclassifying direction
    pub fn toggle(&mut self) {
        std::mem::swap(&mut self.primary_change, &mut self.alternate_change);
        self.direction = Direction::classify(&self.primary_change);
    }

    pub fn has_data(&self) -> bool {
        self.price != PLACEHOLDER
    }

    /// Wall-clock last trade time as printed by the feed (`10:30am`)
    pub fn last_trade_time(&self) -> Option<Time> {
        self.last_trade.as_deref().and_then(parse_feed_time)
    }

    /// Last trade as an instant, given the trading day it belongs to
    pub fn last_trade_at(&self, date: Date) -> Option<OffsetDateTime> {
        self.last_trade.as_deref().and_then(|cell| feed_time_on(cell, date))
    }
}

/// Parse a feed time cell such as `4:00pm`. `N/A` and garbage yield `None`.
///
/// The cell carries neither date nor zone, so the result is a bare wall-clock
/// time; see [`feed_time_on`] for an instant.
pub fn parse_feed_time(cell: &str) -> Option<Time> {
    let format = format_description!("[hour repr:12 padding:none]:[minute][period case:lower]");
    Time::parse(&cell.trim().to_ascii_lowercase(), format).ok()
}

/// Feed time cell on `date`, at [`FEED_UTC_OFFSET`]
pub fn feed_time_on(cell: &str, date: Date) -> Option<OffsetDateTime> {
    parse_feed_time(cell).map(|t| date.with_time(t).assume_offset(FEED_UTC_OFFSET))
}
