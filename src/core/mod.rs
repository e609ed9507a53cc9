//! Core types shared by the feed, store and poller
//!
//! - Instrument: tracked ticker plus display name
//! - FieldSpec / FieldLayout: requested quote attributes and their columns
//! - QuoteDelta: display values computed for one instrument

pub mod field;
pub mod instrument;
pub mod quote;

pub use field::{column_of, to_modifiers, FieldError, FieldLayout, FieldSpec};
pub use instrument::Instrument;
pub use quote::{
    feed_time_on, parse_feed_time, Direction, DisplayMode, QuoteDelta, FEED_UTC_OFFSET, PLACEHOLDER,
};
