//! Remote feeds: quote CSV, ticker autocomplete, list import, chart links
//!
//! Everything that talks to the network goes through `QuoteTransport`.

pub mod autocomplete;
pub mod chart;
pub mod csv;
pub mod import;
pub mod request;
pub mod transport;

pub use autocomplete::{AutocompleteClient, SearchError, SymbolSuggestion};
pub use chart::{ChartError, ChartRange, ChartRequestBuilder};
pub use csv::{decode, decode_payload, decode_with, DecodeError, Row};
pub use import::{export_url, parse_import_ids, ImportError, Importer};
pub use request::{is_feed_safe, BuildError, QuoteRequest, QuoteRequestBuilder};
pub use transport::{FetchError, HttpTransport, QuoteTransport};
