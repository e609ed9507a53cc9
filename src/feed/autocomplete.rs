//! Ticker search via the autocomplete feed
//!
//! Upstream answers JSONP: `callback({"ResultSet":{"Result":[...]}})`.
//! The wrapper is stripped before parsing; bare JSON is accepted as is.

use crate::core::Instrument;
use crate::feed::{FetchError, QuoteTransport};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Callback name the upstream feed wraps its answer in
pub const DEFAULT_CALLBACK: &str = "YAHOO.Finance.SymbolSuggest.ssCallback";

/// One search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolSuggestion {
    pub symbol: String,
    pub name: String,
    #[serde(rename = "exchDisp", default, skip_serializing_if = "Option::is_none")]
    pub exch_disp: Option<String>,
}

impl SymbolSuggestion {
    /// `Apple Inc. (AAPL) in NASDAQ`
    pub fn label(&self) -> String {
        match self.exch_disp.as_deref().filter(|e| !e.is_empty()) {
            Some(exchange) => format!("{} ({}) in {}", self.name, self.symbol, exchange),
            None => format!("{} ({})", self.name, self.symbol),
        }
    }

    pub fn into_instrument(self) -> Instrument {
        Instrument::new(self.symbol, self.name)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "ResultSet")]
    result_set: ResultSet,
}

#[derive(Debug, Deserialize)]
struct ResultSet {
    #[serde(rename = "Result", default)]
    result: Vec<SymbolSuggestion>,
}

/// Remove a `callback(` … `)` wrapper, if present
pub fn strip_callback<'a>(body: &'a str, callback: &str) -> &'a str {
    let body = body.trim();
    let Some(inner) = body
        .strip_prefix(callback)
        .map(str::trim_start)
        .and_then(|rest| rest.strip_prefix('('))
    else {
        return body;
    };
    let inner = inner.trim_end().trim_end_matches(';').trim_end();
    inner.strip_suffix(')').unwrap_or(inner).trim()
}

/// Parse an upstream answer into suggestions
pub fn parse_suggestions(body: &str, callback: &str) -> Result<Vec<SymbolSuggestion>, SearchError> {
    let json = strip_callback(body, callback);
    let response: SearchResponse =
        serde_json::from_str(json).map_err(|e| SearchError::Parse(e.to_string()))?;
    Ok(response.result_set.result)
}

/// Search client for the autocomplete feed
pub struct AutocompleteClient<T> {
    transport: Arc<T>,
    base_url: String,
    callback: String,
}

impl<T: QuoteTransport> AutocompleteClient<T> {
    pub fn new(transport: Arc<T>, base_url: impl Into<String>, callback: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            callback: callback.into(),
        }
    }

    /// Upstream URL for a search term
    pub fn search_url(&self, term: &str) -> Result<url::Url, SearchError> {
        url::Url::parse_with_params(
            &self.base_url,
            &[("callback", self.callback.as_str()), ("query", term)],
        )
        .map_err(|e| SearchError::Url(e.to_string()))
    }

    /// Resolve free text to candidate instruments
    pub async fn search(&self, term: &str) -> Result<Vec<SymbolSuggestion>, SearchError> {
        let url = self.search_url(term)?;
        let body = self.transport.fetch(url.as_str()).await?;
        let suggestions = parse_suggestions(&body, &self.callback)?;
        crate::log_feed!(tracing::Level::DEBUG, "Search '{}' returned {} results", term, suggestions.len());
        Ok(suggestions)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SearchError {
    #[error("Invalid search URL: {0}")]
    Url(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Parse error: {0}")]
    Parse(String),
}
