//! Quote request construction
//!
//! `GET {base}?s=ID1+ID2&f={modifiers}`. Ids are assumed feed-safe and are
//! not escaped here.

use crate::core::FieldLayout;

/// Separator the feed expects between instrument ids
pub const ID_SEPARATOR: &str = "+";

/// Whether `id` can be placed in the `s=` parameter verbatim.
///
/// Rejects anything that would end the parameter (`&`, `#`), split the id
/// list (`+`), or need escaping (`%`, `?`, whitespace, controls). `=` and `^`
/// are fine: `EURUSD=X` and `^GSPC` are real ids.
pub fn is_feed_safe(id: &str) -> bool {
    !id.is_empty()
        && !id
            .chars()
            .any(|c| matches!(c, '&' | '#' | '+' | '%' | '?') || c.is_whitespace() || c.is_control())
}

/// A built quote request, carrying the layout its rows will follow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRequest {
    pub url: String,
    pub layout: FieldLayout,
    pub symbol_count: usize,
}

#[derive(Debug, Clone)]
pub struct QuoteRequestBuilder {
    base_url: String,
}

impl QuoteRequestBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the request for `ids` with the columns of `layout`
    pub fn build<S: AsRef<str>>(
        &self,
        ids: &[S],
        layout: &FieldLayout,
    ) -> Result<QuoteRequest, BuildError> {
        if ids.is_empty() {
            return Err(BuildError::NoInstruments);
        }

        let joined = ids
            .iter()
            .map(|id| id.as_ref())
            .collect::<Vec<_>>()
            .join(ID_SEPARATOR);

        Ok(QuoteRequest {
            url: format!("{}?s={}&f={}", self.base_url, joined, layout.modifiers()),
            layout: layout.clone(),
            symbol_count: ids.len(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("Quote request needs at least one instrument")]
    NoInstruments,
}
