//! Shareable instrument lists
//!
//! Export: `{base}?stocks=ID1,ID2`. Import: read the ids back, ask the quote
//! feed for `[name, symbol]` and append what resolved to the store.

use crate::core::{FieldLayout, FieldSpec, Instrument};
use crate::feed::csv::{self, DecodeError, DEFAULT_DELIMITER};
use crate::feed::request::is_feed_safe;
use crate::feed::{BuildError, FetchError, QuoteRequestBuilder, QuoteTransport};
use crate::store::{InstrumentStore, StoreError};
use std::sync::Arc;
use url::Url;

/// Query parameter carrying the comma separated ids
pub const STOCKS_PARAM: &str = "stocks";

/// Link that imports `instruments` when opened
pub fn export_url(base: &Url, instruments: &[Instrument]) -> Url {
    let ids = instruments
        .iter()
        .map(|i| i.id.as_str())
        .collect::<Vec<_>>()
        .join(",");
    let mut url = base.clone();
    url.set_query(None);
    url.query_pairs_mut().append_pair(STOCKS_PARAM, &ids);
    url
}

/// Ids from an import link, or from its bare query string (`?stocks=...`).
/// Empty entries and ids that are not feed-safe are dropped; a link without
/// the parameter yields nothing.
pub fn parse_import_ids(link: &str) -> Vec<String> {
    let query = match Url::parse(link) {
        Ok(url) => url.query().unwrap_or_default().to_string(),
        Err(_) => link.trim_start_matches('?').to_string(),
    };

    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == STOCKS_PARAM)
        .map(|(_, value)| {
            value
                .split(',')
                .map(str::trim)
                .filter(|id| {
                    let safe = is_feed_safe(id);
                    if !safe && !id.is_empty() {
                        crate::log_feed!(tracing::Level::WARN, "Dropping unsafe import id {:?}", id);
                    }
                    safe
                })
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Resolves ids to named instruments through the quote feed
pub struct Importer<T> {
    transport: Arc<T>,
    builder: QuoteRequestBuilder,
}

impl<T: QuoteTransport> Importer<T> {
    pub fn new(transport: Arc<T>, builder: QuoteRequestBuilder) -> Self {
        Self { transport, builder }
    }

    /// Instruments for `ids`, in feed order. Rows without a name are skipped.
    pub async fn resolve(&self, ids: &[String]) -> Result<Vec<Instrument>, ImportError> {
        if let Some(id) = ids.iter().find(|id| !is_feed_safe(id)) {
            return Err(ImportError::UnsafeId(id.clone()));
        }
        let layout = FieldLayout::names();
        let request = self.builder.build(ids, &layout)?;
        let body = self.transport.fetch(&request.url).await?;
        let rows = csv::decode_payload(&body, DEFAULT_DELIMITER)?;

        let name_col = layout.position(FieldSpec::Name).unwrap_or(0);
        let symbol_col = layout.position(FieldSpec::Symbol).unwrap_or(1);

        let instruments = rows
            .into_iter()
            .filter(|row| row.len() == layout.len())
            .filter(|row| !row[name_col].is_empty() && !row[symbol_col].is_empty())
            .map(|row| Instrument::new(row[symbol_col].clone(), row[name_col].clone()))
            .collect();
        Ok(instruments)
    }

    /// Resolve `ids` and append the new ones to `store`. Returns how many
    /// instruments were added.
    pub async fn import_into<S: InstrumentStore + ?Sized>(
        &self,
        store: &S,
        ids: &[String],
    ) -> Result<usize, ImportError> {
        if ids.is_empty() {
            return Err(ImportError::Empty);
        }

        let resolved = self.resolve(ids).await?;
        let mut list = store.load()?;
        let before = list.len();
        for instrument in resolved {
            if !list.iter().any(|i| i.id == instrument.id) {
                list.push(instrument);
            }
        }
        let added = list.len() - before;
        if added > 0 {
            store.save(&list)?;
        }

        crate::log_feed!(tracing::Level::INFO, "Imported {} of {} instruments", added, ids.len());
        Ok(added)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Import link contains no instruments")]
    Empty,

    #[error("Instrument id {0:?} cannot be sent to the quote feed")]
    UnsafeId(String),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::test_utils::{apple, ScriptedTransport};

    const BASE: &str = "http://download.finance.yahoo.com/d/quotes.csv";

    fn importer(transport: Arc<ScriptedTransport>) -> Importer<ScriptedTransport> {
        Importer::new(transport, QuoteRequestBuilder::new(BASE))
    }

    #[test]
    fn test_export_then_parse() {
        let base = Url::parse("https://stocks.example.com/import.html?old=1").unwrap();
        let list = vec![apple(), Instrument::new("^GSPC", "S&P 500")];
        let link = export_url(&base, &list);

        assert_eq!(
            link.as_str(),
            "https://stocks.example.com/import.html?stocks=AAPL%2C%5EGSPC"
        );
        assert_eq!(parse_import_ids(link.as_str()), vec!["AAPL", "^GSPC"]);
    }

    #[test]
    fn test_parse_bare_query() {
        assert_eq!(parse_import_ids("?stocks=AAPL,,MSFT,"), vec!["AAPL", "MSFT"]);
        assert_eq!(parse_import_ids("stocks=%5EDJI"), vec!["^DJI"]);
    }

    #[test]
    fn test_parse_without_parameter() {
        assert!(parse_import_ids("https://example.com/import.html?other=AAPL").is_empty());
        assert!(parse_import_ids("https://example.com/import.html").is_empty());
        assert!(parse_import_ids("?stocks=").is_empty());
    }

    #[test]
    fn test_parse_drops_ids_that_would_rewrite_the_query() {
        let link = "https://stocks.example.com/import.html?stocks=AAPL%26f%3Dl1,MSFT,A%2BB,%23x,EURUSD%3DX";
        assert_eq!(parse_import_ids(link), vec!["MSFT", "EURUSD=X"]);
    }

    #[tokio::test]
    async fn test_resolve_rejects_unsafe_id_without_fetching() {
        let transport = Arc::new(ScriptedTransport::new());
        let ids = vec!["MSFT".to_string(), "AAPL&f=l1".to_string()];
        let result = importer(transport.clone()).resolve(&ids).await;

        assert!(matches!(result, Err(ImportError::UnsafeId(ref id)) if id == "AAPL&f=l1"));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_resolve_skips_unnamed_rows() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond("\"Apple Inc.\",\"AAPL\"\r\n\"\",\"ZZZZ\"\r\n\"Microsoft\",\"MSFT\"\r\n"),
        );
        let ids = vec!["AAPL".to_string(), "ZZZZ".to_string(), "MSFT".to_string()];
        let resolved = importer(transport.clone()).resolve(&ids).await.unwrap();

        assert_eq!(resolved, vec![apple(), Instrument::new("MSFT", "Microsoft")]);
        assert_eq!(transport.urls(), vec![format!("{BASE}?s=AAPL+ZZZZ+MSFT&f=ns")]);
    }

    #[tokio::test]
    async fn test_import_into_appends_new_ids_only() {
        let transport = Arc::new(
            ScriptedTransport::new().respond("\"Apple Inc.\",\"AAPL\"\r\n\"Microsoft\",\"MSFT\"\r\n"),
        );
        let store = MemoryStore::new(vec![apple()]);
        let ids = vec!["AAPL".to_string(), "MSFT".to_string()];

        let added = importer(transport).import_into(&store, &ids).await.unwrap();
        assert_eq!(added, 1);
        assert_eq!(
            store.load().unwrap(),
            vec![apple(), Instrument::new("MSFT", "Microsoft")]
        );
    }

    #[tokio::test]
    async fn test_import_empty_list_never_fetches() {
        let transport = Arc::new(ScriptedTransport::new());
        let store = MemoryStore::default();
        let result = importer(transport.clone()).import_into(&store, &[]).await;
        assert!(matches!(result, Err(ImportError::Empty)));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_import_fetch_failure_leaves_store_untouched() {
        let transport = Arc::new(ScriptedTransport::new().fail(FetchError::Status(500)));
        let store = MemoryStore::new(vec![apple()]);
        let result = importer(transport).import_into(&store, &["MSFT".to_string()]).await;
        assert!(matches!(result, Err(ImportError::Fetch(FetchError::Status(500)))));
        assert_eq!(store.load().unwrap(), vec![apple()]);
    }
}
