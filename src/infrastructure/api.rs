//! Autocomplete relay server (Cold Path)
//!
//! Same-origin endpoint for ticker search: forwards `?q=` upstream, strips
//! the JSONP wrapper and answers bare JSON with permissive CORS. Also exposes
//! poll metrics and redirects `/chart` to the chart image service.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::Level;

use crate::feed::{
    AutocompleteClient, ChartRange, ChartRequestBuilder, FetchError, QuoteTransport, SearchError,
};
use crate::infrastructure::metrics::{PollMetrics, PollMetricsSnapshot};
use crate::{log_api, StockError};

/// Shared relay state
pub struct RelayState<T> {
    pub search: Arc<AutocompleteClient<T>>,
    pub metrics: Arc<PollMetrics>,
    pub chart: Arc<ChartRequestBuilder>,
    /// Range used when `/chart` is asked without one
    pub chart_range: ChartRange,
}

impl<T> Clone for RelayState<T> {
    fn clone(&self) -> Self {
        Self {
            search: self.search.clone(),
            metrics: self.metrics.clone(),
            chart: self.chart.clone(),
            chart_range: self.chart_range,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartParams {
    s: Option<String>,
    range: Option<String>,
}

pub fn router<T: QuoteTransport>(state: RelayState<T>) -> Router {
    Router::new()
        .route("/", get(search::<T>))
        .route("/api/status", get(status::<T>))
        .route("/chart", get(chart::<T>))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the relay server
pub async fn start_server<T: QuoteTransport>(
    state: RelayState<T>,
    port: u16,
) -> Result<(), StockError> {
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    log_api!(Level::INFO, "Autocomplete relay listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Handler for `/?q=term`
async fn search<T: QuoteTransport>(
    State(state): State<RelayState<T>>,
    Query(params): Query<SearchParams>,
) -> Response {
    let Some(term) = params.q.filter(|q| !q.trim().is_empty()) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    match state.search.search(&term).await {
        Ok(suggestions) => {
            log_api!(Level::DEBUG, "'{}' -> {} suggestions", term, suggestions.len());
            Json(suggestions).into_response()
        }
        Err(SearchError::Fetch(FetchError::Status(code))) => {
            log_api!(Level::WARN, "Upstream answered {} for '{}'", code, term);
            StatusCode::from_u16(code)
                .unwrap_or(StatusCode::BAD_GATEWAY)
                .into_response()
        }
        Err(e) => {
            log_api!(Level::WARN, "Search for '{}' failed: {}", term, e);
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}

/// Handler for `/chart?s=ID&range=1y`
async fn chart<T: QuoteTransport>(
    State(state): State<RelayState<T>>,
    Query(params): Query<ChartParams>,
) -> Response {
    let Some(id) = params.s.filter(|s| !s.trim().is_empty()) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let range = match params.range.as_deref() {
        Some(range) => match range.parse::<ChartRange>() {
            Ok(range) => range,
            Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        },
        None => state.chart_range,
    };

    match state.chart.build(id.trim(), range) {
        Ok(url) => Redirect::temporary(&url).into_response(),
        Err(e) => {
            log_api!(Level::WARN, "Chart request refused: {}", e);
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
    }
}

/// Handler for `/api/status`
async fn status<T: QuoteTransport>(State(state): State<RelayState<T>>) -> Json<PollMetricsSnapshot> {
    Json(state.metrics.snapshot())
}
