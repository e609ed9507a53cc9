//! Stock display daemon
//!
//! # Architecture
//! - **core**: Field specs, layouts, instruments and quote deltas
//! - **feed**: CSV decoding, quote requests, autocomplete, import
//! - **store**: Persisted instrument list and display preferences
//! - **sync**: Reconciler, quote board and poll scheduler
//! - **infrastructure**: Cold path (logging, metrics, config, relay api)

use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use stock_display::core::QuoteDelta;
use stock_display::feed::{
    parse_import_ids, AutocompleteClient, ChartRequestBuilder, HttpTransport, Importer,
    QuoteRequestBuilder,
};
use stock_display::infrastructure::logging::init_logging;
use stock_display::infrastructure::{start_server, PollMetrics, RelayState};
use stock_display::store::{JsonFileStore, PreferencesFile};
use stock_display::sync::{PollEvent, PollScheduler, QuoteBoard};
use stock_display::{log_main, Config};
use tokio::sync::mpsc;
use tracing::Level;

/// Main application state
pub struct StockApp {
    config: Config,
}

impl StockApp {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run until Ctrl-C or until the tracked list empties
    pub async fn run(&self) -> anyhow::Result<()> {
        log_main!(Level::INFO, "Starting stock display...");

        let layout = self
            .config
            .poll_layout()
            .context("invalid [poll] fields")?;
        let transport = Arc::new(HttpTransport::with_timeout(self.config.request_timeout()));
        let store = Arc::new(JsonFileStore::new(self.config.store.path.clone()));
        let metrics = Arc::new(PollMetrics::new());

        let preferences = PreferencesFile::new(self.config.store.preferences_path.clone())
            .load()
            .context("failed to read preferences")?;
        log_main!(
            Level::INFO,
            "Portfolio: {} (chart range {})",
            preferences.title_or(&self.config.store.default_title),
            preferences.chart_range
        );
        let chart = Arc::new(ChartRequestBuilder::new(self.config.feed.chart_url.clone()));

        // 1. One-shot import (Cold Path - startup only)
        if let Some(link) = &self.config.store.import_url {
            let ids = parse_import_ids(link);
            let importer = Importer::new(
                transport.clone(),
                QuoteRequestBuilder::new(self.config.feed.quote_url.clone()),
            );
            match importer.import_into(store.as_ref(), &ids).await {
                Ok(added) => log_main!(Level::INFO, "Import added {} instruments", added),
                Err(e) => log_main!(Level::WARN, "Import from {} failed: {}", link, e),
            }
        }

        // 2. Autocomplete relay
        if self.config.api.enabled {
            let state = RelayState {
                search: Arc::new(AutocompleteClient::new(
                    transport.clone(),
                    self.config.feed.autocomplete_url.clone(),
                    self.config.feed.callback.clone(),
                )),
                metrics: metrics.clone(),
                chart,
                chart_range: preferences.chart_range,
            };
            let port = self.config.api.port;
            tokio::spawn(async move {
                if let Err(e) = start_server(state, port).await {
                    log_main!(Level::ERROR, "Relay server failed: {}", e);
                }
            });
        }

        // 3. Poll session
        let mode = self.config.poll.display_mode;
        let scheduler = PollScheduler::new(
            transport,
            store,
            QuoteRequestBuilder::new(self.config.feed.quote_url.clone()),
            layout,
        )
        .context("layout cannot be reconciled")?
        .with_interval(self.config.poll_interval())
        .with_mode(mode)
        .with_metrics(metrics);

        let (events_tx, mut events_rx) = mpsc::channel(16);
        let handle = Arc::new(scheduler).start(events_tx);
        let mut board = QuoteBoard::new(mode);
        let show_time = self.config.has_quote_time();

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    log_main!(Level::INFO, "Ctrl-C received, stopping");
                    break;
                }
                event = events_rx.recv() => match event {
                    Some(PollEvent::Quotes(batch)) => {
                        board.apply(batch);
                        for delta in board.deltas() {
                            log_main!(Level::INFO, "{}", render(delta, show_time));
                        }
                    }
                    Some(PollEvent::TickFailed(e)) => {
                        log_main!(Level::WARN, "Tick failed: {}", e);
                    }
                    Some(PollEvent::Idle) => {
                        log_main!(Level::INFO, "No instruments tracked, polling suspended");
                    }
                    None => break,
                },
            }
        }

        handle.stop().await;
        Ok(())
    }
}

fn render(delta: &QuoteDelta, show_time: bool) -> String {
    let mut line = format!(
        "{:<8} {:>10} {:>8} ({:?})",
        delta.symbol, delta.price, delta.primary_change, delta.direction
    );
    if show_time {
        if let Some(time) = delta.last_trade_time() {
            line.push_str(&format!(" @ {}", time));
        }
    }
    line
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _guards = init_logging(Path::new("logs")).context("failed to initialize logging")?;

    let config = Config::load().context("failed to load config")?;

    let app = StockApp::new(config);
    app.run().await
}
