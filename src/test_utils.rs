//! Test utilities: scripted transport and instrument fixtures

use crate::core::Instrument;
use crate::feed::{FetchError, QuoteTransport};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Transport answering from a queue of canned responses
///
/// Once the queue is drained, the fallback response is repeated. With a gate
/// installed every fetch parks until the gate is notified.
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<String, FetchError>>>,
    fallback: Result<String, FetchError>,
    urls: Mutex<Vec<String>>,
    gate: Option<Arc<Notify>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            fallback: Ok(String::new()),
            urls: Mutex::new(Vec::new()),
            gate: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn respond(self, body: impl Into<String>) -> Self {
        self.responses.lock().push_back(Ok(body.into()));
        self
    }

    pub fn fail(self, error: FetchError) -> Self {
        self.responses.lock().push_back(Err(error));
        self
    }

    pub fn otherwise(mut self, fallback: Result<String, FetchError>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> usize {
        self.urls.lock().len()
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl QuoteTransport for ScriptedTransport {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.urls.lock().push(url.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let next = self.responses.lock().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

pub fn apple() -> Instrument {
    Instrument::new("AAPL", "Apple Inc.")
}

pub fn microsoft() -> Instrument {
    Instrument::new("MSFT", "Microsoft Corporation")
}

/// Feed row in the poller layout: time, name, price, pct, change, symbol
pub fn quote_line(time: &str, name: &str, price: &str, pct: &str, chg: &str, symbol: &str) -> String {
    format!("\"{time}\",\"{name}\",{price},\"{pct}\",{chg},\"{symbol}\"\r\n")
}
