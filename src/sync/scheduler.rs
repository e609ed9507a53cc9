//! Poll scheduler
//!
//! Owns one polling session: fetch immediately, then every `interval`.
//! The tick body is a plain async fn; the timer loop runs it inline, so two
//! fetches never overlap. A failed tick is reported and polling continues.
//!
//! States: `Idle` (nothing tracked, no timer) -> `Polling` -> `Idle` when the
//! tracked list empties, or `Stopped` (terminal) when the consumer stops it.

use crate::core::{instrument, DisplayMode, FieldError, FieldLayout, Instrument};
use crate::feed::csv::{self, DecodeError, DEFAULT_DELIMITER};
use crate::feed::{BuildError, FetchError, QuoteRequestBuilder, QuoteTransport};
use crate::infrastructure::metrics::PollMetrics;
use crate::store::{InstrumentStore, StoreError};
use crate::sync::{QuoteBatch, Reconciler};
use crate::log_poll;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::Level;

/// Refresh cadence of the quote feed
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(45);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Polling,
    Stopped,
}

/// Delivered to the consumer once per tick
#[derive(Debug)]
pub enum PollEvent {
    Quotes(QuoteBatch),
    /// Transient failure; the next tick runs regardless
    TickFailed(TickError),
    /// Tracked list is empty, polling suspended
    Idle,
}

#[derive(Debug, thiserror::Error)]
pub enum TickError {
    #[error("Previous tick still in flight")]
    InFlight,

    #[error("Scheduler stopped")]
    Stopped,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Clears the busy flag when a tick ends, however it ends
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct PollScheduler<T, S> {
    transport: Arc<T>,
    store: Arc<S>,
    builder: QuoteRequestBuilder,
    layout: FieldLayout,
    reconciler: Reconciler,
    interval: Duration,
    mode: DisplayMode,
    metrics: Arc<PollMetrics>,
    in_flight: AtomicBool,
    stopped: Arc<AtomicBool>,
    sequence: AtomicU64,
}

impl<T: QuoteTransport, S: InstrumentStore> PollScheduler<T, S> {
    /// Fails if `layout` cannot be reconciled (no symbol, price or changes)
    pub fn new(
        transport: Arc<T>,
        store: Arc<S>,
        builder: QuoteRequestBuilder,
        layout: FieldLayout,
    ) -> Result<Self, FieldError> {
        let reconciler = Reconciler::new(&layout)?;
        Ok(Self {
            transport,
            store,
            builder,
            layout,
            reconciler,
            interval: DEFAULT_INTERVAL,
            mode: DisplayMode::default(),
            metrics: Arc::new(PollMetrics::new()),
            in_flight: AtomicBool::new(false),
            stopped: Arc::new(AtomicBool::new(false)),
            sequence: AtomicU64::new(0),
        })
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_mode(mut self, mode: DisplayMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<PollMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> Arc<PollMetrics> {
        self.metrics.clone()
    }

    pub fn layout(&self) -> &FieldLayout {
        &self.layout
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// One fetch + decode + reconcile cycle for `tracked`.
    ///
    /// Refused with `TickError::InFlight` while another tick runs. An empty
    /// `tracked` yields an empty batch without fetching.
    pub async fn tick(&self, tracked: &[Instrument]) -> Result<QuoteBatch, TickError> {
        if self.is_stopped() {
            return Err(TickError::Stopped);
        }
        let Some(_guard) = InFlight::acquire(&self.in_flight) else {
            self.metrics.record_skipped();
            return Err(TickError::InFlight);
        };

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        if tracked.is_empty() {
            return Ok(QuoteBatch::empty(sequence, self.mode));
        }

        self.metrics.record_started();
        let result = self.fetch_and_reconcile(tracked, sequence).await;
        match &result {
            Ok(batch) => self.metrics.record_success(batch.mismatches.len()),
            Err(_) => self.metrics.record_failure(),
        }
        result
    }

    async fn fetch_and_reconcile(
        &self,
        tracked: &[Instrument],
        sequence: u64,
    ) -> Result<QuoteBatch, TickError> {
        let ids = instrument::ids(tracked);
        let request = self.builder.build(&ids, &self.layout)?;
        let raw = self.transport.fetch(&request.url).await?;
        let rows = csv::decode_payload(&raw, DEFAULT_DELIMITER)?;

        let reconciliation = self.reconciler.reconcile(&rows, tracked, self.mode);
        for mismatch in &reconciliation.mismatches {
            log_poll!(Level::WARN, "Discarding row: {}", mismatch);
        }
        log_poll!(
            Level::DEBUG,
            "Tick {}: {} rows, {}/{} instruments matched",
            sequence,
            rows.len(),
            reconciliation.matched,
            tracked.len()
        );

        Ok(QuoteBatch {
            sequence,
            mode: self.mode,
            deltas: reconciliation.deltas,
            mismatches: reconciliation.mismatches,
            matched: reconciliation.matched,
        })
    }

    /// Spawn the polling loop. Events go to `events`; dropping the receiver
    /// or the returned handle ends the session.
    pub fn start(self: Arc<Self>, events: mpsc::Sender<PollEvent>) -> PollHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(SchedulerState::Idle);
        let stopped = self.stopped.clone();
        let task = tokio::spawn(self.run(events, stop_rx, state_tx));
        PollHandle {
            stop: stop_tx,
            state: state_rx,
            stopped,
            task,
        }
    }

    async fn run(
        self: Arc<Self>,
        events: mpsc::Sender<PollEvent>,
        mut stop: watch::Receiver<bool>,
        state: watch::Sender<SchedulerState>,
    ) {
        if self.is_stopped() {
            state.send_replace(SchedulerState::Stopped);
            return;
        }

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = stop.changed() => break,
                _ = ticker.tick() => {}
            }

            // Store edits are picked up at tick boundaries only.
            let tracked = match self.store.load() {
                Ok(tracked) => tracked,
                Err(e) => {
                    log_poll!(Level::WARN, "Failed to load instruments: {}", e);
                    self.metrics.record_failure();
                    if !self.deliver(&events, &mut stop, PollEvent::TickFailed(e.into())).await {
                        break;
                    }
                    continue;
                }
            };

            if tracked.is_empty() {
                log_poll!(Level::INFO, "No instruments tracked, polling suspended");
                if !self.deliver(&events, &mut stop, PollEvent::Idle).await {
                    break;
                }
                state.send_replace(SchedulerState::Idle);
                return;
            }

            state.send_if_modified(|current| {
                let changed = *current != SchedulerState::Polling;
                *current = SchedulerState::Polling;
                changed
            });

            let outcome = tokio::select! {
                biased;
                _ = stop.changed() => break,
                outcome = self.tick(&tracked) => outcome,
            };

            let event = match outcome {
                Ok(batch) => PollEvent::Quotes(batch),
                Err(TickError::Stopped) => break,
                Err(e) => {
                    log_poll!(Level::WARN, "Tick failed: {}", e);
                    PollEvent::TickFailed(e)
                }
            };
            if !self.deliver(&events, &mut stop, event).await {
                break;
            }
        }

        self.stopped.store(true, Ordering::Release);
        state.send_replace(SchedulerState::Stopped);
        log_poll!(Level::INFO, "Polling stopped");
    }

    /// Send `event` unless the session was stopped meanwhile
    async fn deliver(
        &self,
        events: &mpsc::Sender<PollEvent>,
        stop: &mut watch::Receiver<bool>,
        event: PollEvent,
    ) -> bool {
        if self.is_stopped() {
            return false;
        }
        tokio::select! {
            biased;
            _ = stop.changed() => false,
            sent = events.send(event) => sent.is_ok(),
        }
    }
}

/// Control handle of a running poll session
pub struct PollHandle {
    stop: watch::Sender<bool>,
    state: watch::Receiver<SchedulerState>,
    stopped: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop polling. No event is delivered after this returns.
    pub async fn stop(self) {
        self.stopped.store(true, Ordering::Release);
        let _ = self.stop.send(true);
        let _ = self.task.await;
    }

    /// Wait for the session to end on its own (tracked list emptied)
    pub async fn finished(self) {
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Direction, PLACEHOLDER};
    use crate::store::MemoryStore;
    use crate::test_utils::{apple, microsoft, quote_line, ScriptedTransport};
    use tokio::sync::Notify;

    const BASE: &str = "http://download.finance.yahoo.com/d/quotes.csv";

    fn apple_csv() -> String {
        quote_line("10:30am", "Apple Inc.", "101.50", "+1.2%", "+1.20", "AAPL")
    }

    fn scheduler(
        transport: Arc<ScriptedTransport>,
        store: Arc<MemoryStore>,
    ) -> Arc<PollScheduler<ScriptedTransport, MemoryStore>> {
        Arc::new(
            PollScheduler::new(transport, store, QuoteRequestBuilder::new(BASE), FieldLayout::quotes())
                .unwrap()
                .with_interval(Duration::from_secs(45)),
        )
    }

    #[tokio::test]
    async fn test_tick_reconciles_feed_rows() {
        let transport = Arc::new(ScriptedTransport::new().respond(apple_csv()));
        let store = Arc::new(MemoryStore::default());
        let zzzz = Instrument::new("ZZZZ", "Gone");

        let batch = scheduler(transport.clone(), store)
            .tick(&[apple(), zzzz])
            .await
            .unwrap();

        assert_eq!(batch.deltas.len(), 2);
        assert_eq!(batch.deltas[0].price, "101.50");
        assert_eq!(batch.deltas[0].direction, Direction::Up);
        assert_eq!(batch.deltas[1].price, PLACEHOLDER);
        assert_eq!(transport.urls(), vec![format!("{BASE}?s=AAPL+ZZZZ&f=t1nl1p2c1s")]);
    }

    #[tokio::test]
    async fn test_tick_without_instruments_never_fetches() {
        let transport = Arc::new(ScriptedTransport::new());
        let sched = scheduler(transport.clone(), Arc::new(MemoryStore::default()));

        let batch = sched.tick(&[]).await.unwrap();
        assert!(batch.is_empty());
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_tick_rejects_binary_payload() {
        let transport = Arc::new(ScriptedTransport::new().respond("\0\0\0"));
        let sched = scheduler(transport, Arc::new(MemoryStore::default()));
        let result = sched.tick(&[apple()]).await;
        assert!(matches!(result, Err(TickError::Decode(_))));
        assert_eq!(sched.metrics().snapshot().ticks_failed, 1);
    }

    #[tokio::test]
    async fn test_overlapping_tick_is_refused() {
        let gate = Arc::new(Notify::new());
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond(apple_csv())
                .gated(gate.clone()),
        );
        let sched = scheduler(transport.clone(), Arc::new(MemoryStore::default()));

        let first = tokio::spawn({
            let sched = sched.clone();
            async move { sched.tick(&[apple()]).await }
        });
        while transport.calls() == 0 {
            tokio::task::yield_now().await;
        }

        let second = sched.tick(&[apple()]).await;
        assert!(matches!(second, Err(TickError::InFlight)));

        gate.notify_one();
        let first = first.await.unwrap().unwrap();
        assert_eq!(first.deltas[0].price, "101.50");
        assert_eq!(transport.calls(), 1);
        assert_eq!(sched.metrics().snapshot().ticks_skipped, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_immediately_then_on_interval() {
        let transport = Arc::new(ScriptedTransport::new().otherwise(Ok(apple_csv())));
        let store = Arc::new(MemoryStore::new(vec![apple()]));
        let (tx, mut rx) = mpsc::channel(8);
        let started = tokio::time::Instant::now();

        let handle = scheduler(transport.clone(), store).start(tx);

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, PollEvent::Quotes(ref b) if b.sequence == 1));
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(handle.state(), SchedulerState::Polling);

        let second = rx.recv().await.unwrap();
        assert!(matches!(second, PollEvent::Quotes(ref b) if b.sequence == 2));
        assert_eq!(started.elapsed(), Duration::from_secs(45));
        assert_eq!(transport.calls(), 2);

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_tick_does_not_stop_polling() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .fail(FetchError::Status(503))
                .otherwise(Ok(apple_csv())),
        );
        let store = Arc::new(MemoryStore::new(vec![apple()]));
        let (tx, mut rx) = mpsc::channel(8);
        let handle = scheduler(transport, store).start(tx);

        let first = rx.recv().await.unwrap();
        assert!(matches!(
            first,
            PollEvent::TickFailed(TickError::Fetch(FetchError::Status(503)))
        ));

        let second = rx.recv().await.unwrap();
        assert!(matches!(second, PollEvent::Quotes(_)));

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_store_stays_idle() {
        let transport = Arc::new(ScriptedTransport::new());
        let (tx, mut rx) = mpsc::channel(8);
        let handle = scheduler(transport.clone(), Arc::new(MemoryStore::default())).start(tx);

        assert!(matches!(rx.recv().await, Some(PollEvent::Idle)));
        assert!(rx.recv().await.is_none());
        assert_eq!(handle.state(), SchedulerState::Idle);
        assert_eq!(transport.calls(), 0);
        handle.finished().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_changes_apply_at_next_tick() {
        let transport = Arc::new(ScriptedTransport::new().otherwise(Ok(apple_csv())));
        let store = Arc::new(MemoryStore::new(vec![apple()]));
        let (tx, mut rx) = mpsc::channel(8);
        let handle = scheduler(transport.clone(), store.clone()).start(tx);

        assert!(matches!(rx.recv().await, Some(PollEvent::Quotes(ref b)) if b.deltas.len() == 1));

        store.save(&[apple(), microsoft()]).unwrap();
        match rx.recv().await {
            Some(PollEvent::Quotes(batch)) => {
                assert_eq!(batch.deltas.len(), 2);
                assert!(!batch.deltas[1].has_data());
            }
            other => panic!("Expected quotes, got {:?}", other),
        }
        assert!(transport.urls()[1].contains("s=AAPL+MSFT&"));

        store.save(&[]).unwrap();
        assert!(matches!(rx.recv().await, Some(PollEvent::Idle)));
        assert_eq!(handle.state(), SchedulerState::Idle);
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_while_idle_event_is_pending() {
        let transport = Arc::new(ScriptedTransport::new().otherwise(Ok(apple_csv())));
        let store = Arc::new(MemoryStore::new(vec![apple()]));
        // Capacity 1 and never drained: the first batch fills it.
        let (tx, mut rx) = mpsc::channel(1);
        let handle = scheduler(transport.clone(), store.clone()).start(tx);
        let mut state = handle.subscribe();

        // Polling is published only after the first load of the list.
        state.wait_for(|s| *s == SchedulerState::Polling).await.unwrap();
        store.save(&[]).unwrap();
        // Next tick sees the empty list and parks on the full channel.
        tokio::time::sleep(Duration::from_secs(50)).await;

        let stopped = tokio::time::timeout(Duration::from_secs(600), handle.stop()).await;
        assert!(stopped.is_ok(), "stop must not wait on a full channel");
        assert_eq!(*state.borrow_and_update(), SchedulerState::Stopped);

        assert!(matches!(rx.recv().await, Some(PollEvent::Quotes(_))));
        assert!(rx.recv().await.is_none());
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_terminal() {
        let transport = Arc::new(ScriptedTransport::new().otherwise(Ok(apple_csv())));
        let store = Arc::new(MemoryStore::new(vec![apple()]));
        let sched = scheduler(transport.clone(), store);
        let (tx, mut rx) = mpsc::channel(8);
        let handle = sched.clone().start(tx);

        assert!(matches!(rx.recv().await, Some(PollEvent::Quotes(_))));
        let mut state = handle.subscribe();
        handle.stop().await;

        assert_eq!(*state.borrow_and_update(), SchedulerState::Stopped);
        tokio::time::sleep(Duration::from_secs(200)).await;
        assert!(rx.recv().await.is_none());
        assert_eq!(transport.calls(), 1);
        assert!(matches!(sched.tick(&[apple()]).await, Err(TickError::Stopped)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_fetch_is_not_doubled() {
        let gate = Arc::new(Notify::new());
        let transport = Arc::new(
            ScriptedTransport::new()
                .otherwise(Ok(apple_csv()))
                .gated(gate.clone()),
        );
        let store = Arc::new(MemoryStore::new(vec![apple()]));
        let (tx, mut rx) = mpsc::channel(8);
        let handle = scheduler(transport.clone(), store).start(tx);

        // Several interval boundaries pass while the first fetch hangs.
        tokio::time::sleep(Duration::from_secs(200)).await;
        assert_eq!(transport.calls(), 1);

        gate.notify_one();
        assert!(matches!(rx.recv().await, Some(PollEvent::Quotes(ref b)) if b.sequence == 1));
        assert_eq!(transport.max_in_flight(), 1);

        handle.stop().await;
    }
}
