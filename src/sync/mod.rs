//! Quote synchronization: reconcile decoded rows, poll on a timer

pub mod board;
pub mod reconcile;
pub mod scheduler;

pub use board::{QuoteBatch, QuoteBoard};
pub use reconcile::{ReconcileMismatch, Reconciler, Reconciliation};
pub use scheduler::{PollEvent, PollHandle, PollScheduler, SchedulerState, TickError, DEFAULT_INTERVAL};
