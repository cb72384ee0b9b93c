use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Notify;

pub const DEFAULT_RESTART_INTERVAL: u64 = 10_000;

/// Counts dispatched requests and asks the listener to restart once every
/// `interval` of them.
///
/// A policy lives for one listener generation. [`Server::serve`] starts a
/// fresh one per bind, so each generation serves `interval` requests and the
/// next dispatch is the one that closes its connection and triggers the
/// restart. The fuzz session counter keeps running across generations.
///
/// [`Server::serve`]: crate::server::Server::serve
#[derive(Debug)]
pub struct RestartPolicy {
    interval: u64,
    dispatched: AtomicU64,
    requested: AtomicBool,
    notify: Notify,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RESTART_INTERVAL)
    }
}

impl RestartPolicy {
    #[must_use]
    pub fn new(interval: u64) -> Self {
        Self {
            interval: interval.max(1),
            dispatched: AtomicU64::new(0),
            requested: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    #[must_use]
    pub fn interval(&self) -> u64 {
        self.interval
    }

    #[must_use]
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::SeqCst)
    }

    /// Records one dispatch. Returns true when this dispatch is the one
    /// that triggers the restart; the request is then not served.
    pub fn on_dispatch(&self) -> bool {
        let count = self.dispatched.fetch_add(1, Ordering::SeqCst);
        if count == 0 || count % self.interval != 0 {
            return false;
        }

        tracing::info!("Restart requested after {} requests", count);
        self.requested.store(true, Ordering::SeqCst);
        self.notify.notify_one();
        true
    }

    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Resolves once a restart was requested.
    pub async fn requested(&self) {
        if self.is_requested() {
            return;
        }
        self.notify.notified().await;
    }
}
