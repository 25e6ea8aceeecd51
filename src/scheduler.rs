//! Recurring scan scheduling.
//!
//! One owned `Scheduler` per process: it holds its own state and background
//! task handle, with no module-scope globals. The background cycle and
//! `run_now` share a single scan-level lock, so at most one scan executes
//! at a time regardless of trigger origin.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::catalog::CatalogScanner;
use crate::models::ScanSummary;
use crate::storage::PriceStore;

/// Bounded wait for the loop to finish after a stop signal. A cycle
/// already in flight always runs to completion; past this window the
/// task is detached and drains on its own.
const STOP_ACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Snapshot returned by [`Scheduler::status`]; never blocks on an
/// in-progress scan.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub interval: Duration,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct SchedulerState {
    running: bool,
    interval: Duration,
    last_run: Option<DateTime<Utc>>,
    next_run: Option<DateTime<Utc>>,
}

pub struct Scheduler {
    store: Arc<dyn PriceStore>,
    scanner: Arc<CatalogScanner>,
    state: Arc<RwLock<SchedulerState>>,
    scan_lock: Arc<Mutex<()>>,
    stop_tx: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(store: Arc<dyn PriceStore>, scanner: Arc<CatalogScanner>) -> Self {
        Self {
            store,
            scanner,
            state: Arc::new(RwLock::new(SchedulerState {
                running: false,
                interval: Duration::ZERO,
                last_run: None,
                next_run: None,
            })),
            scan_lock: Arc::new(Mutex::new(())),
            stop_tx: None,
            handle: None,
        }
    }

    /// Begin recurring scans at the given interval. Restarting while
    /// already running replaces the loop (idempotent restart).
    pub async fn start(&mut self, interval: Duration) {
        if self.handle.is_some() {
            self.stop().await;
        }

        let (stop_tx, stop_rx) = watch::channel(false);

        {
            let mut state = self.state.write().await;
            state.running = true;
            state.interval = interval;
            state.next_run = Utc::now().checked_add_signed(
                chrono::Duration::from_std(interval).unwrap_or_else(|_| chrono::Duration::zero()),
            );
        }

        let store = Arc::clone(&self.store);
        let scanner = Arc::clone(&self.scanner);
        let state = Arc::clone(&self.state);
        let scan_lock = Arc::clone(&self.scan_lock);

        self.handle = Some(tokio::spawn(run_loop(
            store, scanner, state, scan_lock, stop_rx, interval,
        )));
        self.stop_tx = Some(stop_tx);

        info!(interval_secs = interval.as_secs(), "scheduler started");
    }

    /// Signal the loop to end and wait briefly for it to finish. No-op
    /// when already stopped. A cycle in flight runs to completion; the
    /// signal only prevents further cycles, so a slow drain leaves the
    /// task detached rather than cancelled mid-scan.
    pub async fn stop(&mut self) {
        let Some(stop_tx) = self.stop_tx.take() else {
            return;
        };
        let _ = stop_tx.send(true);

        if let Some(mut handle) = self.handle.take() {
            if tokio::time::timeout(STOP_ACK_TIMEOUT, &mut handle)
                .await
                .is_err()
            {
                warn!("scheduler loop still draining a cycle, detaching");
                drop(handle);
            }
        }

        let mut state = self.state.write().await;
        state.running = false;
        state.next_run = None;

        info!("scheduler stopped");
    }

    pub async fn status(&self) -> SchedulerStatus {
        let state = self.state.read().await;
        SchedulerStatus {
            running: state.running,
            interval: state.interval,
            last_run: state.last_run,
            next_run: state.next_run,
        }
    }

    /// Execute one catalog scan immediately, regardless of scheduler
    /// state. Serialized against the background cycle by the scan-level
    /// lock, so concurrent triggers cannot interleave writes.
    pub async fn run_now(&self) -> Result<ScanSummary> {
        let _guard = self.scan_lock.lock().await;
        let summary = execute_scan(&self.store, &self.scanner).await;

        if summary.is_ok() {
            let mut state = self.state.write().await;
            state.last_run = Some(Utc::now());
        }

        summary
    }
}

/// One full scan: load the catalog, scan it, hand successful extractions
/// to the store, and stamp the completion time.
pub async fn execute_scan(
    store: &Arc<dyn PriceStore>,
    scanner: &CatalogScanner,
) -> Result<ScanSummary> {
    let items = store.get_tracked_items().await?;
    let outcomes = scanner.scan_all(&items).await;

    let mut summary = ScanSummary::default();
    let now = Utc::now();

    for outcome in &outcomes {
        match outcome.own_price() {
            Some(own_price) => {
                store
                    .record_price(&outcome.item_id, own_price, outcome.competitor_prices(), now)
                    .await?;
                summary.scraped += 1;
            }
            // Own read failed: competitor data was still gathered, but
            // there is no own price to record against.
            None => summary.errors += 1,
        }
    }

    store.record_scan_completed(now).await?;
    Ok(summary)
}

async fn run_loop(
    store: Arc<dyn PriceStore>,
    scanner: Arc<CatalogScanner>,
    state: Arc<RwLock<SchedulerState>>,
    scan_lock: Arc<Mutex<()>>,
    mut stop_rx: watch::Receiver<bool>,
    interval: Duration,
) {
    // First cycle fires one full interval after start, not immediately.
    let start = tokio::time::Instant::now() + interval;
    let mut ticker = tokio::time::interval_at(start, interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                {
                    let _guard = scan_lock.lock().await;
                    // Cycle boundary: any failure is logged and the next
                    // interval still fires.
                    match execute_scan(&store, &scanner).await {
                        Ok(summary) => {
                            info!(scraped = summary.scraped, errors = summary.errors,
                                  "scan cycle completed");
                        }
                        Err(err) => {
                            error!(error = %err, "scan cycle failed");
                        }
                    }
                }

                let now = Utc::now();
                let mut state = state.write().await;
                state.last_run = Some(now);
                state.next_run = now.checked_add_signed(
                    chrono::Duration::from_std(interval)
                        .unwrap_or_else(|_| chrono::Duration::zero()),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::BackoffPolicy;
    use crate::config::ScraperConfig;
    use crate::models::TrackedItem;
    use crate::pipeline::PriceExtractor;
    use crate::storage::{MemoryStore, WatchSettings};
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::collections::HashMap;

    /// Store whose catalog load takes a while, to hold a cycle in flight.
    struct SlowStore {
        inner: MemoryStore,
        load_delay: Duration,
    }

    #[async_trait]
    impl PriceStore for SlowStore {
        async fn get_tracked_items(&self) -> Result<Vec<TrackedItem>> {
            tokio::time::sleep(self.load_delay).await;
            self.inner.get_tracked_items().await
        }

        async fn get_config(&self) -> Result<WatchSettings> {
            self.inner.get_config().await
        }

        async fn record_price(
            &self,
            item_id: &str,
            own_price: Decimal,
            competitor_prices: HashMap<String, Decimal>,
            timestamp: DateTime<Utc>,
        ) -> Result<()> {
            self.inner
                .record_price(item_id, own_price, competitor_prices, timestamp)
                .await
        }

        async fn record_scan_completed(&self, timestamp: DateTime<Utc>) -> Result<()> {
            self.inner.record_scan_completed(timestamp).await
        }
    }

    fn settings() -> WatchSettings {
        WatchSettings {
            interval_minutes: 1,
            user_agent: "TestAgent/1.0".to_string(),
            request_timeout_secs: 2,
        }
    }

    fn scanner() -> Arc<CatalogScanner> {
        let extractor = PriceExtractor::new(ScraperConfig::default()).unwrap();
        Arc::new(CatalogScanner::new(extractor, BackoffPolicy::disabled()))
    }

    fn empty_store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::new(settings()))
    }

    #[tokio::test]
    async fn test_status_initially_stopped() {
        let scheduler = Scheduler::new(empty_store(), scanner());
        let status = scheduler.status().await;
        assert!(!status.running);
        assert!(status.last_run.is_none());
        assert!(status.next_run.is_none());
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let mut scheduler = Scheduler::new(empty_store(), scanner());

        scheduler.start(Duration::from_secs(60)).await;
        let status = scheduler.status().await;
        assert!(status.running);
        assert_eq!(status.interval, Duration::from_secs(60));
        assert!(status.next_run.is_some());

        scheduler.stop().await;
        let status = scheduler.status().await;
        assert!(!status.running);
        assert!(status.next_run.is_none());

        // Stopping again is a no-op.
        scheduler.stop().await;
        assert!(!scheduler.status().await.running);
    }

    #[tokio::test]
    async fn test_restart_replaces_interval() {
        let mut scheduler = Scheduler::new(empty_store(), scanner());

        scheduler.start(Duration::from_secs(60)).await;
        scheduler.start(Duration::from_secs(120)).await;

        let status = scheduler.status().await;
        assert!(status.running);
        assert_eq!(status.interval, Duration::from_secs(120));

        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_run_now_updates_last_run() {
        let store = empty_store();
        let scheduler = Scheduler::new(store.clone(), scanner());

        assert!(scheduler.status().await.last_run.is_none());

        let summary = scheduler.run_now().await.unwrap();
        assert_eq!(summary.scraped, 0);
        assert_eq!(summary.errors, 0);

        assert!(scheduler.status().await.last_run.is_some());
        assert!(store.last_scan().await.is_some());
    }

    #[tokio::test]
    async fn test_run_now_while_running_does_not_corrupt_state() {
        let store = empty_store();
        let mut scheduler = Scheduler::new(store.clone(), scanner());

        scheduler.start(Duration::from_secs(60)).await;
        scheduler.run_now().await.unwrap();

        let status = scheduler.status().await;
        assert!(status.running);
        assert!(status.last_run.is_some());

        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_stop_lets_inflight_cycle_finish() {
        let store = Arc::new(SlowStore {
            inner: MemoryStore::new(settings()),
            load_delay: Duration::from_millis(400),
        });
        let mut scheduler = Scheduler::new(store.clone(), scanner());

        scheduler.start(Duration::from_millis(50)).await;
        // First cycle is mid-load when the stop lands.
        tokio::time::sleep(Duration::from_millis(120)).await;
        scheduler.stop().await;

        // The cycle ran to completion and stamped the store.
        assert!(store.inner.last_scan().await.is_some());
        assert!(!scheduler.status().await.running);
    }

    #[tokio::test]
    async fn test_background_cycles_fire_and_stop() {
        let store = empty_store();
        let mut scheduler = Scheduler::new(store.clone(), scanner());

        scheduler.start(Duration::from_millis(50)).await;
        tokio::time::sleep(Duration::from_millis(180)).await;
        scheduler.stop().await;

        let after_stop = store.last_scan().await;
        assert!(after_stop.is_some());

        // No further cycles after stop.
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(store.last_scan().await, after_stop);
        assert!(!scheduler.status().await.running);
    }
}
