//! Catalog scan: one sequential pass over every tracked item and its
//! competitor sources.
//!
//! Failures are captured as data, never propagated as control flow — a
//! broken own locator or an unreachable competitor must not abort the rest
//! of the scan. Fetches are deliberately sequential with a randomized
//! inter-request delay; politeness toward scraped sites outweighs latency.

use rand::Rng;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::BackoffConfig;
use crate::models::{ScanOutcome, TrackedItem};
use crate::pipeline::PriceExtractor;

/// Randomized delay between competitor fetches. Zero bounds disable it.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    min_delay_ms: u64,
    max_delay_ms: u64,
}

impl BackoffPolicy {
    pub fn new(min_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            min_delay_ms,
            max_delay_ms: max_delay_ms.max(min_delay_ms),
        }
    }

    pub fn disabled() -> Self {
        Self::new(0, 0)
    }

    async fn wait(&self) {
        if self.max_delay_ms == 0 {
            return;
        }
        let delay_ms = rand::thread_rng().gen_range(self.min_delay_ms..=self.max_delay_ms);
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }
}

impl From<&BackoffConfig> for BackoffPolicy {
    fn from(config: &BackoffConfig) -> Self {
        Self::new(config.min_delay_ms, config.max_delay_ms)
    }
}

pub struct CatalogScanner {
    extractor: PriceExtractor,
    backoff: BackoffPolicy,
}

impl CatalogScanner {
    pub fn new(extractor: PriceExtractor, backoff: BackoffPolicy) -> Self {
        Self { extractor, backoff }
    }

    /// Scan every tracked item, aggregating successes and per-source
    /// issues. Always returns one outcome per item.
    pub async fn scan_all(&self, items: &[TrackedItem]) -> Vec<ScanOutcome> {
        let mut outcomes = Vec::with_capacity(items.len());
        for item in items {
            outcomes.push(self.scan_item(item).await);
        }
        outcomes
    }

    /// Scan one item: own source first, then each competitor. A failing
    /// own read still leaves competitor data worth collecting.
    pub async fn scan_item(&self, item: &TrackedItem) -> ScanOutcome {
        debug!(item = %item.id, "scanning item");

        let own_result = self.extractor.extract(&item.own_source).await;
        if let Err(err) = &own_result {
            warn!(item = %item.id, url = %item.own_source.url, error = %err,
                  "own-price extraction failed");
        }

        let mut competitor_results = HashMap::new();
        for competitor in &item.competitors {
            self.backoff.wait().await;

            let result = self.extractor.extract(competitor).await;
            if let Err(err) = &result {
                warn!(item = %item.id, competitor = %competitor.display_name,
                      url = %competitor.url, error = %err,
                      "competitor extraction failed");
            }
            competitor_results.insert(competitor.display_name.clone(), result);
        }

        ScanOutcome {
            item_id: item.id.clone(),
            own_result,
            competitor_results,
        }
    }
}
