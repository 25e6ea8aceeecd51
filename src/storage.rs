//! Storage collaborator contract.
//!
//! The engine reads its catalog and settings through [`PriceStore`] and
//! hands extracted prices back through it; it owns no persistence of its
//! own. [`MemoryStore`] backs the CLI and the tests.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;

use crate::config::AppConfig;
use crate::models::{SourceSpec, TrackedItem};

/// Per-scan settings sourced from the storage collaborator.
#[derive(Debug, Clone)]
pub struct WatchSettings {
    pub interval_minutes: u64,
    pub user_agent: String,
    pub request_timeout_secs: u64,
}

impl From<&AppConfig> for WatchSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            interval_minutes: config.scheduler.interval_minutes,
            user_agent: config.scraper.user_agent.clone(),
            request_timeout_secs: config.scraper.request_timeout,
        }
    }
}

/// One recorded price observation, as handed to the collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceRecord {
    pub item_id: String,
    pub own_price: Decimal,
    pub competitor_prices: HashMap<String, Decimal>,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait PriceStore: Send + Sync {
    async fn get_tracked_items(&self) -> Result<Vec<TrackedItem>>;

    async fn get_config(&self) -> Result<WatchSettings>;

    async fn record_price(
        &self,
        item_id: &str,
        own_price: Decimal,
        competitor_prices: HashMap<String, Decimal>,
        timestamp: DateTime<Utc>,
    ) -> Result<()>;

    async fn record_scan_completed(&self, timestamp: DateTime<Utc>) -> Result<()>;
}

/// In-memory store used by the CLI (catalog loaded from a TOML file) and
/// by tests.
pub struct MemoryStore {
    settings: WatchSettings,
    items: RwLock<Vec<TrackedItem>>,
    records: RwLock<Vec<PriceRecord>>,
    last_scan: RwLock<Option<DateTime<Utc>>>,
}

impl MemoryStore {
    pub fn new(settings: WatchSettings) -> Self {
        Self {
            settings,
            items: RwLock::new(Vec::new()),
            records: RwLock::new(Vec::new()),
            last_scan: RwLock::new(None),
        }
    }

    pub fn with_items(settings: WatchSettings, items: Vec<TrackedItem>) -> Self {
        Self {
            settings,
            items: RwLock::new(items),
            records: RwLock::new(Vec::new()),
            last_scan: RwLock::new(None),
        }
    }

    /// Load a catalog TOML file into a fresh store. File-level settings
    /// override the application defaults.
    pub fn from_catalog_file(path: &Path, config: &AppConfig) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading catalog file {}", path.display()))?;
        let catalog: CatalogFile = toml::from_str(&raw)
            .with_context(|| format!("parsing catalog file {}", path.display()))?;

        let mut settings = WatchSettings::from(config);
        if let Some(file_settings) = catalog.settings {
            if let Some(interval) = file_settings.interval_minutes {
                settings.interval_minutes = interval;
            }
            if let Some(user_agent) = file_settings.user_agent {
                settings.user_agent = user_agent;
            }
            if let Some(timeout) = file_settings.request_timeout_secs {
                settings.request_timeout_secs = timeout;
            }
        }

        let items = catalog
            .items
            .into_iter()
            .map(CatalogItem::into_tracked_item)
            .collect();

        Ok(Self::with_items(settings, items))
    }

    /// Recorded observations, oldest first.
    pub async fn records(&self) -> Vec<PriceRecord> {
        self.records.read().await.clone()
    }

    pub async fn last_scan(&self) -> Option<DateTime<Utc>> {
        *self.last_scan.read().await
    }
}

#[async_trait]
impl PriceStore for MemoryStore {
    async fn get_tracked_items(&self) -> Result<Vec<TrackedItem>> {
        Ok(self.items.read().await.clone())
    }

    async fn get_config(&self) -> Result<WatchSettings> {
        Ok(self.settings.clone())
    }

    async fn record_price(
        &self,
        item_id: &str,
        own_price: Decimal,
        competitor_prices: HashMap<String, Decimal>,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        self.records.write().await.push(PriceRecord {
            item_id: item_id.to_string(),
            own_price,
            competitor_prices,
            timestamp,
        });
        Ok(())
    }

    async fn record_scan_completed(&self, timestamp: DateTime<Utc>) -> Result<()> {
        *self.last_scan.write().await = Some(timestamp);
        Ok(())
    }
}

// Catalog file shape: raw selector strings, classified on load.

#[derive(Debug, Deserialize)]
struct CatalogFile {
    settings: Option<CatalogSettings>,
    #[serde(default)]
    items: Vec<CatalogItem>,
}

#[derive(Debug, Deserialize)]
struct CatalogSettings {
    interval_minutes: Option<u64>,
    user_agent: Option<String>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct CatalogItem {
    id: String,
    name: String,
    own: CatalogSource,
    #[serde(default)]
    competitors: Vec<CatalogSource>,
}

#[derive(Debug, Deserialize)]
struct CatalogSource {
    url: String,
    price_selector: String,
    name_selector: Option<String>,
    #[serde(default)]
    display_name: String,
}

impl CatalogSource {
    fn into_source_spec(self) -> SourceSpec {
        let spec = SourceSpec::new(
            self.url,
            &self.price_selector,
            self.name_selector.as_deref(),
            self.display_name,
        );
        let display_name = spec.display_name_or_host();
        SourceSpec {
            display_name,
            ..spec
        }
    }
}

impl CatalogItem {
    fn into_tracked_item(self) -> TrackedItem {
        TrackedItem {
            id: self.id,
            name: self.name,
            own_source: self.own.into_source_spec(),
            competitors: self
                .competitors
                .into_iter()
                .map(CatalogSource::into_source_spec)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::Locator;
    use std::str::FromStr;

    fn settings() -> WatchSettings {
        WatchSettings {
            interval_minutes: 60,
            user_agent: "TestAgent/1.0".to_string(),
            request_timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryStore::new(settings());
        assert!(store.get_tracked_items().await.unwrap().is_empty());

        let now = Utc::now();
        let mut competitor_prices = HashMap::new();
        competitor_prices.insert("Rival".to_string(), Decimal::from_str("18.50").unwrap());

        store
            .record_price("widget-1", Decimal::from_str("19.99").unwrap(), competitor_prices, now)
            .await
            .unwrap();
        store.record_scan_completed(now).await.unwrap();

        let records = store.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].item_id, "widget-1");
        assert_eq!(records[0].competitor_prices.len(), 1);
        assert_eq!(store.last_scan().await, Some(now));
    }

    #[tokio::test]
    async fn test_get_config_through_trait() {
        let store: std::sync::Arc<dyn PriceStore> =
            std::sync::Arc::new(MemoryStore::new(settings()));

        let config = store.get_config().await.unwrap();
        assert_eq!(config.interval_minutes, 60);
        assert_eq!(config.user_agent, "TestAgent/1.0");
        assert_eq!(config.request_timeout_secs, 5);
    }

    #[test]
    fn test_catalog_toml_parses_and_classifies() {
        let raw = r##"
            [settings]
            interval_minutes = 30

            [[items]]
            id = "widget-1"
            name = "Blue Widget"

            [items.own]
            url = "https://example.com/p/1"
            price_selector = "#price"
            name_selector = "h1"
            display_name = "Our Shop"

            [[items.competitors]]
            url = "https://rival.example/p/9"
            price_selector = ".price"
        "##;

        let catalog: CatalogFile = toml::from_str(raw).unwrap();
        assert_eq!(catalog.settings.unwrap().interval_minutes, Some(30));
        assert_eq!(catalog.items.len(), 1);

        let item = catalog.items.into_iter().next().unwrap().into_tracked_item();
        assert_eq!(item.own_source.price_locator, Locator::ById("price".into()));
        assert_eq!(item.competitors.len(), 1);
        assert_eq!(
            item.competitors[0].price_locator,
            Locator::ByClass("price".into())
        );
        // Empty display name falls back to the host.
        assert_eq!(item.competitors[0].display_name, "rival.example");
    }
}
