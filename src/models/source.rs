use serde::{Deserialize, Serialize};

use crate::locator::Locator;

/// A single fetchable listing: our own product page or one competitor's
/// page. Owned by the catalog; the pipeline only reads it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceSpec {
    pub url: String,
    pub price_locator: Locator,
    pub name_locator: Option<Locator>,
    pub display_name: String,
}

impl SourceSpec {
    /// Build a spec from raw operator-supplied selector strings.
    pub fn new(
        url: impl Into<String>,
        price_selector: &str,
        name_selector: Option<&str>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            price_locator: Locator::classify(price_selector),
            name_locator: name_selector.map(Locator::classify),
            display_name: display_name.into(),
        }
    }

    /// Display name, falling back to the URL host when the operator left
    /// it empty.
    pub fn display_name_or_host(&self) -> String {
        if !self.display_name.trim().is_empty() {
            return self.display_name.clone();
        }
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| "unknown source".to_string())
    }
}

/// A catalog entry: our own listing plus the competitor listings tracked
/// against it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackedItem {
    pub id: String,
    pub name: String,
    pub own_source: SourceSpec,
    pub competitors: Vec<SourceSpec>,
}
