use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::utils::error::{ErrorKind, ExtractError};

/// Successful extraction from one source. The price is authoritative, the
/// name advisory; `raw_text` is kept for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceExtraction {
    pub price: Decimal,
    pub raw_text: String,
    pub name: Option<String>,
}

/// Outcome of one fetch-extract attempt: a price or a typed failure, never
/// both.
pub type ExtractionResult = Result<PriceExtraction, ExtractError>;

/// A failure flattened into reportable data, keyed by source display name
/// in scan outcomes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceIssue {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&ExtractError> for SourceIssue {
    fn from(err: &ExtractError) -> Self {
        SourceIssue {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Per-item result of a scan cycle. Ephemeral: produced per run, handed
/// downstream, never mutated.
#[derive(Debug)]
pub struct ScanOutcome {
    pub item_id: String,
    pub own_result: ExtractionResult,
    pub competitor_results: HashMap<String, ExtractionResult>,
}

impl ScanOutcome {
    pub fn own_price(&self) -> Option<Decimal> {
        self.own_result.as_ref().ok().map(|e| e.price)
    }

    /// Competitor prices that extracted successfully, keyed by display
    /// name.
    pub fn competitor_prices(&self) -> HashMap<String, Decimal> {
        self.competitor_results
            .iter()
            .filter_map(|(name, result)| {
                result.as_ref().ok().map(|e| (name.clone(), e.price))
            })
            .collect()
    }

    /// All failures for this item, own source reported under the given
    /// label so it stays distinct from competitor issues.
    pub fn issues(&self, own_label: &str) -> HashMap<String, SourceIssue> {
        let mut issues = HashMap::new();
        if let Err(err) = &self.own_result {
            issues.insert(own_label.to_string(), SourceIssue::from(err));
        }
        for (name, result) in &self.competitor_results {
            if let Err(err) = result {
                issues.insert(name.clone(), SourceIssue::from(err));
            }
        }
        issues
    }
}

/// Cycle-level bookkeeping logged when a scan completes.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ScanSummary {
    pub scraped: usize,
    pub errors: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::NormalizationError;
    use std::str::FromStr;

    fn extraction(price: &str) -> PriceExtraction {
        PriceExtraction {
            price: Decimal::from_str(price).unwrap(),
            raw_text: format!("{price} €"),
            name: None,
        }
    }

    #[test]
    fn test_outcome_price_accessors() {
        let mut competitor_results = HashMap::new();
        competitor_results.insert("Rival A".to_string(), Ok(extraction("18.50")));
        competitor_results.insert(
            "Rival B".to_string(),
            Err(ExtractError::Fetch("connect timeout".into())),
        );

        let outcome = ScanOutcome {
            item_id: "widget-1".to_string(),
            own_result: Ok(extraction("19.99")),
            competitor_results,
        };

        assert_eq!(outcome.own_price(), Some(Decimal::from_str("19.99").unwrap()));
        let prices = outcome.competitor_prices();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices["Rival A"], Decimal::from_str("18.50").unwrap());
    }

    #[test]
    fn test_outcome_issues_keep_own_and_competitor_distinct() {
        let mut competitor_results = HashMap::new();
        competitor_results.insert(
            "Rival B".to_string(),
            Err(ExtractError::PriceParse {
                raw_text: "sold out".into(),
                source: NormalizationError::NoMatch,
            }),
        );

        let outcome = ScanOutcome {
            item_id: "widget-1".to_string(),
            own_result: Err(ExtractError::LocatorNotFound {
                locator: ".price".into(),
            }),
            competitor_results,
        };

        let issues = outcome.issues("own");
        assert_eq!(issues.len(), 2);
        assert_eq!(issues["own"].kind, ErrorKind::LocatorNotFound);
        assert_eq!(issues["Rival B"].kind, ErrorKind::PriceParseError);
        assert!(issues["Rival B"].message.contains("sold out"));
    }
}
