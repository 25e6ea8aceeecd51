//! Fetch-extract pipeline: one HTTP GET, one parsed document, one price.
//!
//! Every expected failure mode (network, missing element, unparseable
//! text) is returned as a typed [`ExtractionResult`] failure; nothing here
//! writes to storage.

use anyhow::Result;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER};
use scraper::Html;
use tracing::debug;
use url::Url;

use crate::config::ScraperConfig;
use crate::locator::{self, Locator};
use crate::models::{ExtractionResult, PriceExtraction, SourceSpec};
use crate::normalizer;
use crate::utils::error::ExtractError;

pub struct PriceExtractor {
    client: Client,
    config: ScraperConfig,
}

impl PriceExtractor {
    pub fn new(config: ScraperConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(std::time::Duration::from_secs(config.request_timeout))
            .build()?;

        Ok(Self { client, config })
    }

    /// Run the full pipeline against one source.
    pub async fn extract(&self, source: &SourceSpec) -> ExtractionResult {
        let body = self.fetch(&source.url).await?;
        let document = Html::parse_document(&body);

        let price_element = locator::resolve(&document, &source.price_locator).ok_or_else(|| {
            ExtractError::LocatorNotFound {
                locator: source.price_locator.to_string(),
            }
        })?;

        let raw_text = locator::element_text(&price_element);
        let price = normalizer::normalize(&raw_text).map_err(|err| ExtractError::PriceParse {
            raw_text: raw_text.clone(),
            source: err,
        })?;

        // Name is advisory: a missing or failed name locator never fails
        // the extraction.
        let name = source
            .name_locator
            .as_ref()
            .and_then(|loc| locator::resolve(&document, loc))
            .map(|el| locator::element_text(&el))
            .filter(|text| !text.is_empty());

        debug!(url = %source.url, %price, "extracted price");

        Ok(PriceExtraction {
            price,
            raw_text,
            name,
        })
    }

    /// Single-shot surface for configuration tooling: vet a pair of raw
    /// selector strings against a live URL before saving them.
    pub async fn test_fetch(
        &self,
        url: &str,
        price_selector: &str,
        name_selector: Option<&str>,
    ) -> ExtractionResult {
        let source = SourceSpec::new(url, price_selector, name_selector, "test fetch");
        self.extract(&source).await
    }

    async fn fetch(&self, url: &str) -> Result<String, ExtractError> {
        let response = self
            .client
            .get(url)
            .headers(self.request_headers(url))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExtractError::Fetch(format!("HTTP status {status} for {url}")));
        }

        Ok(response.text().await?)
    }

    /// Browser-like headers plus a Referer derived from the target's own
    /// origin; sites commonly reject referer-less scrapes.
    fn request_headers(&self, url: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        if let Ok(parsed) = Url::parse(url) {
            if let Some(host) = parsed.host_str() {
                let referer = format!("{}://{}/", parsed.scheme(), host);
                if let Ok(value) = HeaderValue::from_str(&referer) {
                    headers.insert(REFERER, value);
                }
            }
        }

        for (name, value) in &self.config.extra_headers {
            let parsed = (
                name.parse::<HeaderName>(),
                HeaderValue::from_str(value),
            );
            if let (Ok(name), Ok(value)) = parsed {
                headers.insert(name, value);
            }
        }

        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::ErrorKind;

    fn extractor() -> PriceExtractor {
        PriceExtractor::new(ScraperConfig::default()).unwrap()
    }

    #[test]
    fn test_referer_derived_from_origin() {
        let headers = extractor().request_headers("https://shop.example.com/p/1?x=1");
        assert_eq!(
            headers.get(REFERER).unwrap(),
            "https://shop.example.com/"
        );
    }

    #[test]
    fn test_invalid_url_omits_referer() {
        let headers = extractor().request_headers("not a url");
        assert!(headers.get(REFERER).is_none());
        assert!(headers.get(ACCEPT).is_some());
    }

    #[test]
    fn test_extra_headers_merged() {
        let mut config = ScraperConfig::default();
        config
            .extra_headers
            .insert("x-shop-token".to_string(), "abc123".to_string());
        let extractor = PriceExtractor::new(config).unwrap();

        let headers = extractor.request_headers("https://example.com/");
        assert_eq!(headers.get("x-shop-token").unwrap(), "abc123");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_fetch_error() {
        let source = SourceSpec::new(
            // Reserved TLD, never resolves.
            "http://does-not-exist.invalid/p/1",
            ".price",
            None,
            "nowhere",
        );
        let result = extractor().extract(&source).await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::FetchError);
    }
}
