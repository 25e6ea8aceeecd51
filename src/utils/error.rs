use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable discriminant for extraction failures.
///
/// Scan outcomes aggregate failures per source; the kind lets an operator
/// tell "site unreachable" apart from "page changed, selector broken".
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    FetchError,
    LocatorNotFound,
    PriceParseError,
}

/// Failure of a single fetch-extract attempt against one source.
///
/// Every variant is recovered at the pipeline boundary and carried as data
/// in an [`ExtractionResult`](crate::models::ExtractionResult); nothing here
/// propagates past the pipeline as a panic or an uncaught error.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("element not found: {locator}")]
    LocatorNotFound { locator: String },

    #[error("unparseable price text {raw_text:?}")]
    PriceParse {
        raw_text: String,
        #[source]
        source: NormalizationError,
    },
}

impl ExtractError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExtractError::Fetch(_) => ErrorKind::FetchError,
            ExtractError::LocatorNotFound { .. } => ErrorKind::LocatorNotFound,
            ExtractError::PriceParse { .. } => ErrorKind::PriceParseError,
        }
    }
}

impl From<reqwest::Error> for ExtractError {
    fn from(err: reqwest::Error) -> Self {
        ExtractError::Fetch(err.to_string())
    }
}

/// Raised by the price text normalizer when no supported pattern matches.
/// The pipeline wraps this into [`ExtractError::PriceParse`] together with
/// the raw text for operator diagnosis.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizationError {
    #[error("no price pattern found in text")]
    NoMatch,

    #[error("matched digits could not be parsed as a number")]
    InvalidNumber,
}
