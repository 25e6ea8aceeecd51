pub mod catalog;
pub mod config;
pub mod locator;
pub mod models;
pub mod normalizer;
pub mod pipeline;
pub mod scheduler;
pub mod storage;
pub mod utils;

// Re-export commonly used types
pub use locator::Locator;
pub use models::{ExtractionResult, PriceExtraction, ScanOutcome, ScanSummary, SourceSpec, TrackedItem};
pub use utils::error::{ErrorKind, ExtractError, NormalizationError};
