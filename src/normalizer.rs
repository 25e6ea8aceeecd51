//! Price text normalization.
//!
//! Turns the visible text of a price element into a canonical decimal,
//! accepting the formats seen on real product pages:
//!
//! - European with dot-grouped thousands and decimal comma (`1.845,90 €`)
//! - Plain decimal comma (`1845,90`)
//! - US/UK with comma-grouped thousands and decimal dot (`$1,234.56`)
//! - Space-grouped thousands with either decimal marker (`1 234,56`)
//! - Bare integers and simple decimals (`1234`, `1234.56`)
//!
//! When both `.` and `,` appear, the separator nearer the end of the match
//! is treated as the decimal marker and the other is stripped as grouping.
//! This is a heuristic, not a guarantee: a three-digit decimal fraction or
//! four-digit grouped thousands without a decimal part can misparse, and
//! intent cannot be recovered from the text alone, so the precedence is
//! kept as documented rather than second-guessed per input.

use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::utils::error::NormalizationError;

/// A price is a maximal run of digits with single-character separators
/// between digit groups. Matching the whole run at once keeps grouped
/// formats like "1,234.56" from being truncated at the first separator;
/// space-joined groups must be exactly three digits so adjacent unrelated
/// numbers ("19.99 23") never merge.
static PRICE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+(?:[.,][0-9]+|\s[0-9]{3})*").unwrap());

/// A final comma group of 1-2 digits reads as a decimal marker.
static DECIMAL_COMMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",[0-9]{1,2}$").unwrap());

/// Parse locale-formatted price text into a canonical decimal.
///
/// Pure and deterministic: the same input always yields the same output.
/// Currency symbols are ignored but never required; input with no digits
/// is an error, never silently zero.
pub fn normalize(raw: &str) -> Result<Decimal, NormalizationError> {
    // Non-breaking and narrow non-breaking spaces show up as thousands
    // separators on European storefronts.
    let text = raw
        .replace('\u{a0}', " ")
        .replace('\u{202f}', " ")
        .trim()
        .to_string();

    if text.is_empty() {
        return Err(NormalizationError::NoMatch);
    }

    for mat in PRICE_RUN.find_iter(&text) {
        match parse_numeric(mat.as_str()) {
            Ok(price) => return Ok(price),
            Err(_) => continue,
        }
    }

    Err(NormalizationError::NoMatch)
}

/// Resolve separators in a matched digit run and parse it.
fn parse_numeric(run: &str) -> Result<Decimal, NormalizationError> {
    let mut cleaned = run.to_string();

    if cleaned.contains(',') && cleaned.contains('.') {
        // The separator nearer the end wins as the decimal marker.
        if cleaned.rfind(',') > cleaned.rfind('.') {
            cleaned = cleaned.replace('.', "").replace(',', ".");
        } else {
            cleaned = cleaned.replace(',', "");
        }
    } else if cleaned.contains(',') {
        // "1845,90" reads as a decimal marker; anything else is grouping
        // ("1,234").
        if DECIMAL_COMMA.is_match(&cleaned) {
            cleaned = cleaned.replace(',', ".");
        } else {
            cleaned = cleaned.replace(',', "");
        }
    } else if cleaned.matches('.').count() > 1 {
        // Multiple dots can only be grouping ("1.234.567").
        cleaned = cleaned.replace('.', "");
    }

    // Spaces left over are thousands grouping.
    cleaned.retain(|c| c != ' ');

    Decimal::from_str(&cleaned).map_err(|_| NormalizationError::InvalidNumber)
}
