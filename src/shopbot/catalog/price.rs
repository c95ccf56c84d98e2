//! Parsing of the vendor's multi-valued price cells such as `"13.990 ; 8990"`.

use crate::shopbot::catalog::error::PriceParseError;
use crate::shopbot::catalog::model::Price;

/// Separator between the regular price and its alternates.
pub const SEGMENT_SEPARATOR: char = ';';

/// Number of amounts accepted unless configured otherwise.
pub const DEFAULT_MAX_SEGMENTS: usize = 2;

/// Parses a price cell with the default segment limit.
pub fn parse_price(raw: &str) -> Result<Price, PriceParseError> {
    parse_price_with_limit(raw, DEFAULT_MAX_SEGMENTS)
}

/// Parses a price cell into its ordered amounts.
///
/// `.` is read as a thousands separator, never as a decimal point, so every
/// group after the first must hold exactly three digits. Extra segments are an
/// error rather than being truncated.
pub fn parse_price_with_limit(raw: &str, max_segments: usize) -> Result<Price, PriceParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PriceParseError::Empty);
    }

    let segments: Vec<&str> = trimmed.split(SEGMENT_SEPARATOR).collect();
    if segments.len() > max_segments {
        return Err(PriceParseError::TooManySegments {
            count: segments.len(),
            max: max_segments,
        });
    }

    let amounts = segments
        .into_iter()
        .map(parse_amount)
        .collect::<Result<Vec<_>, _>>()?;
    Price::try_from(amounts)
}

fn parse_amount(segment: &str) -> Result<u64, PriceParseError> {
    let non_numeric = || PriceParseError::NonNumeric {
        segment: segment.trim().to_string(),
    };

    let compact: String = segment.chars().filter(|ch| !ch.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(non_numeric());
    }

    let mut groups = compact.split('.');
    let head = groups.next().unwrap_or_default();
    let tail: Vec<&str> = groups.collect();

    let head_ok = !head.is_empty()
        && head.bytes().all(|byte| byte.is_ascii_digit())
        && (tail.is_empty() || head.len() <= 3);
    let tail_ok = tail
        .iter()
        .all(|group| group.len() == 3 && group.bytes().all(|byte| byte.is_ascii_digit()));
    if !head_ok || !tail_ok {
        return Err(non_numeric());
    }

    let digits: String = compact.chars().filter(|ch| *ch != '.').collect();
    digits.parse::<u64>().map_err(|_| non_numeric())
}
