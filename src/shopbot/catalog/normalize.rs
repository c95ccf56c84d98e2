//! Mapping of vendor (Hungarian) headers to canonical fields.

use tracing::warn;

use crate::shopbot::catalog::error::{CatalogError, Result};
use crate::shopbot::catalog::model::{CellValue, Field, RawRow, SourceRecord};

/// Checks that every header the conversion depends on is present.
///
/// Headers are compared after trimming; optional headers may be absent.
pub fn check_headers<S: AsRef<str>>(headers: &[S]) -> Result<()> {
    let missing: Vec<String> = Field::REQUIRED
        .into_iter()
        .filter(|field| {
            !headers
                .iter()
                .any(|header| header.as_ref().trim() == field.source_header())
        })
        .map(|field| field.source_header().to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(CatalogError::SchemaMismatch { missing })
    }
}

/// Produces the canonical view of a raw row. Absent headers and empty cells
/// become `None`; unknown columns are ignored.
pub fn normalize_row(row: &RawRow) -> SourceRecord {
    let text = |field: Field| row.get(field.source_header()).and_then(CellValue::as_text);

    SourceRecord {
        code: text(Field::Code),
        name: text(Field::Name),
        category1: text(Field::Category1),
        category2: text(Field::Category2),
        category3: text(Field::Category3),
        size: text(Field::Size),
        parts_count: row
            .get(Field::PartsCount.source_header())
            .and_then(coerce_count),
        color: text(Field::Color),
        material: text(Field::Material),
        thickness: text(Field::Thickness),
        price_raw: text(Field::PriceRaw),
    }
}

pub(crate) fn coerce_count(cell: &CellValue) -> Option<u32> {
    let parsed = match cell {
        CellValue::Empty => return None,
        CellValue::Int(value) => u32::try_from(*value).ok(),
        CellValue::Float(value) if value.fract() == 0.0 && *value >= 0.0 => {
            u32::try_from(*value as u64).ok()
        }
        CellValue::Text(value) if value.trim().is_empty() => return None,
        CellValue::Text(value) => value.trim().parse::<u32>().ok(),
        CellValue::Float(_) | CellValue::Bool(_) => None,
    };
    if parsed.is_none() {
        warn!(value = ?cell, "ignoring parts count that is not a whole number");
    }
    parsed
}
