//! The intermediate CSV export written by the converter and read by the
//! synchronizer. Columns carry canonical field names.

use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::shopbot::catalog::error::{
    CatalogError, ExportRowError, MissingIdentityError, PriceParseError, Result,
};
use crate::shopbot::catalog::model::{CellValue, PriceField, ProductRecord};
use crate::shopbot::catalog::normalize::coerce_count;
use crate::shopbot::catalog::price::parse_price_with_limit;

/// Column names of the export, in file order.
pub const EXPORT_COLUMNS: [&str; 10] = [
    "code",
    "name",
    "category_path",
    "size",
    "parts_count",
    "color",
    "material",
    "thickness",
    "price",
    "price_raw",
];

/// Line number of the first record (the header is line 1).
const FIRST_RECORD_LINE: usize = 2;

#[derive(Debug, Serialize, Deserialize)]
struct ExportRow {
    code: String,
    name: String,
    category_path: String,
    size: Option<String>,
    parts_count: Option<String>,
    color: Option<String>,
    material: Option<String>,
    thickness: Option<String>,
    /// Canonical amounts, empty when the source price was rejected.
    price: String,
    price_raw: String,
}

impl ExportRow {
    fn from_record(record: &ProductRecord) -> Self {
        let price = match &record.price {
            PriceField::Parsed(price) => price.to_string(),
            PriceField::Invalid(_) => String::new(),
        };
        Self {
            code: record.code.clone(),
            name: record.name.clone(),
            category_path: record.category_path.clone(),
            size: record.size.clone(),
            parts_count: record.parts_count.map(|count| count.to_string()),
            color: record.color.clone(),
            material: record.material.clone(),
            thickness: record.thickness.clone(),
            price,
            price_raw: record.price_raw.clone(),
        }
    }

    /// A hand-edited price that no longer parses holds the record back
    /// instead of rejecting the line, so its code still counts as present.
    fn into_record(
        self,
        line: usize,
        max_price_segments: usize,
    ) -> std::result::Result<ProductRecord, MissingIdentityError> {
        let code = self.code.trim().to_string();
        if code.is_empty() {
            return Err(MissingIdentityError { row: line });
        }

        let price = if self.price.trim().is_empty() {
            match parse_price_with_limit(&self.price_raw, max_price_segments) {
                Ok(_) => {
                    warn!(line, code = %code, raw = %self.price_raw, "price column is empty");
                    PriceField::Invalid(PriceParseError::Empty)
                }
                Err(error) => PriceField::Invalid(error),
            }
        } else {
            match parse_price_with_limit(&self.price, max_price_segments) {
                Ok(price) => PriceField::Parsed(price),
                Err(error) => {
                    warn!(line, code = %code, price = %self.price, %error, "export price does not parse");
                    PriceField::Invalid(error)
                }
            }
        };

        Ok(ProductRecord {
            code,
            name: self.name,
            category_path: self.category_path,
            size: non_empty(self.size),
            parts_count: self
                .parts_count
                .and_then(|count| coerce_count(&CellValue::Text(count))),
            color: non_empty(self.color),
            material: non_empty(self.material),
            thickness: non_empty(self.thickness),
            price,
            price_raw: self.price_raw,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

/// Streams records into an export file.
pub struct ExportWriter {
    writer: csv::Writer<File>,
}

impl ExportWriter {
    /// Creates (or truncates) the export file, creating parent directories.
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self {
            writer: csv::Writer::from_path(path)?,
        })
    }

    pub fn write(&mut self, record: &ProductRecord) -> Result<()> {
        self.writer.serialize(ExportRow::from_record(record))?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Writes all records to a fresh export file.
pub fn write_export(path: &Path, records: &[ProductRecord]) -> Result<()> {
    let mut writer = ExportWriter::create(path)?;
    for record in records {
        writer.write(record)?;
    }
    writer.finish()
}

/// Records read back from an export, plus the lines that yielded none.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportContents {
    pub records: Vec<ProductRecord>,
    pub rejected: Vec<ExportRowError>,
}

/// Reads an export file in file order.
///
/// Only an unreadable file or a missing column aborts the read. A line
/// without a code or with the wrong shape is rejected and reading goes on.
pub fn read_export(path: &Path, max_price_segments: usize) -> Result<ExportContents> {
    if !path.exists() {
        return Err(CatalogError::MissingInput(path.to_path_buf()));
    }
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let missing: Vec<String> = EXPORT_COLUMNS
        .iter()
        .filter(|column| !headers.iter().any(|header| header.trim() == **column))
        .map(|column| column.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(CatalogError::ExportMismatch { missing });
    }

    let mut contents = ExportContents::default();
    for (index, result) in reader.records().enumerate() {
        let fallback_line = index + FIRST_RECORD_LINE;
        let row = match result {
            Ok(row) => row,
            Err(error) if error.is_io_error() => return Err(error.into()),
            Err(error) => {
                let line = error
                    .position()
                    .map_or(fallback_line, |position| position.line() as usize);
                warn!(line, %error, "skipping malformed export line");
                contents.rejected.push(ExportRowError::Malformed {
                    line,
                    reason: error.to_string(),
                });
                continue;
            }
        };

        let line = row
            .position()
            .map_or(fallback_line, |position| position.line() as usize);
        let parsed = row
            .deserialize::<ExportRow>(Some(&headers))
            .map_err(|error| ExportRowError::Malformed {
                line,
                reason: error.to_string(),
            })
            .and_then(|row| {
                row.into_record(line, max_price_segments)
                    .map_err(ExportRowError::from)
            });
        match parsed {
            Ok(record) => contents.records.push(record),
            Err(error) => {
                warn!(%error, "export line rejected");
                contents.rejected.push(error);
            }
        }
    }
    Ok(contents)
}
