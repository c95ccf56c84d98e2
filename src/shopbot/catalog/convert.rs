//! Row-by-row conversion of the vendor spreadsheet into normalized records.
//!
//! The conversion is pure: it never touches the store. Callers stream the
//! produced records into the intermediate export (see
//! [`export`](crate::io::export)) so the synchronization step can be re-run
//! without the original spreadsheet.

use tracing::warn;

use crate::shopbot::catalog::category::build_category_path;
use crate::shopbot::catalog::config::ImportConfig;
use crate::shopbot::catalog::error::{MissingIdentityError, PriceParseError};
use crate::shopbot::catalog::model::{PriceField, ProductCode, ProductRecord, RawRow, SourceRecord};
use crate::shopbot::catalog::normalize::normalize_row;
use crate::shopbot::catalog::price::parse_price_with_limit;

/// Spreadsheet row number of the first data row when the header is row 1.
pub const FIRST_DATA_ROW: usize = 2;

/// Lazily converts raw rows into records, one item per non-blank row.
pub struct Converter<'a, I> {
    rows: I,
    config: &'a ImportConfig,
    next_row: usize,
}

/// Wraps the raw rows of a sheet, in sheet order, into a [`Converter`].
pub fn convert_rows<I>(rows: I, config: &ImportConfig) -> Converter<'_, I::IntoIter>
where
    I: IntoIterator<Item = RawRow>,
{
    Converter {
        rows: rows.into_iter(),
        config,
        next_row: FIRST_DATA_ROW,
    }
}

impl<I> Converter<'_, I> {
    /// Numbers rows from `first_data_row` instead of [`FIRST_DATA_ROW`], for
    /// sheets whose header is not on the first row.
    pub fn starting_at(mut self, first_data_row: usize) -> Self {
        self.next_row = first_data_row;
        self
    }
}

impl<I> Iterator for Converter<'_, I>
where
    I: Iterator<Item = RawRow>,
{
    type Item = Result<ProductRecord, MissingIdentityError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let raw = self.rows.next()?;
            let row = self.next_row;
            self.next_row += 1;

            if raw.values().all(|cell| cell.is_empty()) {
                continue;
            }
            return Some(convert_record(normalize_row(&raw), row, self.config));
        }
    }
}

/// Builds a record from a normalized row. The price is parsed here but a bad
/// price does not drop the record; it travels as [`PriceField::Invalid`].
pub fn convert_record(
    source: SourceRecord,
    row: usize,
    config: &ImportConfig,
) -> Result<ProductRecord, MissingIdentityError> {
    let Some(code) = source.code else {
        warn!(row, "skipping row without product code");
        return Err(MissingIdentityError { row });
    };

    let raw_price = source.price_raw.unwrap_or_default();
    let price = match parse_price_with_limit(&raw_price, config.max_price_segments) {
        Ok(price) => PriceField::Parsed(price),
        Err(error) => {
            warn!(row, code = %code, raw = %raw_price, %error, "price could not be parsed");
            PriceField::Invalid(error)
        }
    };

    let category_path = build_category_path(
        [
            source.category1.as_deref(),
            source.category2.as_deref(),
            source.category3.as_deref(),
        ],
        &config.category_separator,
    );

    Ok(ProductRecord {
        code,
        name: source.name.unwrap_or_default(),
        category_path,
        size: source.size,
        parts_count: source.parts_count,
        color: source.color,
        material: source.material,
        thickness: source.thickness,
        price,
        price_raw: raw_price,
    })
}

/// A record whose price could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceIssue {
    pub code: ProductCode,
    pub raw: String,
    pub error: PriceParseError,
}

/// Summary of a spreadsheet conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionReport {
    /// Records written to the export, price issues included.
    pub exported: usize,
    /// Rows dropped for lacking a product code.
    pub missing_identity: Vec<MissingIdentityError>,
    /// Exported records that will be held back by the synchronizer.
    pub price_issues: Vec<PriceIssue>,
}

impl ConversionReport {
    /// Accounts for one converter item and hands back the record to export.
    pub fn track(
        &mut self,
        item: Result<ProductRecord, MissingIdentityError>,
    ) -> Option<ProductRecord> {
        match item {
            Ok(record) => {
                if let PriceField::Invalid(error) = &record.price {
                    self.price_issues.push(PriceIssue {
                        code: record.code.clone(),
                        raw: record.price_raw.clone(),
                        error: error.clone(),
                    });
                }
                self.exported += 1;
                Some(record)
            }
            Err(error) => {
                self.missing_identity.push(error);
                None
            }
        }
    }
}
