use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shopbot::catalog::error::PriceParseError;

/// Product code, the identity key shared by the spreadsheet, the export, the
/// store and the asset folder names.
pub type ProductCode = String;

/// Canonical fields recognised in the vendor spreadsheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Code,
    Name,
    Category1,
    Category2,
    Category3,
    Size,
    PartsCount,
    Color,
    Material,
    Thickness,
    PriceRaw,
}

impl Field {
    pub const ALL: [Field; 11] = [
        Field::Code,
        Field::Name,
        Field::Category1,
        Field::Category2,
        Field::Category3,
        Field::Size,
        Field::PartsCount,
        Field::Color,
        Field::Material,
        Field::Thickness,
        Field::PriceRaw,
    ];

    /// Fields whose header must be present for a conversion to make sense.
    pub const REQUIRED: [Field; 2] = [Field::Code, Field::PriceRaw];

    pub fn canonical_name(self) -> &'static str {
        match self {
            Field::Code => "code",
            Field::Name => "name",
            Field::Category1 => "category1",
            Field::Category2 => "category2",
            Field::Category3 => "category3",
            Field::Size => "size",
            Field::PartsCount => "parts_count",
            Field::Color => "color",
            Field::Material => "material",
            Field::Thickness => "thickness",
            Field::PriceRaw => "price_raw",
        }
    }

    /// Header text used by the vendor spreadsheet.
    pub fn source_header(self) -> &'static str {
        match self {
            Field::Code => "Termék kód",
            Field::Name => "Terméknév",
            Field::Category1 => "Kategória",
            Field::Category2 => "Kategória 2",
            Field::Category3 => "Kategória 3",
            Field::Size => "Méret (cm)",
            Field::PartsCount => "Részek száma",
            Field::Color => "Szín",
            Field::Material => "Anyag",
            Field::Thickness => "Vastagság",
            Field::PriceRaw => "Ár",
        }
    }

    pub fn from_source_header(header: &str) -> Option<Field> {
        Field::ALL
            .into_iter()
            .find(|field| field.source_header() == header)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

/// A raw spreadsheet cell, independent of the file format it came from.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl CellValue {
    /// Renders the cell as trimmed text, `None` when nothing is left.
    ///
    /// Integral floats lose their fractional part so numeric codes such as
    /// `1001.0` come back as `1001`.
    pub fn as_text(&self) -> Option<String> {
        let text = match self {
            CellValue::Empty => return None,
            CellValue::Text(value) => value.trim().to_string(),
            CellValue::Int(value) => value.to_string(),
            CellValue::Float(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
                format!("{}", *value as i64)
            }
            CellValue::Float(value) => value.to_string(),
            CellValue::Bool(value) => value.to_string(),
        };
        if text.is_empty() { None } else { Some(text) }
    }

    pub fn is_empty(&self) -> bool {
        self.as_text().is_none()
    }
}

/// One spreadsheet row keyed by its (trimmed) header text.
pub type RawRow = BTreeMap<String, CellValue>;

/// A spreadsheet row after header mapping and cell coercion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceRecord {
    pub code: Option<String>,
    pub name: Option<String>,
    pub category1: Option<String>,
    pub category2: Option<String>,
    pub category3: Option<String>,
    pub size: Option<String>,
    pub parts_count: Option<u32>,
    pub color: Option<String>,
    pub material: Option<String>,
    pub thickness: Option<String>,
    pub price_raw: Option<String>,
}

/// Ordered list of whole amounts. The first is the regular price, any further
/// entries are alternate (typically discounted) prices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u64>", into = "Vec<u64>")]
pub struct Price {
    amounts: Vec<u64>,
}

impl Price {
    pub fn amounts(&self) -> &[u64] {
        &self.amounts
    }

    pub fn regular(&self) -> u64 {
        self.amounts[0]
    }

    pub fn alternates(&self) -> &[u64] {
        &self.amounts[1..]
    }
}

impl TryFrom<Vec<u64>> for Price {
    type Error = PriceParseError;

    fn try_from(amounts: Vec<u64>) -> Result<Self, Self::Error> {
        if amounts.is_empty() {
            return Err(PriceParseError::Empty);
        }
        Ok(Self { amounts })
    }
}

impl From<Price> for Vec<u64> {
    fn from(price: Price) -> Self {
        price.amounts
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, amount) in self.amounts.iter().enumerate() {
            if index > 0 {
                f.write_str(" ; ")?;
            }
            write!(f, "{amount}")?;
        }
        Ok(())
    }
}

/// Outcome of parsing the price cell of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceField {
    Parsed(Price),
    Invalid(PriceParseError),
}

/// A normalized product entry, as produced by the converter and stored in the
/// intermediate export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRecord {
    pub code: ProductCode,
    pub name: String,
    pub category_path: String,
    pub size: Option<String>,
    pub parts_count: Option<u32>,
    pub color: Option<String>,
    pub material: Option<String>,
    pub thickness: Option<String>,
    pub price: PriceField,
    /// Price cell exactly as the source spreadsheet had it.
    pub price_raw: String,
}

impl ProductRecord {
    /// The storable part of the record, or the price error that holds it back.
    pub fn details(&self) -> Result<ProductDetails, PriceParseError> {
        let price = match &self.price {
            PriceField::Parsed(price) => price.clone(),
            PriceField::Invalid(error) => return Err(error.clone()),
        };
        Ok(ProductDetails {
            name: self.name.clone(),
            category_path: self.category_path.clone(),
            size: self.size.clone(),
            parts_count: self.parts_count,
            color: self.color.clone(),
            material: self.material.clone(),
            thickness: self.thickness.clone(),
            price,
        })
    }
}

/// Spreadsheet-sourced attributes of a stored product. Two details values
/// compare equal exactly when a re-import would not change the product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductDetails {
    pub name: String,
    pub category_path: String,
    pub size: Option<String>,
    pub parts_count: Option<u32>,
    pub color: Option<String>,
    pub material: Option<String>,
    pub thickness: Option<String>,
    pub price: Price,
}

/// Files discovered in a product's asset folder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Assets {
    /// Image file names, sorted.
    pub images: Vec<String>,
    pub description: Option<String>,
}

impl Assets {
    pub fn is_empty(&self) -> bool {
        self.images.is_empty() && self.description.is_none()
    }
}

/// A product as held by the persistent store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    pub code: ProductCode,
    #[serde(flatten)]
    pub details: ProductDetails,
    pub assets: Assets,
    /// Set when the latest import no longer listed this code.
    pub missing_from_source: bool,
    /// Set by the publishing side once the product is live on the shop.
    pub uploaded: bool,
    pub created_at: DateTime<Utc>,
    pub last_synced_at: DateTime<Utc>,
}

impl Product {
    /// Whether the product is complete enough to hand to the publisher.
    pub fn is_publishable(&self) -> bool {
        !self.missing_from_source
            && !self.assets.images.is_empty()
            && self.assets.description.is_some()
    }
}
