use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Error type covering the failures that abort a whole pass. Problems confined
/// to a single row or record are reported through [`PriceParseError`],
/// [`MissingIdentityError`], [`ExportRowError`] and [`StoreWriteError`] instead.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when JSON parsing or serialization fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Raised when the intermediate CSV export cannot be read or written.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Errors bubbled up from the SQLite product store.
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// Raised when a stored timestamp cannot be read back.
    #[error("invalid timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Errors bubbled up from the Excel reader implementation.
    #[error("Excel read error: {0}")]
    ExcelRead(#[from] calamine::XlsxError),

    /// Raised when headers the conversion cannot do without are absent.
    #[error("spreadsheet is missing required headers: {}", missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },

    /// Raised when a sheet does not follow the expected conventions.
    #[error("invalid workbook structure: {0}")]
    InvalidWorkbook(String),

    /// Raised when the intermediate export lacks columns the synchronizer reads.
    #[error("export is missing columns: {}", missing.join(", "))]
    ExportMismatch { missing: Vec<String> },

    /// Raised when the configuration file holds unusable values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Raised when the user provides a path that does not exist.
    #[error("input not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}

/// Raised when a price cell cannot be turned into a list of amounts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceParseError {
    #[error("price is empty")]
    Empty,

    #[error("price segment '{segment}' is not a whole amount")]
    NonNumeric { segment: String },

    #[error("price has {count} segments, at most {max} are accepted")]
    TooManySegments { count: usize, max: usize },
}

/// Raised for a spreadsheet row that carries no product code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("row {row} has no product code")]
pub struct MissingIdentityError {
    /// Row (or export line) number, counting the header row as 1.
    pub row: usize,
}

/// Raised for a line of the intermediate export that yields no record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExportRowError {
    #[error(transparent)]
    MissingIdentity(#[from] MissingIdentityError),

    #[error("export line {line} is malformed: {reason}")]
    Malformed { line: usize, reason: String },
}

/// Raised when the transactional write for a single product fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to write product {code}: {message}")]
pub struct StoreWriteError {
    pub code: String,
    pub message: String,
}

impl StoreWriteError {
    pub fn new(code: impl Into<String>, source: &CatalogError) -> Self {
        Self {
            code: code.into(),
            message: source.to_string(),
        }
    }
}
