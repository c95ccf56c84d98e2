use std::path::Path;

use tracing::debug;

use crate::shopbot::catalog::error::{CatalogError, Result};
use crate::shopbot::catalog::io::excel_read;
use crate::shopbot::catalog::model::{CellValue, RawRow};

/// The first worksheet of a vendor spreadsheet: trimmed headers plus the data
/// rows in sheet order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceSheet {
    /// Spreadsheet row number (1-based) the headers were found on.
    pub header_row: usize,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl SourceSheet {
    /// Spreadsheet row number of the first data row.
    pub fn first_data_row(&self) -> usize {
        self.header_row + 1
    }

    /// Turns each data row into a header → cell map. Cells under an empty
    /// header are dropped; short rows simply lack the trailing headers.
    pub fn into_raw_rows(self) -> impl Iterator<Item = RawRow> {
        let headers = self.headers;
        self.rows.into_iter().map(move |cells| {
            headers
                .iter()
                .zip(cells)
                .filter(|(header, _)| !header.is_empty())
                .map(|(header, cell)| (header.clone(), cell))
                .collect()
        })
    }
}

/// Reads a vendor spreadsheet, choosing the reader from the file extension.
pub fn read_sheet(path: &Path) -> Result<SourceSheet> {
    if !path.exists() {
        return Err(CatalogError::MissingInput(path.to_path_buf()));
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let sheet = match extension.as_str() {
        "xlsx" | "xlsm" => excel_read::read_first_sheet(path)?,
        "csv" => read_csv_sheet(path)?,
        other => {
            return Err(CatalogError::InvalidWorkbook(format!(
                "unsupported spreadsheet extension '{other}'"
            )));
        }
    };
    debug!(
        header_count = sheet.headers.len(),
        row_count = sheet.rows.len(),
        "spreadsheet loaded"
    );
    Ok(sheet)
}

fn read_csv_sheet(path: &Path) -> Result<SourceSheet> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let headers = reader
        .headers()?
        .iter()
        .map(|header| header.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(
            record
                .iter()
                .map(|value| {
                    if value.trim().is_empty() {
                        CellValue::Empty
                    } else {
                        CellValue::Text(value.to_string())
                    }
                })
                .collect(),
        );
    }

    Ok(SourceSheet {
        header_row: 1,
        headers,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn csv_source_is_read_with_trimmed_headers() {
        let dir = tempdir().expect("temporary directory");
        let path = dir.path().join("products.csv");
        fs::write(&path, "\u{feff}Termék kód , Ár\nSKU001,\"13.990 ; 8990\"\n,\n").expect("csv written");

        let sheet = read_sheet(&path).expect("sheet read");
        assert_eq!(sheet.headers, vec!["Termék kód", "Ár"]);
        assert_eq!(sheet.first_data_row(), 2);
        assert_eq!(sheet.rows.len(), 2);

        let rows: Vec<RawRow> = sheet.into_raw_rows().collect();
        assert_eq!(
            rows[0].get("Ár"),
            Some(&CellValue::Text("13.990 ; 8990".into()))
        );
        assert_eq!(rows[1].get("Termék kód"), Some(&CellValue::Empty));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let dir = tempdir().expect("temporary directory");
        let path = dir.path().join("products.ods");
        fs::write(&path, "").expect("file written");
        assert!(matches!(
            read_sheet(&path),
            Err(CatalogError::InvalidWorkbook(_))
        ));
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempdir().expect("temporary directory");
        assert!(matches!(
            read_sheet(&dir.path().join("absent.xlsx")),
            Err(CatalogError::MissingInput(_))
        ));
    }
}
