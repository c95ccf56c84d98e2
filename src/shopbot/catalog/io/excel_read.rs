use std::path::Path;

use calamine::{DataType, Reader, Xlsx, open_workbook};

use crate::shopbot::catalog::error::{CatalogError, Result};
use crate::shopbot::catalog::io::sheet::SourceSheet;
use crate::shopbot::catalog::model::CellValue;

/// Reads the first worksheet of an `.xlsx` workbook. The first used row is
/// taken as the header row; leading blank rows are skipped.
pub fn read_first_sheet(path: &Path) -> Result<SourceSheet> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| CatalogError::InvalidWorkbook("workbook has no worksheets".into()))?
        .map_err(CatalogError::from)?;

    let header_row = range.start().map_or(1, |(row, _)| row as usize + 1);
    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(first_row) => first_row
            .iter()
            .map(|cell| cell_to_value(cell).as_text().unwrap_or_default())
            .collect(),
        None => {
            return Err(CatalogError::InvalidWorkbook(
                "first worksheet has no header row".into(),
            ));
        }
    };

    let rows = rows
        .map(|row| row.iter().map(cell_to_value).collect())
        .collect();

    Ok(SourceSheet {
        header_row,
        headers,
        rows,
    })
}

fn cell_to_value(cell: &DataType) -> CellValue {
    match cell {
        DataType::String(value) => CellValue::Text(value.clone()),
        DataType::Float(value) => CellValue::Float(*value),
        DataType::Int(value) => CellValue::Int(*value),
        DataType::Bool(value) => CellValue::Bool(*value),
        DataType::Empty => CellValue::Empty,
        other => CellValue::Text(other.to_string()),
    }
}
