use std::path::Path;

use rust_xlsxwriter::Workbook;

use crate::shopbot::catalog::error::Result;
use crate::shopbot::catalog::model::CellValue;

/// Name of the single sheet written by [`write_source_workbook`].
pub const SOURCE_SHEET: &str = "Termékek";

/// Writes a vendor-style workbook: one sheet, a header row, then the rows.
pub fn write_source_workbook(path: &Path, headers: &[&str], rows: &[Vec<CellValue>]) -> Result<()> {
    let mut workbook_writer = Workbook::new();
    let worksheet = workbook_writer.add_worksheet();
    worksheet.set_name(SOURCE_SHEET)?;

    for (col_idx, header) in headers.iter().enumerate() {
        worksheet.write_string(0, col_idx as u16, *header)?;
    }

    for (row_idx, row) in rows.iter().enumerate() {
        let sheet_row = (row_idx + 1) as u32;
        for (col_idx, cell) in row.iter().enumerate() {
            let sheet_col = col_idx as u16;
            match cell {
                CellValue::Empty => {}
                CellValue::Text(value) => {
                    worksheet.write_string(sheet_row, sheet_col, value)?;
                }
                CellValue::Int(value) => {
                    worksheet.write_number(sheet_row, sheet_col, *value as f64)?;
                }
                CellValue::Float(value) => {
                    worksheet.write_number(sheet_row, sheet_col, *value)?;
                }
                CellValue::Bool(value) => {
                    worksheet.write_boolean(sheet_row, sheet_col, *value)?;
                }
            }
        }
    }

    workbook_writer.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shopbot::catalog::io::excel_read::read_first_sheet;
    use tempfile::tempdir;

    #[test]
    fn written_workbook_reads_back_as_source_sheet() {
        let dir = tempdir().expect("temporary directory");
        let path = dir.path().join("products.xlsx");
        let rows = vec![vec![
            CellValue::Text("SKU001".into()),
            CellValue::Float(2.0),
            CellValue::Empty,
            CellValue::Text("13.990 ; 8990".into()),
        ]];

        write_source_workbook(&path, &["Termék kód", "Részek száma", "Szín", "Ár"], &rows)
            .expect("workbook written");
        let sheet = read_first_sheet(&path).expect("workbook read");

        assert_eq!(sheet.headers, vec!["Termék kód", "Részek száma", "Szín", "Ár"]);
        assert_eq!(sheet.rows.len(), 1);
        assert_eq!(sheet.rows[0][0], CellValue::Text("SKU001".into()));
        assert_eq!(sheet.rows[0][1].as_text().as_deref(), Some("2"));
        assert!(sheet.rows[0][2].is_empty());
        assert_eq!(sheet.rows[0][3], CellValue::Text("13.990 ; 8990".into()));
    }
}
