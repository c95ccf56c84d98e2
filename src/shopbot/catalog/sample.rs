//! Generates a small vendor-style data set for trying the pipeline end to end.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::shopbot::catalog::error::Result;
use crate::shopbot::catalog::io::excel_write::write_source_workbook;
use crate::shopbot::catalog::model::{CellValue, Field};

/// A 1×1 transparent PNG used as the sample product image.
const PLACEHOLDER_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
    0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
    0x42, 0x60, 0x82,
];

struct SampleProduct {
    code: &'static str,
    name: &'static str,
    categories: [&'static str; 3],
    size: &'static str,
    parts: i64,
}

const PRODUCTS: &[SampleProduct] = &[
    SampleProduct {
        code: "Földgömb1",
        name: "Földgömb puzzle 1",
        categories: ["Falitérkép", "", ""],
        size: "50 x 50 ; 32 x 32",
        parts: 2,
    },
    SampleProduct {
        code: "Térkép",
        name: "Világtérkép puzzle",
        categories: ["Falitérkép", "", ""],
        size: "126 x 60 ; 82 x 40",
        parts: 3,
    },
    SampleProduct {
        code: "Mandala1",
        name: "Mandala design 1",
        categories: ["Mandalák", "", ""],
        size: "126 x 60 ; 82 x 40",
        parts: 3,
    },
    SampleProduct {
        code: "Virág1",
        name: "Virág minta 1",
        categories: ["Természet", "Virágok", ""],
        size: "107 x 60 ; 70 x 40",
        parts: 3,
    },
    SampleProduct {
        code: "Egyetem1",
        name: "Egyetem logo 1",
        categories: ["Természet", "Univerzum", ""],
        size: "38 x 38 ; 25 x 25",
        parts: 1,
    },
];

/// Paths produced by [`write_sample_data`].
#[derive(Debug, Clone)]
pub struct SampleData {
    pub spreadsheet: PathBuf,
    pub assets: PathBuf,
    pub products: usize,
}

/// Writes `products.xlsx` and a `products/` asset tree under `dir`.
pub fn write_sample_data(dir: &Path) -> Result<SampleData> {
    let assets = dir.join("products");
    fs::create_dir_all(&assets)?;

    let headers: Vec<&str> = Field::ALL
        .into_iter()
        .map(Field::source_header)
        .collect();

    let mut rows = Vec::with_capacity(PRODUCTS.len());
    for product in PRODUCTS {
        let folder = assets.join(product.code);
        fs::create_dir_all(&folder)?;
        fs::write(folder.join("image1.png"), PLACEHOLDER_PNG)?;
        fs::write(folder.join("description.txt"), description(product))?;

        rows.push(
            Field::ALL
                .into_iter()
                .map(|field| sample_cell(product, field))
                .collect(),
        );
    }

    let spreadsheet = dir.join("products.xlsx");
    write_source_workbook(&spreadsheet, &headers, &rows)?;
    info!(
        spreadsheet = %spreadsheet.display(),
        products = PRODUCTS.len(),
        "sample data written"
    );

    Ok(SampleData {
        spreadsheet,
        assets,
        products: PRODUCTS.len(),
    })
}

fn sample_cell(product: &SampleProduct, field: Field) -> CellValue {
    let text = |value: &str| {
        if value.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(value.to_string())
        }
    };
    match field {
        Field::Code => text(product.code),
        Field::Name => text(product.name),
        Field::Category1 => text(product.categories[0]),
        Field::Category2 => text(product.categories[1]),
        Field::Category3 => text(product.categories[2]),
        Field::Size => text(product.size),
        Field::PartsCount => CellValue::Int(product.parts),
        Field::Color => text("Fekete"),
        Field::Material => text("HDF"),
        Field::Thickness => text("3mm"),
        Field::PriceRaw => text("13.990 ; 8990"),
    }
}

fn description(product: &SampleProduct) -> String {
    format!(
        "Termék: {name}\n\
         Kód: {code}\n\
         Méret: {size}\n\
         Anyag: HDF, 3mm\n\n\
         Kiváló minőségű lézervágott dekoráció. A csomag {parts} darab elemet tartalmaz.\n",
        name = product.name,
        code = product.code,
        size = product.size,
        parts = product.parts,
    )
}
