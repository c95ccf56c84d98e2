//! SQLite-backed product store.
//!
//! Products live in one table keyed by `code`; discovered assets live in a
//! second table keyed by the same code. Every mutating call runs in its own
//! `BEGIN IMMEDIATE` transaction, so a failed write leaves earlier products
//! committed and this one untouched.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params};
use serde::Serialize;
use tracing::debug;

use crate::shopbot::catalog::error::{CatalogError, Result};
use crate::shopbot::catalog::model::{Assets, Price, Product, ProductCode, ProductDetails};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS products (
    code TEXT PRIMARY KEY NOT NULL CHECK (length(trim(code)) > 0),
    name TEXT NOT NULL,
    category_path TEXT NOT NULL,
    size TEXT,
    parts_count INTEGER,
    color TEXT,
    material TEXT,
    thickness TEXT,
    price TEXT NOT NULL,                -- JSON array of whole amounts
    missing_from_source INTEGER NOT NULL DEFAULT 0,
    uploaded INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    last_synced_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_products_category ON products(category_path);

CREATE TABLE IF NOT EXISTS product_assets (
    code TEXT PRIMARY KEY NOT NULL REFERENCES products(code) ON DELETE CASCADE,
    images TEXT NOT NULL,               -- JSON array of file names
    description TEXT,
    scanned_at TEXT NOT NULL
);
"#;

const SELECT_PRODUCTS: &str = r#"
SELECT p.code, p.name, p.category_path, p.size, p.parts_count, p.color, p.material,
       p.thickness, p.price, p.missing_from_source, p.uploaded, p.created_at,
       p.last_synced_at, a.images, a.description
FROM products p
LEFT JOIN product_assets a ON a.code = p.code
"#;

/// Which products a listing returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListFilter {
    #[default]
    All,
    /// Products still in the source that have images and a description.
    Publishable,
}

/// Aggregate counts over the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub total_products: u64,
    pub missing_from_source: u64,
    pub with_images: u64,
    pub with_description: u64,
    pub uploaded: u64,
    pub categories: u64,
}

/// Handle to the persistent product store.
pub struct ProductStore {
    pub(crate) conn: Connection,
    writes: u64,
}

impl ProductStore {
    /// Opens (creating when needed) a store file and ensures the schema.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        debug!(path = %path.display(), "opening product store");
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn, writes: 0 })
    }

    /// Number of transactions committed through this handle.
    pub fn write_count(&self) -> u64 {
        self.writes
    }

    pub fn get(&self, code: &str) -> Result<Option<Product>> {
        let sql = format!("{SELECT_PRODUCTS} WHERE p.code = ?1");
        let stored = self
            .conn
            .query_row(&sql, params![code], StoredProduct::from_row)
            .optional()?;
        stored.map(StoredProduct::into_product).transpose()
    }

    /// Lists products ordered by category path, then name, then code.
    pub fn list(&self, filter: ListFilter) -> Result<Vec<Product>> {
        let sql = format!("{SELECT_PRODUCTS} ORDER BY p.category_path, p.name, p.code");
        let mut stmt = self.conn.prepare(&sql)?;
        let stored = stmt
            .query_map([], StoredProduct::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut products = Vec::with_capacity(stored.len());
        for row in stored {
            let product = row.into_product()?;
            if filter == ListFilter::Publishable && !product.is_publishable() {
                continue;
            }
            products.push(product);
        }
        Ok(products)
    }

    /// Every stored product keyed by code.
    pub fn snapshot(&self) -> Result<BTreeMap<ProductCode, Product>> {
        Ok(self
            .list(ListFilter::All)?
            .into_iter()
            .map(|product| (product.code.clone(), product))
            .collect())
    }

    pub fn codes(&self) -> Result<BTreeSet<ProductCode>> {
        let mut stmt = self.conn.prepare("SELECT code FROM products")?;
        let codes = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<BTreeSet<_>>>()?;
        Ok(codes)
    }

    /// Inserts a product seen for the first time.
    pub fn insert(&mut self, code: &str, details: &ProductDetails, now: DateTime<Utc>) -> Result<()> {
        let price = serde_json::to_string(&details.price)?;
        let stamp = timestamp(now);
        self.write(|tx| {
            tx.execute(
                "INSERT INTO products (code, name, category_path, size, parts_count, color, \
                 material, thickness, price, missing_from_source, uploaded, created_at, \
                 last_synced_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, 0, ?10, ?10)",
                params![
                    code,
                    details.name,
                    details.category_path,
                    details.size,
                    details.parts_count,
                    details.color,
                    details.material,
                    details.thickness,
                    price,
                    stamp,
                ],
            )?;
            Ok(1)
        })?;
        Ok(())
    }

    /// Rewrites the spreadsheet-sourced fields of an existing product and
    /// clears its missing flag. Assets are left alone.
    pub fn update(&mut self, code: &str, details: &ProductDetails, now: DateTime<Utc>) -> Result<()> {
        let price = serde_json::to_string(&details.price)?;
        let stamp = timestamp(now);
        self.write(|tx| {
            let changed = tx.execute(
                "UPDATE products SET name = ?2, category_path = ?3, size = ?4, parts_count = ?5, \
                 color = ?6, material = ?7, thickness = ?8, price = ?9, \
                 missing_from_source = 0, last_synced_at = ?10 WHERE code = ?1",
                params![
                    code,
                    details.name,
                    details.category_path,
                    details.size,
                    details.parts_count,
                    details.color,
                    details.material,
                    details.thickness,
                    price,
                    stamp,
                ],
            )?;
            expect_one_row(changed)
        })?;
        Ok(())
    }

    /// Marks a product as absent from the latest import. Nothing is deleted.
    pub fn flag_missing(&mut self, code: &str) -> Result<()> {
        self.write(|tx| {
            let changed = tx.execute(
                "UPDATE products SET missing_from_source = 1 WHERE code = ?1",
                params![code],
            )?;
            expect_one_row(changed)
        })?;
        Ok(())
    }

    /// Replaces the asset set of an existing product.
    pub fn replace_assets(&mut self, code: &str, assets: &Assets, now: DateTime<Utc>) -> Result<()> {
        let images = serde_json::to_string(&assets.images)?;
        let stamp = timestamp(now);
        self.write(|tx| {
            tx.execute(
                "INSERT INTO product_assets (code, images, description, scanned_at) \
                 VALUES (?1, ?2, ?3, ?4) \
                 ON CONFLICT(code) DO UPDATE SET images = excluded.images, \
                 description = excluded.description, scanned_at = excluded.scanned_at",
                params![code, images, assets.description, stamp],
            )?;
            Ok(1)
        })?;
        Ok(())
    }

    /// Records that the publisher has pushed the product to the shop.
    /// Returns `false` when no such product exists.
    pub fn mark_uploaded(&mut self, code: &str) -> Result<bool> {
        let changed = self.write(|tx| {
            Ok(tx.execute(
                "UPDATE products SET uploaded = 1 WHERE code = ?1",
                params![code],
            )?)
        })?;
        Ok(changed > 0)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let count = |sql: &str| -> Result<u64> {
            let value: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
            Ok(value.max(0) as u64)
        };
        Ok(StoreStats {
            total_products: count("SELECT COUNT(*) FROM products")?,
            missing_from_source: count(
                "SELECT COUNT(*) FROM products WHERE missing_from_source = 1",
            )?,
            with_images: count("SELECT COUNT(*) FROM product_assets WHERE images != '[]'")?,
            with_description: count(
                "SELECT COUNT(*) FROM product_assets WHERE description IS NOT NULL",
            )?,
            uploaded: count("SELECT COUNT(*) FROM products WHERE uploaded = 1")?,
            categories: count(
                "SELECT COUNT(DISTINCT category_path) FROM products WHERE category_path != ''",
            )?,
        })
    }

    /// Runs `apply` in its own immediate transaction. `apply` returns the
    /// number of rows it changed; a transaction that changed nothing is not
    /// counted as a write.
    fn write<F>(&mut self, apply: F) -> Result<usize>
    where
        F: FnOnce(&Transaction<'_>) -> Result<usize>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let changed = apply(&tx)?;
        tx.commit()?;
        if changed > 0 {
            self.writes += 1;
        }
        Ok(changed)
    }
}

fn expect_one_row(changed: usize) -> Result<usize> {
    if changed == 1 {
        Ok(changed)
    } else {
        Err(CatalogError::Store(rusqlite::Error::QueryReturnedNoRows))
    }
}

fn timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}

struct StoredProduct {
    code: String,
    name: String,
    category_path: String,
    size: Option<String>,
    parts_count: Option<u32>,
    color: Option<String>,
    material: Option<String>,
    thickness: Option<String>,
    price: String,
    missing_from_source: bool,
    uploaded: bool,
    created_at: String,
    last_synced_at: String,
    images: Option<String>,
    description: Option<String>,
}

impl StoredProduct {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            code: row.get(0)?,
            name: row.get(1)?,
            category_path: row.get(2)?,
            size: row.get(3)?,
            parts_count: row.get(4)?,
            color: row.get(5)?,
            material: row.get(6)?,
            thickness: row.get(7)?,
            price: row.get(8)?,
            missing_from_source: row.get(9)?,
            uploaded: row.get(10)?,
            created_at: row.get(11)?,
            last_synced_at: row.get(12)?,
            images: row.get(13)?,
            description: row.get(14)?,
        })
    }

    fn into_product(self) -> Result<Product> {
        let price: Price = serde_json::from_str(&self.price)?;
        let images: Vec<String> = match self.images {
            Some(images) => serde_json::from_str(&images)?,
            None => Vec::new(),
        };
        Ok(Product {
            code: self.code,
            details: ProductDetails {
                name: self.name,
                category_path: self.category_path,
                size: self.size,
                parts_count: self.parts_count,
                color: self.color,
                material: self.material,
                thickness: self.thickness,
                price,
            },
            assets: Assets {
                images,
                description: self.description,
            },
            missing_from_source: self.missing_from_source,
            uploaded: self.uploaded,
            created_at: parse_timestamp(&self.created_at)?,
            last_synced_at: parse_timestamp(&self.last_synced_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shopbot::catalog::price::parse_price;
    use chrono::TimeZone;

    fn details(name: &str, category: &str, price: &str) -> ProductDetails {
        ProductDetails {
            name: name.into(),
            category_path: category.into(),
            size: Some("50 x 50".into()),
            parts_count: Some(2),
            color: None,
            material: Some("HDF".into()),
            thickness: Some("3mm".into()),
            price: parse_price(price).expect("price parsed"),
        }
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).single().expect("valid time")
    }

    #[test]
    fn inserted_product_reads_back() {
        let mut store = ProductStore::open_in_memory().expect("store opened");
        let fields = details("Földgömb", "Falitérkép", "13.990 ; 8990");
        store.insert("SKU001", &fields, at(8)).expect("insert");

        let product = store.get("SKU001").expect("query").expect("product present");
        assert_eq!(product.details, fields);
        assert_eq!(product.assets, Assets::default());
        assert!(!product.missing_from_source);
        assert_eq!(product.created_at, at(8));
        assert_eq!(product.last_synced_at, at(8));
        assert_eq!(store.write_count(), 1);
        assert!(store.get("SKU404").expect("query").is_none());
    }

    #[test]
    fn duplicate_insert_fails_and_leaves_original() {
        let mut store = ProductStore::open_in_memory().expect("store opened");
        store
            .insert("SKU001", &details("A", "", "100"), at(8))
            .expect("insert");
        let result = store.insert("SKU001", &details("B", "", "200"), at(9));
        assert!(matches!(result, Err(CatalogError::Store(_))));

        let product = store.get("SKU001").expect("query").expect("product present");
        assert_eq!(product.details.name, "A");
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn update_preserves_assets_and_clears_missing_flag() {
        let mut store = ProductStore::open_in_memory().expect("store opened");
        store
            .insert("SKU001", &details("A", "", "100"), at(8))
            .expect("insert");
        let assets = Assets {
            images: vec!["image1.jpg".into()],
            description: Some("Leírás".into()),
        };
        store.replace_assets("SKU001", &assets, at(9)).expect("assets");
        store.flag_missing("SKU001").expect("flag");

        store
            .update("SKU001", &details("B", "Bútor", "200"), at(10))
            .expect("update");
        let product = store.get("SKU001").expect("query").expect("product present");
        assert_eq!(product.details.name, "B");
        assert_eq!(product.assets, assets);
        assert!(!product.missing_from_source);
        assert_eq!(product.created_at, at(8));
        assert_eq!(product.last_synced_at, at(10));
    }

    #[test]
    fn update_of_unknown_code_fails() {
        let mut store = ProductStore::open_in_memory().expect("store opened");
        assert!(store.update("SKU404", &details("A", "", "1"), at(8)).is_err());
        assert!(store.flag_missing("SKU404").is_err());
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn marking_unknown_code_uploaded_is_not_a_write() {
        let mut store = ProductStore::open_in_memory().expect("store opened");
        store
            .insert("SKU001", &details("A", "", "100"), at(8))
            .expect("insert");
        assert!(!store.mark_uploaded("SKU404").expect("mark"));
        assert_eq!(store.write_count(), 1);

        assert!(store.mark_uploaded("SKU001").expect("mark"));
        assert_eq!(store.write_count(), 2);
        assert!(store.get("SKU001").expect("query").expect("present").uploaded);
    }

    #[test]
    fn assets_require_an_existing_product() {
        let mut store = ProductStore::open_in_memory().expect("store opened");
        let result = store.replace_assets("SKU404", &Assets::default(), at(8));
        assert!(matches!(result, Err(CatalogError::Store(_))));
    }

    #[test]
    fn publishable_listing_and_stats() {
        let mut store = ProductStore::open_in_memory().expect("store opened");
        store
            .insert("SKU002", &details("Béka", "Bútor", "100"), at(8))
            .expect("insert");
        store
            .insert("SKU001", &details("Asztal", "Játék", "100"), at(8))
            .expect("insert");
        store
            .insert("SKU003", &details("Cica", "Játék", "100"), at(8))
            .expect("insert");
        let complete = Assets {
            images: vec!["a.jpg".into()],
            description: Some("Szöveg".into()),
        };
        store.replace_assets("SKU002", &complete, at(9)).expect("assets");
        store.replace_assets("SKU001", &complete, at(9)).expect("assets");
        store.flag_missing("SKU001").expect("flag");
        assert!(store.mark_uploaded("SKU003").expect("mark"));
        assert!(!store.mark_uploaded("SKU404").expect("mark"));

        let all: Vec<String> = store
            .list(ListFilter::All)
            .expect("list")
            .into_iter()
            .map(|product| product.code)
            .collect();
        assert_eq!(all, vec!["SKU002", "SKU001", "SKU003"]);

        let publishable = store.list(ListFilter::Publishable).expect("list");
        assert_eq!(publishable.len(), 1);
        assert_eq!(publishable[0].code, "SKU002");

        let stats = store.stats().expect("stats");
        assert_eq!(
            stats,
            StoreStats {
                total_products: 3,
                missing_from_source: 1,
                with_images: 2,
                with_description: 2,
                uploaded: 1,
                categories: 2,
            }
        );
    }
}
