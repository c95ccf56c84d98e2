//! Reconciliation of per-product asset folders into the store.
//!
//! Every immediate subdirectory of the asset root is a candidate product code.
//! Matching products get their assets replaced by what the folder holds;
//! folders without a product are reported as orphans and never create one.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::shopbot::catalog::config::ImportConfig;
use crate::shopbot::catalog::error::{CatalogError, Result, StoreWriteError};
use crate::shopbot::catalog::model::{Assets, ProductCode};
use crate::shopbot::catalog::store::ProductStore;

/// An asset folder whose name matches no stored product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanAssetWarning {
    pub folder: String,
    pub path: PathBuf,
}

/// Outcome of one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Products whose stored assets were replaced.
    pub attached: Vec<ProductCode>,
    /// Products whose folder matched what was already stored.
    pub unchanged: Vec<ProductCode>,
    pub orphans: Vec<OrphanAssetWarning>,
    pub failed: Vec<StoreWriteError>,
    /// Folders that matched a product but could not be read, with the reason.
    pub unreadable: Vec<(ProductCode, String)>,
    /// Stored products that have no asset folder at all.
    pub without_folder: Vec<ProductCode>,
    pub images_found: usize,
    pub descriptions_found: usize,
}

/// Lists the assets held by one product folder.
pub fn read_folder_assets(folder: &Path, config: &ImportConfig) -> Result<Assets> {
    let mut images = Vec::new();
    let mut description = None;

    for entry in fs::read_dir(folder)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
            warn!(path = %entry.path().display(), "skipping file with non UTF-8 name");
            continue;
        };

        if file_name == config.description_file {
            description = Some(fs::read_to_string(entry.path())?);
        } else if config.is_image(&file_name) {
            images.push(file_name);
        }
    }

    images.sort();
    Ok(Assets {
        images,
        description,
    })
}

/// Walks `root` and reconciles every product folder into the store.
#[instrument(level = "info", skip_all, fields(root = %root.display()))]
pub fn scan_assets(
    store: &mut ProductStore,
    root: &Path,
    config: &ImportConfig,
    now: DateTime<Utc>,
) -> Result<ScanReport> {
    if !root.is_dir() {
        return Err(CatalogError::MissingInput(root.to_path_buf()));
    }

    let current = store.snapshot()?;
    let mut folders: Vec<(String, PathBuf)> = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => folders.push((name, entry.path())),
            Err(name) => warn!(folder = ?name, "skipping folder with non UTF-8 name"),
        }
    }
    folders.sort();

    let mut report = ScanReport::default();
    let mut seen: BTreeSet<ProductCode> = BTreeSet::new();

    for (folder, path) in folders {
        let Some(product) = current.get(&folder) else {
            warn!(folder = %folder, "asset folder has no matching product");
            report.orphans.push(OrphanAssetWarning { folder, path });
            continue;
        };
        seen.insert(folder.clone());

        let assets = match read_folder_assets(&path, config) {
            Ok(assets) => assets,
            Err(error) => {
                warn!(code = %folder, %error, "asset folder could not be read");
                report.unreadable.push((folder, error.to_string()));
                continue;
            }
        };
        report.images_found += assets.images.len();
        report.descriptions_found += usize::from(assets.description.is_some());

        if product.assets == assets {
            debug!(code = %folder, "assets unchanged");
            report.unchanged.push(folder);
            continue;
        }

        match store.replace_assets(&folder, &assets, now) {
            Ok(()) => {
                debug!(code = %folder, images = assets.images.len(), "assets attached");
                report.attached.push(folder);
            }
            Err(error) => {
                warn!(code = %folder, %error, "asset write failed");
                report.failed.push(StoreWriteError::new(folder, &error));
            }
        }
    }

    report.without_folder = current
        .keys()
        .filter(|code| !seen.contains(*code))
        .cloned()
        .collect();

    info!(
        attached = report.attached.len(),
        unchanged = report.unchanged.len(),
        orphans = report.orphans.len(),
        failed = report.failed.len(),
        unreadable = report.unreadable.len(),
        without_folder = report.without_folder.len(),
        "asset scan finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shopbot::catalog::model::ProductDetails;
    use crate::shopbot::catalog::price::parse_price;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).single().expect("valid time")
    }

    fn store_with(codes: &[&str]) -> ProductStore {
        let mut store = ProductStore::open_in_memory().expect("store opened");
        for code in codes {
            let details = ProductDetails {
                name: format!("Termék {code}"),
                category_path: String::new(),
                size: None,
                parts_count: None,
                color: None,
                material: None,
                thickness: None,
                price: parse_price("1000").expect("price parsed"),
            };
            store.insert(code, &details, at(8)).expect("insert");
        }
        store
    }

    #[test]
    fn folder_assets_filter_by_extension() {
        let dir = tempdir().expect("temporary directory");
        fs::write(dir.path().join("b.PNG"), b"png").expect("file written");
        fs::write(dir.path().join("a.jpg"), b"jpg").expect("file written");
        fs::write(dir.path().join("notes.pdf"), b"pdf").expect("file written");
        fs::write(dir.path().join("description.txt"), "Leírás").expect("file written");
        fs::create_dir(dir.path().join("nested.jpg")).expect("dir created");

        let assets = read_folder_assets(dir.path(), &ImportConfig::default()).expect("assets");
        assert_eq!(assets.images, vec!["a.jpg", "b.PNG"]);
        assert_eq!(assets.description.as_deref(), Some("Leírás"));
    }

    #[test]
    fn rescanning_an_unchanged_tree_writes_nothing() {
        let dir = tempdir().expect("temporary directory");
        let folder = dir.path().join("SKU001");
        fs::create_dir(&folder).expect("dir created");
        fs::write(folder.join("image1.jpg"), b"jpg").expect("file written");

        let mut store = store_with(&["SKU001"]);
        let config = ImportConfig::default();
        let first = scan_assets(&mut store, dir.path(), &config, at(9)).expect("first scan");
        assert_eq!(first.attached, vec!["SKU001"]);

        let writes = store.write_count();
        let second = scan_assets(&mut store, dir.path(), &config, at(10)).expect("second scan");
        assert_eq!(second.unchanged, vec!["SKU001"]);
        assert!(second.attached.is_empty());
        assert_eq!(store.write_count(), writes);
    }

    #[test]
    fn removed_description_is_cleared() {
        let dir = tempdir().expect("temporary directory");
        let folder = dir.path().join("SKU001");
        fs::create_dir(&folder).expect("dir created");
        fs::write(folder.join("description.txt"), "Régi").expect("file written");

        let mut store = store_with(&["SKU001"]);
        let config = ImportConfig::default();
        scan_assets(&mut store, dir.path(), &config, at(9)).expect("first scan");
        fs::remove_file(folder.join("description.txt")).expect("file removed");

        let report = scan_assets(&mut store, dir.path(), &config, at(10)).expect("second scan");
        assert_eq!(report.attached, vec!["SKU001"]);
        let product = store.get("SKU001").expect("query").expect("present");
        assert_eq!(product.assets.description, None);
    }

    #[test]
    fn orphans_and_folderless_products_are_reported() {
        let dir = tempdir().expect("temporary directory");
        fs::create_dir(dir.path().join("SKU999")).expect("dir created");
        fs::write(dir.path().join("SKU001"), b"not a folder").expect("file written");

        let mut store = store_with(&["SKU001"]);
        let report = scan_assets(&mut store, dir.path(), &ImportConfig::default(), at(9))
            .expect("scan");

        assert_eq!(report.orphans.len(), 1);
        assert_eq!(report.orphans[0].folder, "SKU999");
        assert_eq!(report.without_folder, vec!["SKU001"]);
        assert!(store.get("SKU999").expect("query").is_none());
        assert_eq!(store.codes().expect("codes").len(), 1);
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempdir().expect("temporary directory");
        let mut store = store_with(&[]);
        let result = scan_assets(
            &mut store,
            &dir.path().join("absent"),
            &ImportConfig::default(),
            at(9),
        );
        assert!(matches!(result, Err(CatalogError::MissingInput(_))));
    }
}
