use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use crate::shopbot::catalog::config::ImportConfig;
use crate::shopbot::catalog::convert::{ConversionReport, convert_rows};
use crate::shopbot::catalog::error::Result;
use crate::shopbot::catalog::io::export::{ExportWriter, read_export};
use crate::shopbot::catalog::io::sheet::read_sheet;
use crate::shopbot::catalog::normalize::check_headers;
use crate::shopbot::catalog::reconcile::{self, SyncReport};
use crate::shopbot::catalog::scan::{self, ScanReport};
use crate::shopbot::catalog::store::ProductStore;

/// Converts a vendor spreadsheet into the intermediate CSV export.
///
/// A missing required header aborts before anything is written; rows without
/// a product code are dropped and reported.
#[instrument(
    level = "info",
    skip_all,
    fields(input = %input.display(), export = %export.display())
)]
pub fn spreadsheet_to_export(
    input: &Path,
    export: &Path,
    config: &ImportConfig,
) -> Result<ConversionReport> {
    let sheet = read_sheet(input)?;
    check_headers(&sheet.headers)?;
    info!(row_count = sheet.rows.len(), "read rows from spreadsheet");

    let mut report = ConversionReport::default();
    let first_data_row = sheet.first_data_row();
    let mut writer = ExportWriter::create(export)?;
    for item in convert_rows(sheet.into_raw_rows(), config).starting_at(first_data_row) {
        if let Some(record) = report.track(item) {
            writer.write(&record)?;
        }
    }
    writer.finish()?;

    info!(
        exported = report.exported,
        missing_identity = report.missing_identity.len(),
        price_issues = report.price_issues.len(),
        "export written"
    );
    Ok(report)
}

/// Reconciles an export file into the store. With `dry_run` the plan is
/// computed and reported but nothing is written.
///
/// Export lines that yield no record are listed in the report's `rejected`
/// and do not stop the run.
#[instrument(
    level = "info",
    skip_all,
    fields(export = %export.display(), dry_run = dry_run)
)]
pub fn export_to_store(
    export: &Path,
    store: &mut ProductStore,
    config: &ImportConfig,
    now: DateTime<Utc>,
    dry_run: bool,
) -> Result<SyncReport> {
    let contents = read_export(export, config.max_price_segments)?;
    debug!(
        record_count = contents.records.len(),
        rejected = contents.rejected.len(),
        "export loaded"
    );

    let mut report = if dry_run {
        let current = store.snapshot()?;
        let preview = reconcile::plan(&current, contents.records).preview();
        info!(summary = %preview.summary(), "dry run, store left untouched");
        preview
    } else {
        reconcile::reconcile(store, contents.records, now)?
    };
    report.rejected = contents.rejected;
    Ok(report)
}

/// Reconciles the asset folder tree into the store.
#[instrument(level = "info", skip_all, fields(root = %root.display()))]
pub fn assets_to_store(
    root: &Path,
    store: &mut ProductStore,
    config: &ImportConfig,
    now: DateTime<Utc>,
) -> Result<ScanReport> {
    scan::scan_assets(store, root, config, now)
}

/// Locations used by a full import.
#[derive(Debug, Clone)]
pub struct ImportPaths {
    pub spreadsheet: PathBuf,
    pub export: PathBuf,
    /// Asset root; the scan is skipped when absent.
    pub assets: Option<PathBuf>,
}

/// Results of every stage of a full import.
#[derive(Debug, Clone)]
pub struct ImportReport {
    pub conversion: ConversionReport,
    pub sync: SyncReport,
    pub scan: Option<ScanReport>,
}

/// Spreadsheet → export → store, then the asset scan when a root is given.
#[instrument(level = "info", skip_all, fields(spreadsheet = %paths.spreadsheet.display()))]
pub fn import(
    paths: &ImportPaths,
    store: &mut ProductStore,
    config: &ImportConfig,
    now: DateTime<Utc>,
) -> Result<ImportReport> {
    let conversion = spreadsheet_to_export(&paths.spreadsheet, &paths.export, config)?;
    let sync = export_to_store(&paths.export, store, config, now, false)?;
    let scan = match &paths.assets {
        Some(root) => Some(assets_to_store(root, store, config, now)?),
        None => None,
    };
    Ok(ImportReport {
        conversion,
        sync,
        scan,
    })
}
