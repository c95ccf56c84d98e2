//! Reconciliation of normalized records against the product store.
//!
//! ## What this does
//! - Computes a **plan**: every code is classified as new, changed, unchanged,
//!   held back (bad price) or missing from the input.
//! - Applies the plan one product at a time. Each write is its own
//!   transaction; a failing product is reported and the batch moves on.
//!
//! ## Idempotence
//! Unchanged products and products already flagged missing cause no write, so
//! applying the same input twice writes nothing the second time.
//!
//! ## Missing products
//! Codes absent from the input are flagged, never deleted.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::shopbot::catalog::error::{ExportRowError, PriceParseError, Result, StoreWriteError};
use crate::shopbot::catalog::model::{Product, ProductCode, ProductDetails, ProductRecord};
use crate::shopbot::catalog::store::ProductStore;

/// What the synchronizer intends to do with one code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedChange {
    Insert(ProductDetails),
    Update(ProductDetails),
    Unchanged,
    HeldBack(PriceParseError),
    Missing { already_flagged: bool },
}

impl PlannedChange {
    fn is_write(&self) -> bool {
        matches!(
            self,
            PlannedChange::Insert(_)
                | PlannedChange::Update(_)
                | PlannedChange::Missing {
                    already_flagged: false
                }
        )
    }
}

/// Per-code changes, ordered by code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub changes: BTreeMap<ProductCode, PlannedChange>,
}

/// Final state of one code after reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Inserted,
    Updated,
    Unchanged,
    /// Present in the store but not in the input; flagged, not deleted.
    Missing,
    /// The record's price did not parse, so the product was not written.
    HeldBack(PriceParseError),
    Failed(StoreWriteError),
}

/// Counts of each outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub missing: usize,
    pub held_back: usize,
    pub failed: usize,
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "inserted {}, updated {}, unchanged {}, missing {}, held back {}, failed {}",
            self.inserted, self.updated, self.unchanged, self.missing, self.held_back, self.failed
        )
    }
}

/// Per-code outcomes of a reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub outcomes: BTreeMap<ProductCode, SyncOutcome>,
    /// Input lines that produced no record and so took no part in the run.
    pub rejected: Vec<ExportRowError>,
    writes: usize,
}

impl SyncReport {
    pub fn summary(&self) -> SyncSummary {
        let mut summary = SyncSummary::default();
        for outcome in self.outcomes.values() {
            match outcome {
                SyncOutcome::Inserted => summary.inserted += 1,
                SyncOutcome::Updated => summary.updated += 1,
                SyncOutcome::Unchanged => summary.unchanged += 1,
                SyncOutcome::Missing => summary.missing += 1,
                SyncOutcome::HeldBack(_) => summary.held_back += 1,
                SyncOutcome::Failed(_) => summary.failed += 1,
            }
        }
        summary
    }

    /// Number of store transactions committed (or, for a preview, planned).
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn failures(&self) -> impl Iterator<Item = &StoreWriteError> {
        self.outcomes.values().filter_map(|outcome| match outcome {
            SyncOutcome::Failed(error) => Some(error),
            _ => None,
        })
    }

    pub fn held_back(&self) -> impl Iterator<Item = (&ProductCode, &PriceParseError)> {
        self.outcomes.iter().filter_map(|(code, outcome)| match outcome {
            SyncOutcome::HeldBack(error) => Some((code, error)),
            _ => None,
        })
    }
}

/// Classifies every input record and every stored product. Pure; the store is
/// only consulted through the snapshot.
///
/// When a code appears more than once in the input the last record wins.
pub fn plan<I>(current: &BTreeMap<ProductCode, Product>, records: I) -> SyncPlan
where
    I: IntoIterator<Item = ProductRecord>,
{
    let mut latest: BTreeMap<ProductCode, ProductRecord> = BTreeMap::new();
    for record in records {
        if let Some(previous) = latest.insert(record.code.clone(), record) {
            warn!(code = %previous.code, "duplicate product code in input, keeping the last row");
        }
    }

    let mut changes = BTreeMap::new();
    for (code, record) in &latest {
        let change = match (record.details(), current.get(code)) {
            (Err(error), _) => PlannedChange::HeldBack(error),
            (Ok(details), None) => PlannedChange::Insert(details),
            (Ok(details), Some(stored))
                if stored.details == details && !stored.missing_from_source =>
            {
                PlannedChange::Unchanged
            }
            (Ok(details), Some(_)) => PlannedChange::Update(details),
        };
        changes.insert(code.clone(), change);
    }

    for (code, stored) in current {
        if !latest.contains_key(code) {
            changes.insert(
                code.clone(),
                PlannedChange::Missing {
                    already_flagged: stored.missing_from_source,
                },
            );
        }
    }

    SyncPlan { changes }
}

impl SyncPlan {
    /// The report applying this plan would produce if every write succeeded.
    pub fn preview(&self) -> SyncReport {
        let outcomes = self
            .changes
            .iter()
            .map(|(code, change)| (code.clone(), expected_outcome(change)))
            .collect();
        SyncReport {
            outcomes,
            rejected: Vec::new(),
            writes: self.changes.values().filter(|change| change.is_write()).count(),
        }
    }
}

fn expected_outcome(change: &PlannedChange) -> SyncOutcome {
    match change {
        PlannedChange::Insert(_) => SyncOutcome::Inserted,
        PlannedChange::Update(_) => SyncOutcome::Updated,
        PlannedChange::Unchanged => SyncOutcome::Unchanged,
        PlannedChange::HeldBack(error) => SyncOutcome::HeldBack(error.clone()),
        PlannedChange::Missing { .. } => SyncOutcome::Missing,
    }
}

/// Applies a plan, one transaction per written product.
pub fn apply(store: &mut ProductStore, plan: SyncPlan, now: DateTime<Utc>) -> SyncReport {
    let mut report = SyncReport::default();

    for (code, change) in plan.changes {
        let expected = expected_outcome(&change);
        let result = match &change {
            PlannedChange::Insert(details) => store.insert(&code, details, now).map(|_| true),
            PlannedChange::Update(details) => store.update(&code, details, now).map(|_| true),
            PlannedChange::Missing {
                already_flagged: false,
            } => store.flag_missing(&code).map(|_| true),
            PlannedChange::Unchanged
            | PlannedChange::HeldBack(_)
            | PlannedChange::Missing {
                already_flagged: true,
            } => Ok(false),
        };

        let outcome = match result {
            Ok(wrote) => {
                if wrote {
                    report.writes += 1;
                }
                debug!(code = %code, outcome = ?expected, "product reconciled");
                expected
            }
            Err(error) => {
                warn!(code = %code, %error, "product write failed");
                SyncOutcome::Failed(StoreWriteError::new(code.clone(), &error))
            }
        };
        report.outcomes.insert(code, outcome);
    }

    report
}

/// Plans against the current store contents and applies the result.
///
/// Only reading the store snapshot can fail the whole call; individual write
/// failures are reported per code.
#[instrument(level = "info", skip_all)]
pub fn reconcile<I>(store: &mut ProductStore, records: I, now: DateTime<Utc>) -> Result<SyncReport>
where
    I: IntoIterator<Item = ProductRecord>,
{
    let current = store.snapshot()?;
    let plan = plan(&current, records);
    let report = apply(store, plan, now);
    info!(summary = %report.summary(), writes = report.writes(), "reconciliation finished");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shopbot::catalog::model::{Assets, PriceField};
    use crate::shopbot::catalog::price::parse_price;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).single().expect("valid time")
    }

    fn record(code: &str, name: &str, raw: &str) -> ProductRecord {
        let price = match parse_price(raw) {
            Ok(price) => PriceField::Parsed(price),
            Err(error) => PriceField::Invalid(error),
        };
        ProductRecord {
            code: code.into(),
            name: name.into(),
            category_path: "Bútor/Szék".into(),
            size: None,
            parts_count: Some(4),
            color: Some("Tölgy".into()),
            material: None,
            thickness: None,
            price,
            price_raw: raw.to_string(),
        }
    }

    #[test]
    fn first_run_inserts_and_second_run_writes_nothing() {
        let mut store = ProductStore::open_in_memory().expect("store opened");
        let input = vec![
            record("SKU001", "Szék", "13.990 ; 8990"),
            record("SKU002", "Asztal", "45.000"),
        ];

        let first = reconcile(&mut store, input.clone(), at(8)).expect("first run");
        assert_eq!(first.summary().inserted, 2);
        assert_eq!(first.writes(), 2);

        let writes_before = store.write_count();
        let second = reconcile(&mut store, input, at(9)).expect("second run");
        assert_eq!(second.summary().unchanged, 2);
        assert_eq!(second.writes(), 0);
        assert_eq!(store.write_count(), writes_before);

        let product = store.get("SKU001").expect("query").expect("present");
        assert_eq!(product.last_synced_at, at(8));
    }

    #[test]
    fn changed_fields_update_in_place_and_keep_assets() {
        let mut store = ProductStore::open_in_memory().expect("store opened");
        reconcile(&mut store, vec![record("SKU001", "Szék", "100")], at(8)).expect("first run");
        let assets = Assets {
            images: vec!["image1.jpg".into()],
            description: Some("Kényelmes".into()),
        };
        store.replace_assets("SKU001", &assets, at(8)).expect("assets");

        let report = reconcile(&mut store, vec![record("SKU001", "Szék", "90")], at(9))
            .expect("second run");
        assert_eq!(report.outcomes.get("SKU001"), Some(&SyncOutcome::Updated));

        let product = store.get("SKU001").expect("query").expect("present");
        assert_eq!(product.details.price.amounts(), &[90]);
        assert_eq!(product.assets, assets);
        assert_eq!(product.last_synced_at, at(9));
    }

    #[test]
    fn absent_codes_are_flagged_once_and_revived_on_return() {
        let mut store = ProductStore::open_in_memory().expect("store opened");
        reconcile(
            &mut store,
            vec![record("SKU001", "Szék", "100"), record("SKU002", "Asztal", "200")],
            at(8),
        )
        .expect("first run");

        let report = reconcile(&mut store, vec![record("SKU001", "Szék", "100")], at(9))
            .expect("second run");
        assert_eq!(report.outcomes.get("SKU002"), Some(&SyncOutcome::Missing));
        assert_eq!(report.writes(), 1);
        let flagged = store.get("SKU002").expect("query").expect("not deleted");
        assert!(flagged.missing_from_source);

        let repeat = reconcile(&mut store, vec![record("SKU001", "Szék", "100")], at(10))
            .expect("third run");
        assert_eq!(repeat.summary().missing, 1);
        assert_eq!(repeat.writes(), 0);

        let revived = reconcile(
            &mut store,
            vec![record("SKU001", "Szék", "100"), record("SKU002", "Asztal", "200")],
            at(11),
        )
        .expect("fourth run");
        assert_eq!(revived.outcomes.get("SKU002"), Some(&SyncOutcome::Updated));
        let product = store.get("SKU002").expect("query").expect("present");
        assert!(!product.missing_from_source);
    }

    #[test]
    fn bad_price_is_held_back_without_writing() {
        let mut store = ProductStore::open_in_memory().expect("store opened");
        reconcile(&mut store, vec![record("SKU001", "Szék", "100")], at(8)).expect("first run");

        let report = reconcile(
            &mut store,
            vec![record("SKU001", "Szék", "13.99"), record("SKU003", "Polc", "")],
            at(9),
        )
        .expect("second run");

        assert!(matches!(
            report.outcomes.get("SKU001"),
            Some(SyncOutcome::HeldBack(PriceParseError::NonNumeric { .. }))
        ));
        assert_eq!(
            report.outcomes.get("SKU003"),
            Some(&SyncOutcome::HeldBack(PriceParseError::Empty))
        );
        assert_eq!(report.writes(), 0);

        let product = store.get("SKU001").expect("query").expect("present");
        assert_eq!(product.details.price.amounts(), &[100]);
        assert!(!product.missing_from_source);
        assert!(store.get("SKU003").expect("query").is_none());
    }

    #[test]
    fn duplicate_codes_keep_the_last_row() {
        let mut store = ProductStore::open_in_memory().expect("store opened");
        let report = reconcile(
            &mut store,
            vec![record("SKU001", "Régi", "100"), record("SKU001", "Új", "120")],
            at(8),
        )
        .expect("run");

        assert_eq!(report.outcomes.len(), 1);
        let product = store.get("SKU001").expect("query").expect("present");
        assert_eq!(product.details.name, "Új");
    }

    #[test]
    fn failed_write_is_reported_and_batch_continues() {
        let mut store = ProductStore::open_in_memory().expect("store opened");
        store
            .conn
            .execute_batch(
                "CREATE TRIGGER reject_sku002 BEFORE INSERT ON products \
                 WHEN NEW.code = 'SKU002' BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .expect("trigger created");

        let report = reconcile(
            &mut store,
            vec![
                record("SKU001", "Szék", "100"),
                record("SKU002", "Asztal", "200"),
                record("SKU003", "Polc", "300"),
            ],
            at(8),
        )
        .expect("run");

        let summary = report.summary();
        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.failed, 1);
        let failure = report.failures().next().expect("one failure");
        assert_eq!(failure.code, "SKU002");
        assert!(store.get("SKU002").expect("query").is_none());
        assert!(store.get("SKU003").expect("query").is_some());
    }

    #[test]
    fn preview_matches_applied_outcomes() {
        let mut store = ProductStore::open_in_memory().expect("store opened");
        reconcile(&mut store, vec![record("SKU001", "Szék", "100")], at(8)).expect("first run");

        let input = vec![record("SKU001", "Szék", "110"), record("SKU002", "Asztal", "200")];
        let current = store.snapshot().expect("snapshot");
        let planned = plan(&current, input);
        let preview = planned.preview();
        assert_eq!(store.write_count(), 1);

        let applied = apply(&mut store, planned, at(9));
        assert_eq!(preview, applied);
    }
}
