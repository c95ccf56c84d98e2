//! Core library for the shopbot-catalog command line application.
//!
//! The library reconciles a vendor spreadsheet of products, an intermediate CSV
//! export, a SQLite product store and a tree of per-product asset folders. The
//! modules keep responsibilities narrow and composable: spreadsheet and export
//! adapters live under [`shopbot::catalog::io`], record types inside
//! [`shopbot::catalog::model`], the per-row pure transformations in
//! [`shopbot::catalog::normalize`], [`shopbot::catalog::price`],
//! [`shopbot::catalog::category`] and [`shopbot::catalog::convert`], the
//! store-facing passes in [`shopbot::catalog::reconcile`] and
//! [`shopbot::catalog::scan`], and the end-to-end orchestration under
//! [`shopbot::catalog::sync`].

pub mod shopbot;

pub use shopbot::catalog::{
    CatalogError, Result, category, config, convert, error, io, model, normalize, price,
    reconcile, sample, scan, store, sync,
};
