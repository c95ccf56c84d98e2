pub mod category;
pub mod config;
pub mod convert;
pub mod error;
pub mod io;
pub mod model;
pub mod normalize;
pub mod price;
pub mod reconcile;
pub mod sample;
pub mod scan;
pub mod store;
pub mod sync;

pub use error::{CatalogError, Result};
