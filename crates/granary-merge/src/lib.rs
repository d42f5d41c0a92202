//! Multi-source merge for the Granary stock risk index.
//!
//! This crate joins crop yield, weather, drought and (optionally) economic
//! observations into one denormalized record per `(region, period, commodity)`.
//! The join is a left join driven by the yield table: names are case- and
//! whitespace-normalized, unmatched fields stay null, and a key repeated inside
//! a source is an error rather than something to aggregate.
//!
//! # Examples
//!
//! ```rust,no_run
//! use granary_merge::{DataMerger, SourceKind, SourceTable, Sources};
//! use polars::prelude::*;
//!
//! let df = df! {
//!     "region" => &["IOWA"],
//!     "period" => &[2012],
//!     "commodity" => &["CORN"],
//!     "yield_value" => &[105.0],
//!     "drought_severity_index" => &[420.0],
//! }
//! .unwrap();
//!
//! let table = SourceTable::new(SourceKind::Wide, df).unwrap();
//! let sources = Sources::from_wide(&table).unwrap();
//! let merged = DataMerger::new().merge(&sources).unwrap();
//! assert_eq!(merged.records.len(), 1);
//! ```

mod coverage;
mod merger;
mod quality;
mod sources;
mod table;

pub use coverage::{LOW_COVERAGE, MergeCoverage};
pub use merger::{DataMerger, MergeResult};
pub use quality::{
    DSCI_RANGE, DataQuality, NULL_ERROR_FRACTION, NULL_WARNING_FRACTION, PLAUSIBLE_YIELD,
    QualityIssue, Severity, SourceQuality,
};
pub use sources::Sources;
pub use table::{SourceKind, SourceTable, YieldRows};
