//! Advisory merge-coverage summary.

use std::collections::BTreeSet;

use granary_traits::MergedRecord;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Coverage below this fraction is logged as a warning.
pub const LOW_COVERAGE: f64 = 0.9;

/// Fraction of yield records populated by each optional source.
///
/// Never blocks downstream stages; it exists for diagnostics only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeCoverage {
    /// Records in the merge output.
    pub records: usize,
    /// Input yield rows skipped for a missing yield.
    pub dropped_yield_rows: usize,
    /// Distinct regions.
    pub regions: usize,
    /// Distinct commodities.
    pub commodities: usize,
    /// Fraction with any weather field present.
    pub weather: f64,
    /// Fraction with a drought index present.
    pub drought: f64,
    /// Fraction with an economic delta present; `None` when the economic
    /// source was not supplied.
    pub economic: Option<f64>,
}

impl MergeCoverage {
    /// Summarize merged records.
    pub fn from_records(
        records: &[MergedRecord],
        dropped_yield_rows: usize,
        economic_supplied: bool,
    ) -> Self {
        let fraction = |populated: fn(&MergedRecord) -> bool| {
            if records.is_empty() {
                return 0.0;
            }
            records.iter().filter(|r| populated(r)).count() as f64 / records.len() as f64
        };

        Self {
            records: records.len(),
            dropped_yield_rows,
            regions: records
                .iter()
                .map(|r| r.key.region.as_str())
                .collect::<BTreeSet<_>>()
                .len(),
            commodities: records
                .iter()
                .map(|r| r.key.commodity.as_str())
                .collect::<BTreeSet<_>>()
                .len(),
            weather: fraction(|r| r.mean_temperature.is_some() || r.total_precipitation.is_some()),
            drought: fraction(|r| r.drought_severity_index.is_some()),
            economic: economic_supplied.then(|| fraction(|r| r.economic_delta.is_some())),
        }
    }

    /// Emit the summary as tracing events.
    pub fn log(&self) {
        info!(
            records = self.records,
            regions = self.regions,
            commodities = self.commodities,
            dropped = self.dropped_yield_rows,
            weather = self.weather,
            drought = self.drought,
            economic = ?self.economic,
            "merge coverage"
        );

        if self.records == 0 {
            warn!("merge produced no records");
            return;
        }
        for (source, value) in self.fractions() {
            if value < LOW_COVERAGE {
                warn!(source, coverage = value, "low merge coverage");
            }
        }
    }

    /// `(source, fraction)` pairs for every supplied optional source.
    pub fn fractions(&self) -> Vec<(&'static str, f64)> {
        let mut out = vec![("weather", self.weather), ("drought", self.drought)];
        if let Some(economic) = self.economic {
            out.push(("economic", economic));
        }
        out
    }
}
