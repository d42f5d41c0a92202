//! Left join of per-source observations onto the yield table.

use std::collections::{HashMap, HashSet};

use granary_traits::types::normalize_name;
use granary_traits::{
    DroughtObservation, EconomicObservation, GranaryError, MergedRecord, Period, RecordKey, Result,
    WeatherObservation,
};
use tracing::{debug, info};

use crate::coverage::MergeCoverage;
use crate::quality::DataQuality;
use crate::sources::Sources;

/// Placeholder shown for an unscoped key part in duplicate-key errors.
const WILDCARD: &str = "*";

/// Merge output: one record per yield observation plus the advisory
/// coverage and input-quality summaries.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeResult {
    /// Merged records, in yield-table order.
    pub records: Vec<MergedRecord>,
    /// Advisory coverage summary.
    pub coverage: MergeCoverage,
    /// Advisory per-source quality summary.
    pub quality: DataQuality,
}

/// Joins source observations into one denormalized record set.
///
/// Join precedence is yield ← weather ← drought ← economic. Every yield
/// observation yields exactly one [`MergedRecord`]; fields from sources with no
/// matching row stay `None`. Weather and drought rows without a commodity apply
/// to every commodity of their region, economic rows without a region apply to
/// every region. A row scoped to the exact key always wins over such a
/// wildcard row.
///
/// # Example
///
/// ```
/// use granary_merge::{DataMerger, Sources};
/// use granary_traits::YieldObservation;
///
/// let sources = Sources::new(
///     vec![YieldObservation {
///         region: "Iowa ".into(),
///         period: 2012,
///         commodity: "corn".into(),
///         yield_value: 105.0,
///     }],
///     vec![],
///     vec![],
///     None,
/// );
/// let merged = DataMerger::new().merge(&sources).unwrap();
/// assert_eq!(merged.records[0].key.region, "IOWA");
/// assert!(merged.records[0].mean_temperature.is_none());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct DataMerger;

impl DataMerger {
    /// Creates a merger.
    pub const fn new() -> Self {
        Self
    }

    /// Merge the sources.
    ///
    /// # Errors
    ///
    /// - [`GranaryError::DuplicateKey`] when a source repeats a normalized key.
    /// - [`GranaryError::InvalidData`] for a non-finite yield or a name that
    ///   normalizes to the empty string.
    pub fn merge(&self, sources: &Sources) -> Result<MergeResult> {
        let quality = DataQuality::assess(sources);
        quality.log();

        let weather = ScopedIndex::build("weather", &sources.weather, |w| {
            (Some(w.region.as_str()), w.period, w.commodity.as_deref())
        })?;
        let drought = ScopedIndex::build("drought", &sources.drought, |d| {
            (Some(d.region.as_str()), d.period, d.commodity.as_deref())
        })?;
        let economic = sources
            .economic
            .as_deref()
            .map(|rows| {
                ScopedIndex::build("economic", rows, |e| {
                    (e.region.as_deref(), e.period, Some(e.commodity.as_str()))
                })
            })
            .transpose()?;

        let mut seen = HashSet::with_capacity(sources.yields.len());
        let mut records = Vec::with_capacity(sources.yields.len());
        for obs in &sources.yields {
            let key = RecordKey::new(&obs.region, obs.period, &obs.commodity);
            check_names("yield", &key.region, Some(&key.commodity))?;
            if !obs.yield_value.is_finite() {
                return Err(GranaryError::InvalidData(format!(
                    "yield: non-finite yield_value for {key}"
                )));
            }
            if !seen.insert(key.clone()) {
                return Err(duplicate("yield", &key.region, key.period, &key.commodity));
            }

            let w: Option<&WeatherObservation> = weather.lookup(&key);
            let d: Option<&DroughtObservation> = drought.lookup(&key);
            let e: Option<&EconomicObservation> =
                economic.as_ref().and_then(|idx| idx.lookup(&key));

            records.push(MergedRecord {
                yield_value: obs.yield_value,
                mean_temperature: w.and_then(|w| w.mean_temperature),
                total_precipitation: w.and_then(|w| w.total_precipitation),
                drought_severity_index: d.and_then(|d| d.drought_severity_index),
                economic_delta: e.and_then(|e| e.economic_delta),
                key,
            });
        }

        let coverage = MergeCoverage::from_records(
            &records,
            sources.dropped_yield_rows,
            sources.has_economic(),
        );
        info!(
            yields = sources.yields.len(),
            weather = sources.weather.len(),
            drought = sources.drought.len(),
            economic = sources.economic.as_ref().map(Vec::len),
            "merged sources"
        );
        coverage.log();

        Ok(MergeResult {
            records,
            coverage,
            quality,
        })
    }
}

/// `(region, period, commodity)` with `None` meaning "any".
type ScopedKey = (Option<String>, Period, Option<String>);

/// Source rows indexed by their normalized, possibly wildcarded key.
struct ScopedIndex<'a, T> {
    rows: HashMap<ScopedKey, &'a T>,
}

impl<'a, T> ScopedIndex<'a, T> {
    fn build(
        source: &str,
        rows: &'a [T],
        key: impl Fn(&'a T) -> (Option<&'a str>, Period, Option<&'a str>),
    ) -> Result<Self> {
        let mut index = HashMap::with_capacity(rows.len());
        for row in rows {
            let (region, period, commodity) = key(row);
            let region = region.map(normalize_name);
            let commodity = commodity.map(normalize_name);
            check_names(source, region.as_deref().unwrap_or(WILDCARD), commodity.as_deref())?;

            let scoped = (region, period, commodity);
            if index.contains_key(&scoped) {
                let (region, period, commodity) = scoped;
                return Err(duplicate(
                    source,
                    region.as_deref().unwrap_or(WILDCARD),
                    period,
                    commodity.as_deref().unwrap_or(WILDCARD),
                ));
            }
            index.insert(scoped, row);
        }
        debug!(source, rows = index.len(), "indexed source");
        Ok(Self { rows: index })
    }

    /// Most specific row for a record key.
    fn lookup(&self, key: &RecordKey) -> Option<&'a T> {
        let region = Some(key.region.clone());
        let commodity = Some(key.commodity.clone());
        [
            (region.clone(), key.period, commodity.clone()),
            (region, key.period, None),
            (None, key.period, commodity),
        ]
        .into_iter()
        .find_map(|k| self.rows.get(&k).copied())
    }
}

fn check_names(source: &str, region: &str, commodity: Option<&str>) -> Result<()> {
    if region.is_empty() || commodity.is_some_and(str::is_empty) {
        return Err(GranaryError::InvalidData(format!(
            "{source}: region and commodity names must not be blank"
        )));
    }
    Ok(())
}

fn duplicate(source: &str, region: &str, period: Period, commodity: &str) -> GranaryError {
    GranaryError::DuplicateKey {
        table: source.to_string(),
        region: region.to_string(),
        period,
        commodity: commodity.to_string(),
    }
}
