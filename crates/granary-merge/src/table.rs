//! Tabular source ingestion.
//!
//! Collectors deliver their output as polars `DataFrame`s. [`SourceTable`]
//! checks the schema of one such frame and converts its rows into the typed
//! observations consumed by [`crate::DataMerger`].

use std::fmt;

use granary_traits::{
    DroughtObservation, EconomicObservation, GranaryError, Period, Result, WeatherObservation,
    YieldObservation,
};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// The observation source a table comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Crop yields (left side of the join).
    Yield,
    /// Growing-season weather.
    Weather,
    /// Drought monitor DSCI.
    Drought,
    /// Ending-stocks economics.
    Economic,
    /// One row per merged record carrying every measurement column.
    Wide,
}

impl SourceKind {
    /// Stable lower-case name, used in errors and logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Yield => "yield",
            Self::Weather => "weather",
            Self::Drought => "drought",
            Self::Economic => "economic",
            Self::Wide => "wide",
        }
    }

    /// Columns that must be present.
    pub const fn required_columns(&self) -> &'static [&'static str] {
        match self {
            Self::Yield | Self::Wide => &["region", "period", "commodity", "yield_value"],
            Self::Weather => &["region", "period", "mean_temperature", "total_precipitation"],
            Self::Drought => &["region", "period", "drought_severity_index"],
            Self::Economic => &["period", "commodity", "economic_delta"],
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Yield rows extracted from a table, with the count of rows skipped for a
/// null or non-finite yield.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct YieldRows {
    /// Usable observations.
    pub observations: Vec<YieldObservation>,
    /// Rows dropped because `yield_value` was missing.
    pub dropped: usize,
}

/// A schema-checked source `DataFrame`.
///
/// # Example
///
/// ```
/// use granary_merge::{SourceKind, SourceTable};
/// use polars::prelude::*;
///
/// let df = df! {
///     "region" => &["Iowa", "Iowa"],
///     "period" => &[2011, 2012],
///     "commodity" => &["CORN", "CORN"],
///     "yield_value" => &[Some(150.0), None],
/// }
/// .unwrap();
///
/// let table = SourceTable::new(SourceKind::Yield, df).unwrap();
/// let rows = table.yield_observations().unwrap();
/// assert_eq!(rows.observations.len(), 1);
/// assert_eq!(rows.dropped, 1);
/// ```
#[derive(Debug, Clone)]
pub struct SourceTable {
    kind: SourceKind,
    data: DataFrame,
}

impl SourceTable {
    /// Wrap a frame after checking its required columns.
    ///
    /// # Errors
    ///
    /// Returns [`GranaryError::MissingColumn`] naming the first absent column.
    pub fn new(kind: SourceKind, data: DataFrame) -> Result<Self> {
        let table = Self { kind, data };
        for col in kind.required_columns() {
            if !table.has_column(col) {
                return Err(GranaryError::MissingColumn(format!("{kind}.{col}")));
            }
        }
        Ok(table)
    }

    /// Source kind.
    pub const fn kind(&self) -> SourceKind {
        self.kind
    }

    /// Underlying frame.
    pub const fn data(&self) -> &DataFrame {
        &self.data
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.data.height()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.data.height() == 0
    }

    /// Checks if a column exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.data
            .get_column_names()
            .iter()
            .any(|s| s.as_str() == name)
    }

    /// Convert rows to yield observations, skipping rows with a null yield.
    ///
    /// # Errors
    ///
    /// Fails when a key column holds a null or cannot be cast.
    pub fn yield_observations(&self) -> Result<YieldRows> {
        let regions = self.strings("region")?;
        let periods = self.periods("period")?;
        let commodities = self.strings("commodity")?;
        let yields = self.floats("yield_value")?;

        let mut rows = YieldRows::default();
        for (i, value) in yields.into_iter().enumerate() {
            let region = self.required(i, "region", regions[i].clone())?;
            let period = self.required(i, "period", periods[i])?;
            let commodity = self.required(i, "commodity", commodities[i].clone())?;
            match value.filter(|v| v.is_finite()) {
                Some(yield_value) => rows.observations.push(YieldObservation {
                    region,
                    period,
                    commodity,
                    yield_value,
                }),
                None => {
                    debug!(row = i, %region, period, %commodity, "dropping row with null yield");
                    rows.dropped += 1;
                }
            }
        }
        if rows.dropped > 0 {
            warn!(
                source = %self.kind,
                dropped = rows.dropped,
                "rows without a yield value were skipped"
            );
        }
        Ok(rows)
    }

    /// Convert rows to weather observations.
    ///
    /// A missing `commodity` column, or a null cell in it, marks a
    /// region-wide row.
    ///
    /// # Errors
    ///
    /// Fails when a key column holds a null or cannot be cast.
    pub fn weather_observations(&self) -> Result<Vec<WeatherObservation>> {
        let regions = self.strings("region")?;
        let periods = self.periods("period")?;
        let commodities = self.optional_strings("commodity")?;
        let temperatures = self.floats("mean_temperature")?;
        let precipitation = self.floats("total_precipitation")?;

        (0..self.len())
            .map(|i| {
                Ok(WeatherObservation {
                    region: self.required(i, "region", regions[i].clone())?,
                    period: self.required(i, "period", periods[i])?,
                    commodity: commodities[i].clone(),
                    mean_temperature: temperatures[i],
                    total_precipitation: precipitation[i],
                })
            })
            .collect()
    }

    /// Convert rows to drought observations.
    ///
    /// # Errors
    ///
    /// Fails when a key column holds a null or cannot be cast.
    pub fn drought_observations(&self) -> Result<Vec<DroughtObservation>> {
        let regions = self.strings("region")?;
        let periods = self.periods("period")?;
        let commodities = self.optional_strings("commodity")?;
        let dsci = self.floats("drought_severity_index")?;

        (0..self.len())
            .map(|i| {
                Ok(DroughtObservation {
                    region: self.required(i, "region", regions[i].clone())?,
                    period: self.required(i, "period", periods[i])?,
                    commodity: commodities[i].clone(),
                    drought_severity_index: dsci[i],
                })
            })
            .collect()
    }

    /// Convert rows to economic observations.
    ///
    /// A missing `region` column, or a null cell in it, marks a national row.
    ///
    /// # Errors
    ///
    /// Fails when a key column holds a null or cannot be cast.
    pub fn economic_observations(&self) -> Result<Vec<EconomicObservation>> {
        let regions = self.optional_strings("region")?;
        let periods = self.periods("period")?;
        let commodities = self.strings("commodity")?;
        let deltas = self.floats("economic_delta")?;

        (0..self.len())
            .map(|i| {
                Ok(EconomicObservation {
                    region: regions[i].clone(),
                    period: self.required(i, "period", periods[i])?,
                    commodity: self.required(i, "commodity", commodities[i].clone())?,
                    economic_delta: deltas[i],
                })
            })
            .collect()
    }

    /// Float column, or all-null when the column is absent.
    pub(crate) fn optional_floats(&self, name: &str) -> Result<Vec<Option<f64>>> {
        if self.has_column(name) {
            self.floats(name)
        } else {
            Ok(vec![None; self.len()])
        }
    }

    fn strings(&self, name: &str) -> Result<Vec<Option<String>>> {
        let col = self.data.column(name)?.cast(&DataType::String)?;
        Ok(col
            .as_materialized_series()
            .str()?
            .into_iter()
            .map(|s: Option<&str>| s.map(str::to_string))
            .collect())
    }

    fn optional_strings(&self, name: &str) -> Result<Vec<Option<String>>> {
        if !self.has_column(name) {
            return Ok(vec![None; self.len()]);
        }
        // Blank cells count as unscoped, like nulls.
        Ok(self
            .strings(name)?
            .into_iter()
            .map(|s| s.filter(|s| !s.trim().is_empty()))
            .collect())
    }

    fn floats(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let col = self.data.column(name)?.cast(&DataType::Float64)?;
        Ok(col
            .as_materialized_series()
            .f64()?
            .into_iter()
            .map(|v: Option<f64>| v.filter(|x| !x.is_nan()))
            .collect())
    }

    fn periods(&self, name: &str) -> Result<Vec<Option<Period>>> {
        let col = self.data.column(name)?.cast(&DataType::Int64)?;
        col.as_materialized_series()
            .i64()?
            .into_iter()
            .map(|v: Option<i64>| {
                v.map(|p| {
                    Period::try_from(p).map_err(|_| {
                        GranaryError::InvalidData(format!(
                            "{}: period {p} is out of range",
                            self.kind
                        ))
                    })
                })
                .transpose()
            })
            .collect()
    }

    fn required<T>(&self, row: usize, column: &str, value: Option<T>) -> Result<T> {
        value.ok_or_else(|| {
            GranaryError::InvalidData(format!("{}: row {row} has a null {column}", self.kind))
        })
    }
}
