//! The set of typed observation tables handed to the merger.

use granary_traits::{
    DroughtObservation, EconomicObservation, GranaryError, Result, WeatherObservation,
    YieldObservation,
};

use crate::table::{SourceKind, SourceTable};

/// Typed observations per source.
///
/// `economic = None` means the economic source was not supplied at all, which
/// is different from an empty economic table only in the coverage summary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sources {
    /// Yield observations; every one of them produces a merged record.
    pub yields: Vec<YieldObservation>,
    /// Weather observations.
    pub weather: Vec<WeatherObservation>,
    /// Drought observations.
    pub drought: Vec<DroughtObservation>,
    /// Economic observations, if the source was supplied.
    pub economic: Option<Vec<EconomicObservation>>,
    /// Input rows skipped for a missing yield value.
    pub dropped_yield_rows: usize,
}

impl Sources {
    /// Sources from typed observations.
    pub fn new(
        yields: Vec<YieldObservation>,
        weather: Vec<WeatherObservation>,
        drought: Vec<DroughtObservation>,
        economic: Option<Vec<EconomicObservation>>,
    ) -> Self {
        Self {
            yields,
            weather,
            drought,
            economic,
            dropped_yield_rows: 0,
        }
    }

    /// Sources from one table per source.
    ///
    /// # Errors
    ///
    /// Fails when a table has the wrong kind or a malformed row.
    pub fn from_tables(
        yields: &SourceTable,
        weather: &SourceTable,
        drought: &SourceTable,
        economic: Option<&SourceTable>,
    ) -> Result<Self> {
        expect_kind(yields, SourceKind::Yield)?;
        expect_kind(weather, SourceKind::Weather)?;
        expect_kind(drought, SourceKind::Drought)?;
        if let Some(table) = economic {
            expect_kind(table, SourceKind::Economic)?;
        }

        let rows = yields.yield_observations()?;
        Ok(Self {
            yields: rows.observations,
            weather: weather.weather_observations()?,
            drought: drought.drought_observations()?,
            economic: economic.map(SourceTable::economic_observations).transpose()?,
            dropped_yield_rows: rows.dropped,
        })
    }

    /// Split a wide table (one row per record, every measurement a column)
    /// into per-source observations.
    ///
    /// Measurement columns other than `yield_value` are optional. A row only
    /// produces a weather, drought or economic observation when at least one
    /// of that source's fields is non-null, so a blank cell stays unmatched
    /// after the merge. The economic source counts as supplied when the frame
    /// has an `economic_delta` column.
    ///
    /// # Errors
    ///
    /// Fails when the table is not [`SourceKind::Wide`] or a row is malformed.
    pub fn from_wide(table: &SourceTable) -> Result<Self> {
        expect_kind(table, SourceKind::Wide)?;

        let rows = table.yield_observations()?;
        let temperatures = table.optional_floats("mean_temperature")?;
        let precipitation = table.optional_floats("total_precipitation")?;
        let dsci = table.optional_floats("drought_severity_index")?;
        let economic_supplied = table.has_column("economic_delta");
        let deltas = table.optional_floats("economic_delta")?;

        // Row indices in the frame include the dropped rows; re-read the keys
        // through the observations and align measurements by frame position.
        let kept: Vec<usize> = kept_row_indices(table)?;

        let mut sources = Self {
            dropped_yield_rows: rows.dropped,
            economic: economic_supplied.then(Vec::new),
            ..Self::default()
        };
        for (obs, &i) in rows.observations.into_iter().zip(&kept) {
            if temperatures[i].is_some() || precipitation[i].is_some() {
                sources.weather.push(WeatherObservation {
                    region: obs.region.clone(),
                    period: obs.period,
                    commodity: Some(obs.commodity.clone()),
                    mean_temperature: temperatures[i],
                    total_precipitation: precipitation[i],
                });
            }
            if dsci[i].is_some() {
                sources.drought.push(DroughtObservation {
                    region: obs.region.clone(),
                    period: obs.period,
                    commodity: Some(obs.commodity.clone()),
                    drought_severity_index: dsci[i],
                });
            }
            if let (Some(economic), Some(delta)) = (sources.economic.as_mut(), deltas[i]) {
                economic.push(EconomicObservation {
                    region: Some(obs.region.clone()),
                    period: obs.period,
                    commodity: obs.commodity.clone(),
                    economic_delta: Some(delta),
                });
            }
            sources.yields.push(obs);
        }
        Ok(sources)
    }

    /// Whether the economic source was supplied.
    pub const fn has_economic(&self) -> bool {
        self.economic.is_some()
    }
}

fn expect_kind(table: &SourceTable, kind: SourceKind) -> Result<()> {
    if table.kind() != kind {
        return Err(GranaryError::InvalidData(format!(
            "expected a {kind} table, got {}",
            table.kind()
        )));
    }
    Ok(())
}

/// Frame positions of rows with a usable yield, in frame order.
fn kept_row_indices(table: &SourceTable) -> Result<Vec<usize>> {
    Ok(table
        .optional_floats("yield_value")?
        .into_iter()
        .enumerate()
        .filter_map(|(i, v)| v.filter(|x| x.is_finite()).map(|_| i))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn wide() -> SourceTable {
        let df = df! {
            "region" => &["IOWA", "IOWA", "KANSAS"],
            "period" => &[2011, 2012, 2012],
            "commodity" => &["CORN", "CORN", "WHEAT"],
            "yield_value" => &[Some(150.0), Some(105.0), None],
            "mean_temperature" => &[Some(22.0), None, Some(25.0)],
            "total_precipitation" => &[Some(500.0), None, Some(400.0)],
            "drought_severity_index" => &[None, Some(420.0), Some(100.0)],
        }
        .unwrap();
        SourceTable::new(SourceKind::Wide, df).unwrap()
    }

    #[test]
    fn test_from_wide_splits_sources() {
        let sources = Sources::from_wide(&wide()).unwrap();

        assert_eq!(sources.yields.len(), 2);
        assert_eq!(sources.dropped_yield_rows, 1);
        assert_eq!(sources.weather.len(), 1);
        assert_eq!(sources.weather[0].period, 2011);
        assert_eq!(sources.drought.len(), 1);
        assert_eq!(sources.drought[0].drought_severity_index, Some(420.0));
        assert!(!sources.has_economic());
    }

    #[test]
    fn test_from_tables_rejects_wrong_kind() {
        let table = wide();
        let err = Sources::from_tables(&table, &table, &table, None).unwrap_err();
        assert!(matches!(err, GranaryError::InvalidData(_)));
    }
}
