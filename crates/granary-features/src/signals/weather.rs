//! Weather risk from temperature stress and precipitation anomaly.

use granary_traits::stats::zscore;
use granary_traits::{Component, FeatureConfig, FeatureVector, LinearScale, RiskSignal};
use serde::{Deserialize, Serialize};

/// Configuration for the weather risk signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherRiskConfig {
    /// Centre of the optimal temperature band, °C.
    pub optimal_temperature_c: f64,
    /// Half-width of the optimal band, °C.
    pub temperature_band_c: f64,
    /// Share of the temperature sub-score; precipitation gets the rest.
    pub temperature_share: f64,
    /// Scale for degrees outside the band.
    pub temperature_scale: LinearScale,
    /// Scale for the absolute precipitation z-score.
    pub precipitation_scale: LinearScale,
}

impl From<&FeatureConfig> for WeatherRiskConfig {
    fn from(config: &FeatureConfig) -> Self {
        Self {
            optimal_temperature_c: config.optimal_temperature_c,
            temperature_band_c: config.temperature_band_c,
            temperature_share: config.temperature_share,
            temperature_scale: config.scales.temperature_stress,
            precipitation_scale: config.scales.precipitation_anomaly,
        }
    }
}

impl Default for WeatherRiskConfig {
    fn default() -> Self {
        Self::from(&FeatureConfig::default())
    }
}

/// Weather risk signal.
///
/// Heat and cold both count as stress once the mean temperature leaves the
/// optimal band. Precipitation counts in both directions too: drought and
/// flooding years are equally anomalous.
#[derive(Debug, Clone, Default)]
pub struct WeatherRisk {
    config: WeatherRiskConfig,
}

impl WeatherRisk {
    /// Create a new weather risk signal.
    #[must_use]
    pub const fn new(config: WeatherRiskConfig) -> Self {
        Self { config }
    }

    /// Degrees Celsius outside the optimal band, 0 inside it.
    pub fn temperature_stress(&self, mean_temperature: f64) -> f64 {
        let deviation = (mean_temperature - self.config.optimal_temperature_c).abs();
        (deviation - self.config.temperature_band_c).max(0.0)
    }

    /// Z-score of this period's precipitation against the group's prior
    /// periods. Zero when the history has fewer than two points or no spread.
    pub fn precipitation_anomaly(precipitation: f64, history: &[f64]) -> f64 {
        zscore(precipitation, history).value
    }
}

impl RiskSignal for WeatherRisk {
    fn name(&self) -> &str {
        "weather_risk"
    }

    fn component(&self) -> Component {
        Component::Weather
    }

    fn required_fields(&self) -> &[&str] {
        &["temperature_stress", "precipitation_anomaly"]
    }

    fn score(&self, features: &FeatureVector) -> Option<f64> {
        let temperature = features
            .temperature_stress
            .map(|t| self.config.temperature_scale.apply(t));
        let precipitation = features
            .precipitation_anomaly
            .map(|z| self.config.precipitation_scale.apply(z.abs()));

        super::blend(&[
            (self.config.temperature_share, temperature),
            (1.0 - self.config.temperature_share, precipitation),
        ])
    }

    fn description(&self) -> &str {
        "Temperature outside the optimal band and precipitation anomaly"
    }
}
