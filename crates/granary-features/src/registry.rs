//! Component registry for discovering the available risk signals.

use granary_traits::{Component, FeatureConfig, RiskSignal};
use serde::Serialize;

use crate::signals::{DroughtRisk, EconomicRisk, WeatherRisk, YieldRisk};

/// Metadata about a component signal.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentInfo {
    /// Signal name.
    pub name: &'static str,

    /// Component the signal scores.
    pub component: Component,

    /// Human-readable description.
    pub description: &'static str,

    /// Merged-record fields the signal is derived from.
    pub inputs: &'static [&'static str],

    /// Whether the component may be missing from a dataset entirely.
    pub optional: bool,
}

/// Get information about every component signal.
#[must_use]
pub fn available_components() -> Vec<ComponentInfo> {
    vec![
        ComponentInfo {
            name: "yield_risk",
            component: Component::Yield,
            description: "Trailing yield volatility and shortfall against the trailing mean",
            inputs: &["yield_value"],
            optional: false,
        },
        ComponentInfo {
            name: "weather_risk",
            component: Component::Weather,
            description: "Temperature outside the optimal band and precipitation anomaly",
            inputs: &["mean_temperature", "total_precipitation"],
            optional: false,
        },
        ComponentInfo {
            name: "drought_risk",
            component: Component::Drought,
            description: "DSCI severity with a bonus for consecutive high-drought periods",
            inputs: &["drought_severity_index"],
            optional: false,
        },
        ComponentInfo {
            name: "economic_risk",
            component: Component::Economic,
            description: "Drawdown of ending stocks",
            inputs: &["economic_delta"],
            optional: true,
        },
    ]
}

/// Get information about the signal for a component.
#[must_use]
pub fn get_component_info(component: Component) -> Option<ComponentInfo> {
    available_components()
        .into_iter()
        .find(|info| info.component == component)
}

/// Build one signal per component, in precedence order.
#[must_use]
pub fn component_signals(config: &FeatureConfig) -> Vec<Box<dyn RiskSignal>> {
    vec![
        Box::new(YieldRisk::new(config.into())),
        Box::new(WeatherRisk::new(config.into())),
        Box::new(DroughtRisk::new(config.into())),
        Box::new(EconomicRisk::new(config.into())),
    ]
}
