//! Known historical shortfall events and the event-window check.

use granary_traits::stats::mean;
use granary_traits::types::normalize_name;
use granary_traits::{Period, RiskScore};
use serde::{Deserialize, Serialize};

use crate::report::TestResult;

/// A documented high-risk period for a region.
///
/// Events are usually loaded from JSON:
///
/// ```
/// use granary_eval::KnownEvent;
///
/// let json = r#"{"name": "2012_drought", "region": "Iowa",
///               "start_period": 2012, "end_period": 2012}"#;
/// let event: KnownEvent = serde_json::from_str(json).unwrap();
/// assert!(event.covers("IOWA", "CORN", 2012));
/// assert!(!event.covers("IOWA", "CORN", 2013));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownEvent {
    /// Identifier used in the test name.
    pub name: String,
    /// Affected region.
    pub region: String,
    /// Affected commodity; `None` covers every commodity of the region.
    #[serde(default)]
    pub commodity: Option<String>,
    /// First affected period.
    pub start_period: Period,
    /// Last affected period (inclusive).
    pub end_period: Period,
    /// Free-text description of the documented shortfall.
    #[serde(default)]
    pub description: Option<String>,
}

impl KnownEvent {
    /// Whether the event names this region and commodity.
    pub fn applies_to(&self, region: &str, commodity: &str) -> bool {
        normalize_name(&self.region) == normalize_name(region)
            && self
                .commodity
                .as_deref()
                .is_none_or(|c| normalize_name(c) == normalize_name(commodity))
    }

    /// Whether the event covers a record key.
    pub fn covers(&self, region: &str, commodity: &str, period: Period) -> bool {
        self.applies_to(region, commodity)
            && (self.start_period..=self.end_period).contains(&period)
    }

    /// Test name for this event.
    pub fn test_name(&self) -> String {
        format!("historical_event:{}", self.name)
    }
}

/// Compare the mean score inside an event window against the baseline.
///
/// The baseline is every scored record of the same region (and commodity,
/// when the event names one) that no known event covers. The test passes
/// when `event_mean - baseline_mean >= min_margin`.
pub fn event_margin_test(
    history: &[RiskScore],
    event: &KnownEvent,
    all_events: &[KnownEvent],
    min_margin: f64,
) -> TestResult {
    let name = event.test_name();
    if event.end_period < event.start_period {
        return TestResult::inconclusive(name, min_margin, "event window ends before it starts");
    }

    let relevant = history
        .iter()
        .filter(|s| event.applies_to(&s.key.region, &s.key.commodity));

    let (in_event, baseline): (Vec<&RiskScore>, Vec<&RiskScore>) =
        relevant.partition(|s| event.covers(&s.key.region, &s.key.commodity, s.key.period));
    let baseline: Vec<f64> = baseline
        .into_iter()
        .filter(|s| {
            !all_events
                .iter()
                .any(|e| e.covers(&s.key.region, &s.key.commodity, s.key.period))
        })
        .map(|s| s.composite_score)
        .collect();
    let in_event: Vec<f64> = in_event.into_iter().map(|s| s.composite_score).collect();

    match (mean(&in_event), mean(&baseline)) {
        (Some(event_mean), Some(baseline_mean)) => {
            let margin = event_mean - baseline_mean;
            TestResult::measured(
                name,
                margin >= min_margin,
                margin,
                min_margin,
                format!(
                    "event mean {event_mean:.2} over {} records \
                     vs baseline {baseline_mean:.2} over {} records",
                    in_event.len(),
                    baseline.len()
                ),
            )
        }
        (None, _) => {
            TestResult::inconclusive(name, min_margin, "no scored records in the event window")
        }
        (_, None) => {
            TestResult::inconclusive(name, min_margin, "no baseline records outside known events")
        }
    }
}
