//! End-to-end scenarios over the full pipeline.

use approx::assert_relative_eq;
use granary::eval::KnownEvent;
use granary::merge::{SourceKind, SourceTable, Sources};
use granary::traits::{
    Confidence, DroughtObservation, EconomicObservation, LinearScale, RecordKey,
    WeatherObservation, WeightConfig, YieldObservation,
};
use granary::{Component, Pipeline, PipelineConfig, RiskCategory, RiskScore};
use polars::prelude::*;
use proptest::prelude::*;

const PERIODS: [i32; 8] = [2005, 2006, 2007, 2008, 2009, 2010, 2011, 2012];
const CORN_YIELDS: [f64; 8] = [148.0, 152.0, 151.0, 149.0, 150.0, 155.0, 145.0, 105.0];
// mean 500, sample std 40 over 2005-2011; 2012 sits at z = -2.5
const PRECIPITATION: [f64; 8] = [460.0, 540.0, 460.0, 540.0, 460.0, 540.0, 500.0, 400.0];
const TEMPERATURE: [f64; 8] = [21.0, 20.5, 22.0, 21.5, 21.0, 22.0, 23.0, 29.0];
const DSCI: [f64; 8] = [20.0, 10.0, 30.0, 0.0, 40.0, 300.0, 320.0, 420.0];

fn yield_obs(region: &str, period: i32, commodity: &str, value: f64) -> YieldObservation {
    YieldObservation {
        region: region.to_string(),
        period,
        commodity: commodity.to_string(),
        yield_value: value,
    }
}

fn iowa_sources(economic: Option<Vec<EconomicObservation>>) -> Sources {
    let mut yields: Vec<YieldObservation> = PERIODS
        .iter()
        .zip(CORN_YIELDS)
        .map(|(&p, y)| yield_obs("Iowa", p, "Corn", y))
        .collect();
    // no weather or drought rows exist for Kansas
    yields.push(yield_obs("Kansas", 2012, "Wheat", 38.0));

    let weather = PERIODS
        .iter()
        .enumerate()
        .map(|(i, &p)| WeatherObservation {
            region: "IOWA".to_string(),
            period: p,
            commodity: None,
            mean_temperature: Some(TEMPERATURE[i]),
            total_precipitation: Some(PRECIPITATION[i]),
        })
        .collect();
    let drought = PERIODS
        .iter()
        .zip(DSCI)
        .map(|(&p, d)| DroughtObservation {
            region: "iowa".to_string(),
            period: p,
            commodity: None,
            drought_severity_index: Some(d),
        })
        .collect();

    Sources::new(yields, weather, drought, economic)
}

fn find<'a>(scores: &'a [RiskScore], region: &str, period: i32, commodity: &str) -> &'a RiskScore {
    let key = RecordKey::new(region, period, commodity);
    scores
        .iter()
        .find(|s| s.key == key)
        .unwrap_or_else(|| panic!("no score for {key}"))
}

#[test]
fn drought_year_scores_high() {
    let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    let run = pipeline.score(&iowa_sources(None)).unwrap();

    let features = run
        .features
        .iter()
        .find(|f| f.key == RecordKey::new("IOWA", 2012, "CORN"))
        .unwrap();
    assert_relative_eq!(features.trailing_mean.unwrap(), 150.0, epsilon = 1e-9);
    assert_relative_eq!(features.precipitation_anomaly.unwrap(), -2.5, epsilon = 1e-9);
    assert_eq!(features.drought_run, 3);

    let drought_year = find(&run.scores, "IOWA", 2012, "CORN");
    assert!(matches!(
        drought_year.risk_category,
        Some(RiskCategory::High | RiskCategory::VeryHigh)
    ));
    assert_eq!(drought_year.components.get(Component::Drought), Some(100.0));
    assert!(drought_year
        .recommendation
        .as_deref()
        .is_some_and(|r| r.contains("stockpile")));

    let baseline: Vec<f64> = run
        .scores
        .iter()
        .filter(|s| s.key.region == "IOWA" && s.key.period < 2010)
        .map(|s| s.composite_score)
        .collect();
    let baseline_mean = baseline.iter().sum::<f64>() / baseline.len() as f64;
    assert!(drought_year.composite_score > baseline_mean + 30.0);
}

#[test]
fn economic_absent_runs_three_component() {
    let pipeline = Pipeline::new(PipelineConfig {
        weights: WeightConfig::four_component(),
        ..PipelineConfig::default()
    })
    .unwrap();
    let run = pipeline.score(&iowa_sources(None)).unwrap();

    assert!(!run.active_weights.includes(Component::Economic));
    assert_eq!(run.coverage.economic, None);
    for score in &run.scores {
        assert!(!score.effective_weights.contains_key(&Component::Economic));
        assert!((0.0..=100.0).contains(&score.composite_score));
    }

    let three = Pipeline::new(PipelineConfig::default())
        .unwrap()
        .score(&iowa_sources(None))
        .unwrap();
    for (a, b) in run.scores.iter().zip(&three.scores) {
        assert_relative_eq!(a.composite_score, b.composite_score, epsilon = 1e-9);
    }
}

#[test]
fn economic_present_is_weighted() {
    let economic = PERIODS
        .iter()
        .map(|&p| EconomicObservation {
            region: None,
            period: p,
            commodity: "CORN".to_string(),
            economic_delta: Some(if p == 2012 { -0.3 } else { 0.02 }),
        })
        .collect();
    let pipeline = Pipeline::new(PipelineConfig {
        weights: WeightConfig::four_component(),
        ..PipelineConfig::default()
    })
    .unwrap();
    let run = pipeline.score(&iowa_sources(Some(economic))).unwrap();

    assert!(run.active_weights.includes(Component::Economic));
    let drought_year = find(&run.scores, "IOWA", 2012, "CORN");
    assert_eq!(drought_year.components.get(Component::Economic), Some(100.0));
    // Kansas wheat has no national corn row to match
    let wheat = find(&run.scores, "KANSAS", 2012, "WHEAT");
    assert_eq!(wheat.components.get(Component::Economic), None);
}

#[test]
fn unmatched_yield_record_survives_merge() {
    let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    let run = pipeline.score(&iowa_sources(None)).unwrap();

    assert_eq!(run.scores.len(), PERIODS.len() + 1);
    let features = run
        .features
        .iter()
        .find(|f| f.key.region == "KANSAS")
        .unwrap();
    assert_eq!(features.temperature_stress, None);
    assert_eq!(features.drought_severity, None);

    // single-period group: fallback volatility, still a finite score
    assert_eq!(features.confidence, Confidence::Low);
    assert_eq!(features.volatility, 0.0);
    let wheat = find(&run.scores, "KANSAS", 2012, "WHEAT");
    assert!(wheat.composite_score.is_finite());
    assert!(run.coverage.weather < 1.0);
}

#[test]
fn scoring_is_idempotent() {
    let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    let sources = iowa_sources(None);
    let first = pipeline.score(&sources).unwrap();
    let second = pipeline.score(&sources).unwrap();
    assert_eq!(first.scores, second.scores);
}

#[test]
fn tier_boundaries_are_inclusive_below() {
    let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    let classifier = pipeline.classifier();
    assert_eq!(classifier.tier(25.0), RiskCategory::Moderate);
    assert_eq!(classifier.tier(50.0), RiskCategory::High);
    assert_eq!(classifier.tier(75.0), RiskCategory::VeryHigh);
    assert_eq!(classifier.tier(100.0), RiskCategory::VeryHigh);
}

#[test]
fn duplicate_source_rows_are_rejected() {
    let mut sources = iowa_sources(None);
    sources.weather.push(WeatherObservation {
        region: "Iowa ".to_string(),
        period: 2012,
        commodity: None,
        mean_temperature: Some(30.0),
        total_precipitation: None,
    });
    let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    let err = pipeline.score(&sources).unwrap_err();
    assert!(err.to_string().contains("Duplicate key in weather"));
}

#[test]
fn validation_recognizes_drought_event() {
    let events = vec![KnownEvent {
        name: "2012_drought".to_string(),
        region: "Iowa".to_string(),
        commodity: Some("Corn".to_string()),
        start_period: 2012,
        end_period: 2012,
        description: Some("Flash drought across the corn belt".to_string()),
    }];
    let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    let output = pipeline.run(&iowa_sources(None), &events).unwrap();

    let event = output.report.get("historical_event:2012_drought").unwrap();
    assert!(event.passed, "{event}");
    assert!(output.report.get("score_range").unwrap().passed);
    assert_eq!(output.report.matching("sensitivity:").count(), 3);
    assert_eq!(output.run.summary.count, output.run.scores.len());
}

#[test]
fn wide_table_input() {
    let df = df! {
        "region" => &["Iowa", "Iowa", "Iowa", "Iowa"],
        "period" => &[2009, 2010, 2011, 2012],
        "commodity" => &["Corn", "Corn", "Corn", "Corn"],
        "yield_value" => &[Some(150.0), Some(155.0), Some(145.0), Some(105.0)],
        "mean_temperature" => &[Some(21.0), Some(22.0), Some(23.0), Some(29.0)],
        "total_precipitation" => &[Some(540.0), Some(460.0), Some(500.0), Some(400.0)],
        "drought_severity_index" => &[Some(40.0), Some(300.0), Some(320.0), Some(420.0)],
    }
    .unwrap();
    let table = SourceTable::new(SourceKind::Wide, df).unwrap();
    let sources = Sources::from_wide(&table).unwrap();

    let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    let run = pipeline.score(&sources).unwrap();
    assert_eq!(run.scores.len(), 4);
    assert_relative_eq!(run.coverage.drought, 1.0);
    assert!(find(&run.scores, "IOWA", 2012, "CORN").composite_score >= 50.0);
}

#[test]
fn flat_drought_scale_fails_sensitivity() {
    let mut config = PipelineConfig::default();
    config.features.scales.drought_severity = LinearScale::new(0.0, 1e12);
    config.features.drought_persistence_bonus = 0.0;
    let output = Pipeline::new(config)
        .unwrap()
        .run(&iowa_sources(None), &[])
        .unwrap();

    let drought = output.report.get("sensitivity:drought").unwrap();
    assert!(!drought.passed, "{drought}");
    assert!(output.report.get("sensitivity:yield").unwrap().passed);
    assert!(output.report.get("sensitivity:weather").unwrap().passed);
}

#[test]
fn input_quality_is_reported_without_blocking() {
    let mut sources = iowa_sources(None);
    sources.drought[0].drought_severity_index = Some(650.0);
    let run = Pipeline::new(PipelineConfig::default())
        .unwrap()
        .score(&sources)
        .unwrap();

    assert_eq!(run.scores.len(), PERIODS.len() + 1);
    assert!(!run.quality.passed());
    assert!(!run.quality.get(SourceKind::Drought).unwrap().passed());
    // Kansas has no weather rows
    let weather = run.quality.get(SourceKind::Weather).unwrap();
    assert!(weather.passed());
    assert_eq!(weather.issues[0].message, "no rows for 1 of 2 yield regions");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn any_weight_set_scores_in_range(raw in prop::collection::vec(0.01f64..1.0, 3)) {
        let total: f64 = raw.iter().sum();
        let weights = WeightConfig::new(
            "arbitrary",
            [Component::Yield, Component::Weather, Component::Drought]
                .into_iter()
                .zip(raw.iter().map(|w| w / total)),
        )
        .unwrap();
        let pipeline = Pipeline::new(PipelineConfig {
            weights,
            ..PipelineConfig::default()
        })
        .unwrap();
        let run = pipeline.score(&iowa_sources(None)).unwrap();

        for score in &run.scores {
            prop_assert!((0.0..=100.0).contains(&score.composite_score));
            if !score.effective_weights.is_empty() {
                let sum: f64 = score.effective_weights.values().sum();
                prop_assert!((sum - 1.0).abs() < 1e-9, "{} weights sum to {}", score.key, sum);
            }
        }
    }
}
