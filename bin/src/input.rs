//! Loading of CSV sources, configuration, events and scored runs.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use clap::Args;
use granary::PipelineConfig;
use granary::eval::KnownEvent;
use granary::merge::{SourceKind, SourceTable, Sources};
use granary::traits::WeightConfig;
use polars::prelude::*;
use tracing::info;

use crate::output::ScoreFile;

/// Environment variable naming a default configuration file.
const CONFIG_ENV: &str = "GRANARY_CONFIG";

/// Input tables: either one wide CSV or one CSV per source.
#[derive(Debug, Args)]
pub(crate) struct InputArgs {
    /// Wide CSV with yield, weather, drought and optional economic columns
    #[arg(short, long, conflicts_with_all = ["yields", "weather", "drought", "economic"])]
    pub(crate) input: Option<PathBuf>,

    /// Yield CSV (region, period, commodity, yield_value)
    #[arg(long)]
    pub(crate) yields: Option<PathBuf>,

    /// Weather CSV (region, period, mean_temperature, total_precipitation)
    #[arg(long)]
    pub(crate) weather: Option<PathBuf>,

    /// Drought CSV (region, period, drought_severity_index)
    #[arg(long)]
    pub(crate) drought: Option<PathBuf>,

    /// Economic CSV (period, commodity, economic_delta)
    #[arg(long)]
    pub(crate) economic: Option<PathBuf>,
}

/// Read a CSV file into a DataFrame.
pub(crate) fn read_csv(path: &Path) -> Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish())
        .with_context(|| format!("failed to read {}", path.display()))?;
    info!(path = %path.display(), rows = df.height(), "loaded csv");
    Ok(df)
}

fn table(kind: SourceKind, path: &Path) -> Result<SourceTable> {
    SourceTable::new(kind, read_csv(path)?)
        .with_context(|| format!("invalid {} table {}", kind.name(), path.display()))
}

/// Build the pipeline sources from the CLI arguments.
pub(crate) fn load_sources(args: &InputArgs) -> Result<Sources> {
    if let Some(path) = &args.input {
        return Ok(Sources::from_wide(&table(SourceKind::Wide, path)?)?);
    }

    let (Some(yields), Some(weather), Some(drought)) =
        (&args.yields, &args.weather, &args.drought)
    else {
        bail!("either --input or all of --yields, --weather and --drought are required");
    };
    let economic = args
        .economic
        .as_deref()
        .map(|path| table(SourceKind::Economic, path))
        .transpose()?;

    Ok(Sources::from_tables(
        &table(SourceKind::Yield, yields)?,
        &table(SourceKind::Weather, weather)?,
        &table(SourceKind::Drought, drought)?,
        economic.as_ref(),
    )?)
}

/// Parse a configuration file body.
pub(crate) fn parse_config(json: &str) -> Result<PipelineConfig> {
    Ok(serde_json::from_str(json)?)
}

/// Load the configuration and apply a weight preset override.
///
/// Without a path, `$GRANARY_CONFIG` is used when set, else the defaults.
pub(crate) fn load_config(path: Option<&Path>, preset: Option<&str>) -> Result<PipelineConfig> {
    let path = path
        .map(Path::to_path_buf)
        .or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from));

    let mut config = match path {
        Some(path) => {
            let body = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            parse_config(&body)
                .with_context(|| format!("invalid configuration {}", path.display()))?
        }
        None => PipelineConfig::default(),
    };

    if let Some(name) = preset {
        config.weights = WeightConfig::preset(name)
            .ok_or_else(|| anyhow!("unknown weight preset: {name}"))?;
    }
    config.validate()?;
    Ok(config)
}

/// Parse a JSON array of known events.
pub(crate) fn parse_events(json: &str) -> Result<Vec<KnownEvent>> {
    Ok(serde_json::from_str(json)?)
}

/// Load known events; no path means no events.
pub(crate) fn load_events(path: Option<&Path>) -> Result<Vec<KnownEvent>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let body =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    parse_events(&body).with_context(|| format!("invalid events file {}", path.display()))
}

/// Load a scored run written by `score --format json`.
pub(crate) fn load_scores(path: &Path) -> Result<ScoreFile> {
    let body =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&body)
        .with_context(|| format!("invalid score file {}", path.display()))
}
