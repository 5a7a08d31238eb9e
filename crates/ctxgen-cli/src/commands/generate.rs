//! Generate Command Implementation
//!
//! Loads a MovieLens dataset, indexes it and writes one record table and one
//! array bundle per shard.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use ctxgen_core::{CurrentEventPolicy, FeatureParams, HistoryScope};
use ctxgen_data::movielens::{self, DatasetVariant, LoadOptions};
use ctxgen_data::{EventLogStore, FeatureWriter, OutputLayout, ShardScheduler};
use tracing::info;

/// Whether an event's own interaction appears in its histories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CurrentEventArg {
    /// Leave the triggering event out
    Exclude,
    /// Keep the triggering event
    Include,
}

impl From<CurrentEventArg> for CurrentEventPolicy {
    fn from(arg: CurrentEventArg) -> Self {
        match arg {
            CurrentEventArg::Exclude => CurrentEventPolicy::Exclude,
            CurrentEventArg::Include => CurrentEventPolicy::Include,
        }
    }
}

/// Which interactions count as history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ScopeArg {
    /// Every qualifying interaction in the log
    Full,
    /// Only interactions before the event
    Prior,
}

impl From<ScopeArg> for HistoryScope {
    fn from(arg: ScopeArg) -> Self {
        match arg {
            ScopeArg::Full => HistoryScope::Full,
            ScopeArg::Prior => HistoryScope::Prior,
        }
    }
}

/// Generate context features for a MovieLens dataset
///
/// Values from `--config` are applied first; explicit flags override them.
///
/// # Example
///
/// ```bash
/// ctxgen generate \
///     --data-dir data/ml-25m \
///     --dataset 25M \
///     --output-dir out \
///     --shard-width 500000 \
///     --seed 7
/// ```
#[derive(Args, Debug, Clone)]
pub struct GenerateCommand {
    /// Directory holding the dataset files
    #[arg(long, short = 'd', env = "CTXGEN_DATA_DIR")]
    pub data_dir: PathBuf,

    /// MovieLens release: 1M, 10M, 20M or 25M
    #[arg(long, default_value = "1M", env = "CTXGEN_DATASET")]
    pub dataset: DatasetVariant,

    /// Directory receiving the shard artifacts
    #[arg(long, short = 'o', env = "CTXGEN_OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// Output file prefix (defaults to movie_lens_<dataset>)
    #[arg(long)]
    pub prefix: Option<String>,

    /// JSON file with feature parameters
    #[arg(long, short = 'c', env = "CTXGEN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Maximum history length (defaults to 128 for 1M, 256 otherwise)
    #[arg(long, env = "CTXGEN_FEATURE_LENGTH")]
    pub feature_length: Option<usize>,

    /// Rows per shard
    #[arg(long, env = "CTXGEN_SHARD_WIDTH")]
    pub shard_width: Option<usize>,

    /// Sampling seed; a random one is drawn and logged when omitted
    #[arg(long, env = "CTXGEN_SEED")]
    pub seed: Option<u64>,

    /// Ratings at or above this value are positive
    #[arg(long, env = "CTXGEN_THRESHOLD")]
    pub threshold: Option<f32>,

    /// Current-event policy
    #[arg(long)]
    pub current_event: Option<CurrentEventArg>,

    /// History scope
    #[arg(long)]
    pub scope: Option<ScopeArg>,

    /// Worker threads (0 = one per CPU)
    #[arg(long, short = 'w', env = "CTXGEN_WORKERS")]
    pub workers: Option<usize>,

    /// Extra attempts for a failed shard
    #[arg(long, env = "CTXGEN_MAX_RETRIES")]
    pub max_retries: Option<usize>,

    /// Show 1M occupations by name, read from the dataset README
    #[arg(long)]
    pub real_occupation: bool,
}

impl GenerateCommand {
    /// Merges the config file, dataset defaults and flags.
    pub fn resolve_params(&self) -> Result<FeatureParams> {
        let mut params = match &self.config {
            Some(path) => load_config(path, self.dataset)?,
            None => FeatureParams {
                feature_length: self.dataset.default_feature_length(),
                ..FeatureParams::default()
            },
        };

        if let Some(feature_length) = self.feature_length {
            params.feature_length = feature_length;
        }
        if let Some(shard_width) = self.shard_width {
            params.shard_width = shard_width;
        }
        if let Some(seed) = self.seed {
            params.seed = Some(seed);
        }
        if let Some(threshold) = self.threshold {
            params.positive_threshold = threshold;
        }
        if let Some(current_event) = self.current_event {
            params.current_event = current_event.into();
        }
        if let Some(scope) = self.scope {
            params.scope = scope.into();
        }
        if let Some(workers) = self.workers {
            params.num_workers = workers;
        }
        if let Some(max_retries) = self.max_retries {
            params.max_retries = max_retries;
        }

        params.validate().context("Invalid feature parameters")?;
        Ok(params)
    }

    /// Execute the generate command
    pub fn run(&self) -> Result<()> {
        let params = self.resolve_params()?;
        let prefix = self
            .prefix
            .clone()
            .unwrap_or_else(|| self.dataset.output_prefix());

        info!(
            data_dir = %self.data_dir.display(),
            dataset = %self.dataset,
            output_dir = %self.output_dir.display(),
            prefix = %prefix,
            "Generating context features"
        );

        let options = LoadOptions {
            real_occupation: self.real_occupation,
        };
        let dataset = movielens::load_with(&self.data_dir, self.dataset, options)
            .with_context(|| format!("Failed to load dataset from {:?}", self.data_dir))?;
        let store = Arc::new(EventLogStore::build(dataset.log));
        let writer = FeatureWriter::new(
            OutputLayout::new(&self.output_dir, prefix),
            store.clone(),
            Arc::new(dataset.attributes),
        )
        .context("Passthrough attributes do not cover the ratings")?;

        let scheduler = ShardScheduler::new(store, params)?;
        let report = scheduler.run(&writer).context("Feature generation failed")?;

        for shard in &report.shards {
            for path in &shard.artifacts {
                info!(shard = %shard.shard, path = %path.display(), "Wrote artifact");
            }
        }
        info!(
            rows = report.rows,
            shards = report.shards.len(),
            seed = report.seed,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Done"
        );
        Ok(())
    }
}

fn load_config(path: &Path, dataset: DatasetVariant) -> Result<FeatureParams> {
    info!(path = %path.display(), "Loading config");
    let config_str = std::fs::read_to_string(path).context("Failed to read config file")?;
    let value: serde_json::Value =
        serde_json::from_str(&config_str).context("Failed to parse config JSON")?;
    let has_length = value.get("feature_length").is_some();
    let mut params: FeatureParams =
        serde_json::from_value(value).context("Invalid feature parameters in config")?;
    if !has_length {
        params.feature_length = dataset.default_feature_length();
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn command() -> GenerateCommand {
        GenerateCommand {
            data_dir: PathBuf::from("/data"),
            dataset: DatasetVariant::Ml1M,
            output_dir: PathBuf::from("/out"),
            prefix: None,
            config: None,
            feature_length: None,
            shard_width: None,
            seed: None,
            threshold: None,
            current_event: None,
            scope: None,
            workers: None,
            max_retries: None,
            real_occupation: false,
        }
    }

    #[test]
    fn test_defaults_follow_dataset() {
        let params = command().resolve_params().unwrap();
        assert_eq!(params.feature_length, 128);
        assert_eq!(params.shard_width, 1_000_000);
        assert_eq!(params.current_event, CurrentEventPolicy::Exclude);

        let mut cmd = command();
        cmd.dataset = DatasetVariant::Ml25M;
        assert_eq!(cmd.resolve_params().unwrap().feature_length, 256);
    }

    #[test]
    fn test_flags_override_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("params.json");
        std::fs::write(
            &path,
            r#"{"shard_width": 1000, "seed": 3, "scope": "prior", "max_retries": 2}"#,
        )
        .unwrap();

        let mut cmd = command();
        cmd.dataset = DatasetVariant::Ml10M;
        cmd.config = Some(path);
        cmd.seed = Some(9);
        cmd.current_event = Some(CurrentEventArg::Include);

        let params = cmd.resolve_params().unwrap();
        assert_eq!(params.feature_length, 256);
        assert_eq!(params.shard_width, 1000);
        assert_eq!(params.seed, Some(9));
        assert_eq!(params.scope, HistoryScope::Prior);
        assert_eq!(params.current_event, CurrentEventPolicy::Include);
        assert_eq!(params.max_retries, 2);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut cmd = command();
        cmd.feature_length = Some(0);
        assert!(cmd.resolve_params().is_err());

        let dir = tempdir().unwrap();
        let path = dir.path().join("params.json");
        std::fs::write(&path, r#"{"current_event": "sometimes"}"#).unwrap();
        let mut cmd = command();
        cmd.config = Some(path);
        assert!(cmd.resolve_params().is_err());
    }
}
