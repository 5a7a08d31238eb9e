//! Verify Command Implementation

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use ctxgen_core::DEFAULT_POSITIVE_THRESHOLD;
use ctxgen_data::movielens::DatasetVariant;
use ctxgen_data::{OutputLayout, ShardArtifacts};
use tracing::{error, info};

/// Verify generated shard artifacts
///
/// Every shard is checked for matching row counts, lengths within the
/// capacity, sentinel padding and labels consistent with the ratings.
#[derive(Args, Debug, Clone)]
pub struct VerifyCommand {
    /// Directory holding the shard artifacts
    #[arg(long, short = 'o', env = "CTXGEN_OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// Output file prefix
    #[arg(long, conflicts_with = "dataset")]
    pub prefix: Option<String>,

    /// Derive the prefix from a MovieLens release
    #[arg(long)]
    pub dataset: Option<DatasetVariant>,

    /// Ratings at or above this value are positive
    #[arg(long, default_value_t = DEFAULT_POSITIVE_THRESHOLD)]
    pub threshold: f32,
}

impl VerifyCommand {
    fn prefix(&self) -> Result<String> {
        match (&self.prefix, self.dataset) {
            (Some(prefix), _) => Ok(prefix.clone()),
            (None, Some(dataset)) => Ok(dataset.output_prefix()),
            (None, None) => anyhow::bail!("Either --prefix or --dataset is required"),
        }
    }

    /// Execute the verify command
    pub fn run(&self) -> Result<()> {
        let layout = OutputLayout::new(&self.output_dir, self.prefix()?);
        let shards = layout
            .discover()
            .with_context(|| format!("Failed to list {:?}", self.output_dir))?;
        if shards.is_empty() {
            anyhow::bail!(
                "No shards named {}_* found in {:?}",
                layout.prefix(),
                self.output_dir
            );
        }

        let mut failed = 0;
        let mut rows = 0;
        for paths in &shards {
            let outcome = ShardArtifacts::read(paths)
                .map_err(anyhow::Error::from)
                .and_then(|artifacts| {
                    artifacts.verify(self.threshold)?;
                    Ok(artifacts.rows())
                });
            match outcome {
                Ok(n) => {
                    rows += n;
                    info!(bundle = %paths.bundle.display(), rows = n, "Shard verified");
                }
                Err(e) => {
                    failed += 1;
                    error!(bundle = %paths.bundle.display(), error = %e, "Shard invalid");
                }
            }
        }

        if failed > 0 {
            anyhow::bail!("{failed} of {} shard(s) failed verification", shards.len());
        }
        info!(shards = shards.len(), rows, "All shards verified");
        Ok(())
    }
}
