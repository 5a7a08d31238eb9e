//! Inspect Command Implementation

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use ctxgen_data::movielens::{self, DatasetVariant, LoadOptions};
use ctxgen_data::EventLogStore;
use tracing::info;

/// Print dataset statistics and the first ratings
#[derive(Args, Debug, Clone)]
pub struct InspectCommand {
    /// Directory holding the dataset files
    #[arg(long, short = 'd', env = "CTXGEN_DATA_DIR")]
    pub data_dir: PathBuf,

    /// MovieLens release: 1M, 10M, 20M or 25M
    #[arg(long, default_value = "1M", env = "CTXGEN_DATASET")]
    pub dataset: DatasetVariant,

    /// Number of leading ratings to show
    #[arg(long, default_value = "5")]
    pub head: usize,

    /// Show 1M occupations by name, read from the dataset README
    #[arg(long)]
    pub real_occupation: bool,
}

impl InspectCommand {
    /// Execute the inspect command
    pub fn run(&self) -> Result<()> {
        let options = LoadOptions {
            real_occupation: self.real_occupation,
        };
        let dataset = movielens::load_with(&self.data_dir, self.dataset, options)
            .with_context(|| format!("Failed to load dataset from {:?}", self.data_dir))?;
        let attributes = dataset.attributes;
        let store = EventLogStore::build(dataset.log);

        info!(
            dataset = %self.dataset,
            users = store.num_users(),
            items = store.num_items(),
            ratings = store.len(),
            user_attributes = attributes.user.len(),
            item_attributes = attributes.item.len(),
            "Dataset summary"
        );

        let columns: Vec<&str> = attributes.columns().collect();
        info!(columns = %columns.join(","), "Passthrough columns");

        for (row, event) in store.log().iter().take(self.head).enumerate() {
            let mut values = Vec::with_capacity(attributes.width());
            attributes.extend_values(&event, &mut values);
            info!(
                row,
                user_id = event.user_id,
                item_id = event.item_id,
                rating = event.rating,
                timestamp = event.timestamp,
                attributes = %values.join(" | "),
                "Rating"
            );
        }
        Ok(())
    }
}
