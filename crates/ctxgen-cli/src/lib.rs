//! ctxgen CLI Library
//!
//! This crate provides the command-line interface for ctxgen:
//!
//! - **Generate**: Build sharded context features from a MovieLens dataset
//! - **Verify**: Check generated shards for shape, padding and label errors
//! - **Inspect**: Summarise a dataset before generating features
//!
//! # Example
//!
//! ```bash
//! # Generate features for MovieLens 1M with a fixed seed
//! ctxgen generate --data-dir data/ml-1m --dataset 1M --output-dir out --seed 42
//!
//! # Verify what was written
//! ctxgen verify --output-dir out --dataset 1M
//!
//! # Look at the raw data
//! ctxgen inspect --data-dir data/ml-1m --dataset 1M --head 10
//! ```

pub mod commands;

use clap::{Parser, Subcommand};

pub use commands::{GenerateCommand, InspectCommand, VerifyCommand};

/// ctxgen - context feature generation for recommendation models
///
/// Derives, for every rating, the recent positive and negative items of its
/// user and the recent positive and negative users of its item.
#[derive(Parser, Debug)]
#[command(name = "ctxgen")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Log at debug level
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate context features for every rating
    Generate(GenerateCommand),

    /// Verify generated shard artifacts
    Verify(VerifyCommand),

    /// Print dataset statistics and the first ratings
    Inspect(InspectCommand),
}
