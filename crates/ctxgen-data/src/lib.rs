//! Event log indexing, history extraction and sharded feature generation.
//!
//! This crate turns a `(user, item, rating, timestamp)` event log into
//! per-event context features: for every event, the recent positive and
//! negative items of its user and the recent positive and negative users of
//! its item, each capped at a fixed length and padded with the sentinel `0`.
//!
//! # Pipeline
//!
//! 1. [`movielens::load`] (or any other source) builds an [`EventLog`] plus
//!    optional [`PassthroughAttributes`].
//! 2. [`EventLogStore::build`] indexes the log by user and by item.
//! 3. [`ShardScheduler`] partitions the rows and runs each shard on a worker
//!    pool through a [`ShardProcessor`], which drives the
//!    [`HistoryExtractor`].
//! 4. A [`ShardSink`], usually the [`FeatureWriter`], persists each shard as
//!    a record table and an eight-array bundle.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use ctxgen_core::FeatureParams;
//! use ctxgen_data::movielens::{self, DatasetVariant};
//! use ctxgen_data::{EventLogStore, FeatureWriter, OutputLayout, ShardScheduler};
//!
//! let dataset = movielens::load(Path::new("data/ml-1m"), DatasetVariant::Ml1M).unwrap();
//! let store = Arc::new(EventLogStore::build(dataset.log));
//! let params = FeatureParams::builder().seed(42).build().unwrap();
//!
//! let layout = OutputLayout::new("out", DatasetVariant::Ml1M.output_prefix());
//! let writer = FeatureWriter::new(layout, store.clone(), Arc::new(dataset.attributes)).unwrap();
//! let report = ShardScheduler::new(store, params).unwrap().run(&writer).unwrap();
//! println!("{} shard(s) written", report.shards.len());
//! ```
//!
//! # Modules
//!
//! - [`event_log`] - Columnar event log and its posting-list indexes
//! - [`attributes`] - Passthrough user/item attribute tables
//! - [`history`] - Per-event history extraction and sampling
//! - [`processor`] - Per-shard output buffers
//! - [`scheduler`] - Parallel shard execution with retries
//! - [`writer`] - Shard artifacts on disk and their verification
//! - [`movielens`] - MovieLens 1M/10M/20M/25M loaders

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod attributes;
pub mod event_log;
pub mod history;
pub mod movielens;
pub mod processor;
pub mod scheduler;
pub mod writer;

pub use attributes::{AttributeTable, PassthroughAttributes};
pub use event_log::{EventLog, EventLogStore, Interaction};
pub use history::{sampling_seed, HistoryExtractor};
pub use movielens::{Dataset, DatasetVariant, LoadError, LoadOptions};
pub use processor::{EventFeatureRecord, ShardBuffers, ShardProcessor};
pub use scheduler::{
    RunError, RunReport, ShardError, ShardFailure, ShardReport, ShardScheduler,
};
pub use writer::{
    read_shard, ArtifactPaths, FeatureWriter, OutputLayout, RecordRow, ShardArtifacts, ShardSink,
    WriteError,
};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        EventLog, EventLogStore, FeatureWriter, OutputLayout, PassthroughAttributes,
        ShardScheduler, ShardSink,
    };
    pub use ctxgen_core::{ContextKind, Event, FeatureParams, HistorySequence, Shard};
}
