//! Parallel execution of shards.
//!
//! [`ShardScheduler`] partitions the log, runs every shard on a dedicated
//! rayon pool and hands each completed [`ShardBuffers`] to a [`ShardSink`].
//! Workers share the read-only [`EventLogStore`] through an `Arc` and own
//! their output buffers, so no locking happens on the hot path.
//!
//! A shard attempt fails if computing or persisting it returns an error or
//! panics. Failed shards are retried up to `max_retries` times; shards that
//! still fail are collected into [`RunError::ShardsFailed`] once every other
//! shard has finished.

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ctxgen_core::{partition, CtxgenError, FeatureParams, Shard};
use rayon::prelude::*;
use thiserror::Error;

use crate::event_log::EventLogStore;
use crate::history::HistoryExtractor;
use crate::processor::{ShardBuffers, ShardProcessor};
use crate::writer::{ShardSink, WriteError};

/// Why a single shard attempt failed.
#[derive(Error, Debug)]
pub enum ShardError {
    /// Computing the shard failed.
    #[error("compute failed: {0}")]
    Compute(#[source] CtxgenError),

    /// Persisting the shard failed.
    #[error("write failed: {0}")]
    Write(#[source] WriteError),

    /// The worker panicked.
    #[error("worker panicked: {0}")]
    Panicked(String),
}

/// A shard that did not complete.
#[derive(Debug)]
pub struct ShardFailure {
    /// The failing shard.
    pub shard: Shard,
    /// Attempts made, including the first.
    pub attempts: usize,
    /// The error of the last attempt.
    pub error: ShardError,
}

impl fmt::Display for ShardFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed after {} attempt(s): {}",
            self.shard, self.attempts, self.error
        )
    }
}

/// Errors returned by [`ShardScheduler`].
#[derive(Error, Debug)]
pub enum RunError {
    /// Invalid parameters or an impossible partition.
    #[error(transparent)]
    Core(#[from] CtxgenError),

    /// The worker pool could not be created.
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// The sink could not prepare its destination.
    #[error("Failed to prepare output: {0}")]
    Prepare(#[source] WriteError),

    /// One or more shards failed; the rest completed.
    #[error("{} of {total} shard(s) failed: {}", .failures.len(), describe(.failures))]
    ShardsFailed {
        /// Number of shards in the partition.
        total: usize,
        /// The failed shards, by index.
        failures: Vec<ShardFailure>,
        /// The shards that completed.
        completed: Vec<ShardReport>,
    },
}

fn describe(failures: &[ShardFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Outcome of a completed shard.
#[derive(Debug, Clone, PartialEq)]
pub struct ShardReport {
    /// The shard.
    pub shard: Shard,
    /// Attempts needed, including the first.
    pub attempts: usize,
    /// Wall time of the successful attempt.
    pub elapsed: Duration,
    /// Files written by the sink.
    pub artifacts: Vec<PathBuf>,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// The sampling seed the run used.
    pub seed: u64,
    /// Total rows processed.
    pub rows: usize,
    /// Per-shard outcomes, by shard index.
    pub shards: Vec<ShardReport>,
    /// Wall time of the whole run.
    pub elapsed: Duration,
}

/// Runs every shard of an event log in parallel.
#[derive(Debug, Clone)]
pub struct ShardScheduler {
    store: Arc<EventLogStore>,
    params: FeatureParams,
    seed: u64,
    shards: Vec<Shard>,
}

impl ShardScheduler {
    /// Validates `params`, partitions the log and fixes the sampling seed.
    ///
    /// Without a configured seed one is drawn at random; it is reported in
    /// the [`RunReport`] so the run can be reproduced.
    pub fn new(store: Arc<EventLogStore>, params: FeatureParams) -> Result<Self, RunError> {
        params.validate()?;
        let shards = partition(store.len(), params.shard_width)?;
        let seed = params.seed.unwrap_or_else(rand::random);
        Ok(Self {
            store,
            params,
            seed,
            shards,
        })
    }

    /// The partition this scheduler runs.
    pub fn shards(&self) -> &[Shard] {
        &self.shards
    }

    /// The effective sampling seed.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// The parameters in effect.
    pub fn params(&self) -> &FeatureParams {
        &self.params
    }

    /// Computes one shard without persisting it.
    pub fn compute(&self, shard: &Shard) -> Result<ShardBuffers, CtxgenError> {
        let extractor = HistoryExtractor::new(&self.store, &self.params, self.seed)?;
        ShardProcessor::new(extractor).process(shard)
    }

    /// Runs every shard and writes it to `sink`.
    ///
    /// Returns once all shards have finished, successfully or not.
    pub fn run(&self, sink: &dyn ShardSink) -> Result<RunReport, RunError> {
        let started = Instant::now();
        sink.prepare(&self.shards).map_err(RunError::Prepare)?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.params.num_workers)
            .thread_name(|i| format!("ctxgen-worker-{i}"))
            .build()?;

        tracing::info!(
            rows = self.store.len(),
            shards = self.shards.len(),
            workers = pool.current_num_threads(),
            seed = self.seed,
            feature_length = self.params.feature_length,
            "Starting feature generation"
        );

        let outcomes: Vec<Result<ShardReport, ShardFailure>> = pool.install(|| {
            self.shards
                .par_iter()
                .map(|shard| self.run_shard(shard, sink))
                .collect()
        });

        let (completed, failures): (Vec<_>, Vec<_>) =
            outcomes.into_iter().partition(Result::is_ok);
        let completed: Vec<ShardReport> = completed.into_iter().filter_map(Result::ok).collect();
        let failures: Vec<ShardFailure> = failures.into_iter().filter_map(Result::err).collect();

        if !failures.is_empty() {
            for failure in &failures {
                tracing::error!(shard = %failure.shard, attempts = failure.attempts, error = %failure.error, "Shard failed");
            }
            return Err(RunError::ShardsFailed {
                total: self.shards.len(),
                failures,
                completed,
            });
        }

        let report = RunReport {
            seed: self.seed,
            rows: self.store.len(),
            shards: completed,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            shards = report.shards.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Feature generation complete"
        );
        Ok(report)
    }

    fn run_shard(&self, shard: &Shard, sink: &dyn ShardSink) -> Result<ShardReport, ShardFailure> {
        let max_attempts = self.params.max_retries + 1;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let started = Instant::now();
            tracing::debug!(shard = %shard, attempt, "Processing shard");

            match self.attempt(shard, sink) {
                Ok(artifacts) => {
                    let elapsed = started.elapsed();
                    tracing::info!(
                        shard = %shard,
                        rows = shard.len(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Shard complete"
                    );
                    return Ok(ShardReport {
                        shard: *shard,
                        attempts: attempt,
                        elapsed,
                        artifacts,
                    });
                }
                Err(error) if attempt < max_attempts => {
                    tracing::warn!(shard = %shard, attempt, error = %error, "Shard failed, retrying");
                }
                Err(error) => {
                    return Err(ShardFailure {
                        shard: *shard,
                        attempts: attempt,
                        error,
                    });
                }
            }
        }
    }

    fn attempt(&self, shard: &Shard, sink: &dyn ShardSink) -> Result<Vec<PathBuf>, ShardError> {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let buffers = self.compute(shard).map_err(ShardError::Compute)?;
            sink.write(&buffers).map_err(ShardError::Write)
        }));
        outcome.unwrap_or_else(|payload| Err(ShardError::Panicked(panic_message(payload))))
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    use ctxgen_core::{ContextKind, Event};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use crate::event_log::EventLog;

    #[derive(Default)]
    struct CollectingSink {
        written: Mutex<Vec<ShardBuffers>>,
    }

    impl CollectingSink {
        fn sorted(&self) -> Vec<ShardBuffers> {
            let mut out = self.written.lock().unwrap().clone();
            out.sort_by_key(|b| b.shard().index);
            out
        }
    }

    impl ShardSink for CollectingSink {
        fn write(&self, buffers: &ShardBuffers) -> crate::writer::Result<Vec<PathBuf>> {
            self.written.lock().unwrap().push(buffers.clone());
            Ok(Vec::new())
        }
    }

    /// Fails the first `failures` attempts of shard `target`.
    struct FlakySink {
        target: usize,
        failures: usize,
        seen: Mutex<usize>,
        inner: CollectingSink,
    }

    impl ShardSink for FlakySink {
        fn write(&self, buffers: &ShardBuffers) -> crate::writer::Result<Vec<PathBuf>> {
            if buffers.shard().index == self.target {
                let mut seen = self.seen.lock().unwrap();
                *seen += 1;
                if *seen <= self.failures {
                    return Err(CtxgenError::schema("disk full").into());
                }
            }
            self.inner.write(buffers)
        }
    }

    struct PanickingSink {
        target: usize,
    }

    impl ShardSink for PanickingSink {
        fn write(&self, buffers: &ShardBuffers) -> crate::writer::Result<Vec<PathBuf>> {
            if buffers.shard().index == self.target {
                panic!("boom on shard {}", self.target);
            }
            Ok(Vec::new())
        }
    }

    fn random_store(n: usize) -> Arc<EventLogStore> {
        let mut rng = StdRng::seed_from_u64(7);
        let log: EventLog = (0..n)
            .map(|i| {
                Event::new(
                    rng.gen_range(0..20),
                    rng.gen_range(0..30),
                    f32::from(rng.gen_range(1..=5u8)),
                    rng.gen_range(0..50) + i as i64 % 3,
                )
            })
            .collect();
        Arc::new(EventLogStore::build(log))
    }

    fn params(workers: usize) -> FeatureParams {
        FeatureParams::builder()
            .feature_length(4)
            .shard_width(37)
            .seed(11)
            .num_workers(workers)
            .build()
            .unwrap()
    }

    #[test]
    fn test_output_independent_of_worker_count() {
        let store = random_store(300);
        let single = CollectingSink::default();
        let many = CollectingSink::default();
        ShardScheduler::new(store.clone(), params(1))
            .unwrap()
            .run(&single)
            .unwrap();
        let report = ShardScheduler::new(store, params(4))
            .unwrap()
            .run(&many)
            .unwrap();

        assert_eq!(report.shards.len(), 9);
        assert_eq!(report.rows, 300);
        assert_eq!(report.seed, 11);
        assert_eq!(single.sorted(), many.sorted());
    }

    #[test]
    fn test_every_row_covered_once() {
        let store = random_store(100);
        let sink = CollectingSink::default();
        let scheduler = ShardScheduler::new(store, params(3)).unwrap();
        scheduler.run(&sink).unwrap();
        let mut rows = HashSet::new();
        for buffers in sink.sorted() {
            for row in buffers.shard().rows() {
                assert!(rows.insert(row));
            }
            assert_eq!(
                buffers.lengths(ContextKind::POSITIVE_ITEM).len(),
                buffers.shard().len()
            );
        }
        assert_eq!(rows.len(), 100);
    }

    #[test]
    fn test_retry_recovers_transient_failure() {
        let store = random_store(100);
        let sink = FlakySink {
            target: 1,
            failures: 1,
            seen: Mutex::new(0),
            inner: CollectingSink::default(),
        };
        let mut params = params(2);
        params.max_retries = 1;
        let report = ShardScheduler::new(store, params).unwrap().run(&sink).unwrap();
        let shard_1 = report.shards.iter().find(|r| r.shard.index == 1).unwrap();
        assert_eq!(shard_1.attempts, 2);
        assert_eq!(sink.inner.sorted().len(), 3);
    }

    #[test]
    fn test_failure_reported_without_retries() {
        let store = random_store(100);
        let sink = FlakySink {
            target: 2,
            failures: usize::MAX,
            seen: Mutex::new(0),
            inner: CollectingSink::default(),
        };
        let err = ShardScheduler::new(store, params(2))
            .unwrap()
            .run(&sink)
            .unwrap_err();
        match err {
            RunError::ShardsFailed {
                total,
                failures,
                completed,
            } => {
                assert_eq!(total, 3);
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].shard.index, 2);
                assert_eq!(failures[0].attempts, 1);
                assert_eq!(completed.len(), 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_panicking_worker_is_reported() {
        let store = random_store(100);
        let err = ShardScheduler::new(store, params(2))
            .unwrap()
            .run(&PanickingSink { target: 0 })
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("1 of 3 shard(s) failed"), "{message}");
        assert!(message.contains("boom on shard 0"), "{message}");
        assert!(message.contains("[0, 37)"), "{message}");
    }

    #[test]
    fn test_empty_log_runs_no_shards() {
        let store = Arc::new(EventLogStore::build(EventLog::new()));
        let sink = CollectingSink::default();
        let report = ShardScheduler::new(store, params(1)).unwrap().run(&sink).unwrap();
        assert!(report.shards.is_empty());
        assert!(sink.sorted().is_empty());
    }

    #[test]
    fn test_random_seed_is_reported() {
        let store = random_store(10);
        let mut params = params(1);
        params.seed = None;
        let scheduler = ShardScheduler::new(store, params).unwrap();
        let report = scheduler.run(&CollectingSink::default()).unwrap();
        assert_eq!(report.seed, scheduler.seed());
    }
}
