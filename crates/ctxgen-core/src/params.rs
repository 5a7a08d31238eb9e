//! Configuration for context feature generation.
//!
//! [`FeatureParams`] carries every knob the engine honors: sequence capacity,
//! shard width, sampling seed, rating threshold, current-event policy,
//! history scope and worker settings. It is serde-(de)serializable so it can
//! be read from a JSON config file, and is validated before any work starts.

use serde::{Deserialize, Serialize};

use crate::error::{CtxgenError, Result};
use crate::event::DEFAULT_POSITIVE_THRESHOLD;
use crate::shard::DEFAULT_SHARD_WIDTH;

/// Default history capacity.
pub const DEFAULT_FEATURE_LENGTH: usize = 128;

/// Whether an event's own row may appear in its history sequences.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurrentEventPolicy {
    /// Drop the triggering row from all four of its sequences.
    #[default]
    Exclude,
    /// Keep the triggering row like any other interaction.
    Include,
}

/// Which interactions of a key count as history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryScope {
    /// Every interaction in the log, regardless of time.
    #[default]
    Full,
    /// Only interactions ordered strictly before the event by
    /// `(timestamp, row)`.
    Prior,
}

/// Parameters of a feature generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureParams {
    /// Capacity of every history sequence.
    pub feature_length: usize,

    /// Rows per shard.
    pub shard_width: usize,

    /// Seed for the sampling step. `None` draws a fresh seed per run.
    pub seed: Option<u64>,

    /// Ratings at or above this value are positive.
    pub positive_threshold: f32,

    /// Self-inclusion policy.
    pub current_event: CurrentEventPolicy,

    /// History scope.
    pub scope: HistoryScope,

    /// Worker threads; 0 means one per available CPU.
    pub num_workers: usize,

    /// Extra attempts for a failed shard before the run fails.
    pub max_retries: usize,
}

impl Default for FeatureParams {
    fn default() -> Self {
        Self {
            feature_length: DEFAULT_FEATURE_LENGTH,
            shard_width: DEFAULT_SHARD_WIDTH,
            seed: None,
            positive_threshold: DEFAULT_POSITIVE_THRESHOLD,
            current_event: CurrentEventPolicy::default(),
            scope: HistoryScope::default(),
            num_workers: 0,
            max_retries: 0,
        }
    }
}

impl FeatureParams {
    /// Creates a builder starting from the defaults.
    pub fn builder() -> FeatureParamsBuilder {
        FeatureParamsBuilder::default()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.feature_length == 0 {
            return Err(CtxgenError::config(
                "feature_length must be greater than 0",
            ));
        }

        if self.shard_width == 0 {
            return Err(CtxgenError::config("shard_width must be greater than 0"));
        }

        if !self.positive_threshold.is_finite() {
            return Err(CtxgenError::config(format!(
                "positive_threshold must be finite, got {}",
                self.positive_threshold
            )));
        }

        Ok(())
    }
}

/// Builder for [`FeatureParams`].
#[derive(Debug, Default)]
pub struct FeatureParamsBuilder {
    params: FeatureParams,
}

impl FeatureParamsBuilder {
    /// Sets the history capacity.
    pub fn feature_length(mut self, feature_length: usize) -> Self {
        self.params.feature_length = feature_length;
        self
    }

    /// Sets the shard width.
    pub fn shard_width(mut self, shard_width: usize) -> Self {
        self.params.shard_width = shard_width;
        self
    }

    /// Fixes the sampling seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.params.seed = Some(seed);
        self
    }

    /// Sets the positive rating threshold.
    pub fn positive_threshold(mut self, threshold: f32) -> Self {
        self.params.positive_threshold = threshold;
        self
    }

    /// Sets the self-inclusion policy.
    pub fn current_event(mut self, policy: CurrentEventPolicy) -> Self {
        self.params.current_event = policy;
        self
    }

    /// Sets the history scope.
    pub fn scope(mut self, scope: HistoryScope) -> Self {
        self.params.scope = scope;
        self
    }

    /// Sets the worker count.
    pub fn num_workers(mut self, num_workers: usize) -> Self {
        self.params.num_workers = num_workers;
        self
    }

    /// Sets the per-shard retry budget.
    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.params.max_retries = max_retries;
        self
    }

    /// Builds the configuration, validating it first.
    pub fn build(self) -> Result<FeatureParams> {
        self.params.validate()?;
        Ok(self.params)
    }
}
