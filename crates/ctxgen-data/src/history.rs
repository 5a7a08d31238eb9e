//! Per-event history extraction.
//!
//! For an event row and a [`ContextKind`], the [`HistoryExtractor`]:
//!
//! 1. looks up the posting list of the event's user (item context) or item
//!    (user context) in the [`EventLogStore`];
//! 2. keeps interactions of the requested polarity, applying the configured
//!    [`CurrentEventPolicy`] and [`HistoryScope`];
//! 3. keeps the store's ordering: most recent first, ties by row;
//! 4. if more than `feature_length` candidates remain, draws exactly
//!    `feature_length` of them uniformly without replacement and emits them in
//!    draw order; otherwise emits all of them in recency order;
//! 5. pads the rest of the buffer with the sentinel.
//!
//! Sampling uses a [`StdRng`] seeded from the run seed, the row and the
//! context kind, so a row's output does not depend on which shard or thread
//! computed it.
//!
//! # Example
//!
//! ```
//! use ctxgen_core::{ContextKind, Event, FeatureParams};
//! use ctxgen_data::event_log::{EventLog, EventLogStore};
//! use ctxgen_data::history::HistoryExtractor;
//!
//! let log: EventLog = vec![
//!     Event::new(1, 10, 5.0, 1),
//!     Event::new(1, 11, 2.0, 2),
//!     Event::new(1, 12, 5.0, 3),
//! ]
//! .into_iter()
//! .collect();
//! let store = EventLogStore::build(log);
//! let params = FeatureParams::builder().feature_length(10).seed(1).build().unwrap();
//! let extractor = HistoryExtractor::new(&store, &params, 1).unwrap();
//!
//! let positive = extractor.extract(2, ContextKind::POSITIVE_ITEM);
//! assert_eq!(positive.ids(), &[10]);
//! let negative = extractor.extract(2, ContextKind::NEGATIVE_ITEM);
//! assert_eq!(negative.ids(), &[11]);
//! ```

use ctxgen_core::{
    ContextKind, CurrentEventPolicy, FeatureParams, HistoryScope, HistorySequence, Result,
    RowIndex, SENTINEL,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::event_log::{EventLogStore, Interaction};

/// Derives the sampling seed for one `(row, kind)` pair (SplitMix64 finalizer).
pub fn sampling_seed(seed: u64, row: RowIndex, kind: ContextKind) -> u64 {
    let mut z = seed
        ^ (row as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ ((kind.index() as u64 + 1) << 56);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Computes capped history sequences against a shared [`EventLogStore`].
#[derive(Debug, Clone)]
pub struct HistoryExtractor<'a> {
    store: &'a EventLogStore,
    feature_length: usize,
    threshold: f32,
    current_event: CurrentEventPolicy,
    scope: HistoryScope,
    seed: u64,
}

impl<'a> HistoryExtractor<'a> {
    /// Creates an extractor. `seed` is the resolved run seed.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `params` fails validation.
    pub fn new(store: &'a EventLogStore, params: &FeatureParams, seed: u64) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            store,
            feature_length: params.feature_length,
            threshold: params.positive_threshold,
            current_event: params.current_event,
            scope: params.scope,
            seed,
        })
    }

    /// The store queried by this extractor.
    pub fn store(&self) -> &'a EventLogStore {
        self.store
    }

    /// Capacity of every produced sequence.
    pub fn feature_length(&self) -> usize {
        self.feature_length
    }

    /// The positive rating threshold.
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Computes the `kind` history of the event at `row`.
    pub fn extract(&self, row: RowIndex, kind: ContextKind) -> HistorySequence {
        let mut values = vec![SENTINEL; self.feature_length];
        let length = self.extract_into(row, kind, &mut values);
        let mut ids = values;
        ids.truncate(length);
        // `extract_into` never exceeds the buffer it was given.
        HistorySequence::from_ids(self.feature_length, &ids)
            .unwrap_or_else(|_| HistorySequence::empty(self.feature_length))
    }

    /// Writes the `kind` history of the event at `row` into `out` and returns
    /// its length.
    ///
    /// `out` is the fixed-capacity slot for this sequence; every position at
    /// or past the returned length is set to the sentinel. A row outside the
    /// log yields an empty history.
    pub(crate) fn extract_into(&self, row: RowIndex, kind: ContextKind, out: &mut [i64]) -> usize {
        debug_assert_eq!(out.len(), self.feature_length);
        let capacity = out.len();

        let Some(event) = self.store.log().event(row) else {
            tracing::debug!(row, "Row outside the event log, emitting empty history");
            out.fill(SENTINEL);
            return 0;
        };

        let postings = self.store.interactions(kind.relation, kind.relation.key_of(&event));
        let candidates: Vec<i64> = postings
            .iter()
            .filter(|x| self.qualifies(x, row, event.timestamp, kind))
            .map(|x| x.counterpart)
            .collect();

        let length = if candidates.len() > capacity {
            let mut rng = StdRng::seed_from_u64(sampling_seed(self.seed, row, kind));
            let picked = rand::seq::index::sample(&mut rng, candidates.len(), capacity);
            for (slot, idx) in out.iter_mut().zip(picked.iter()) {
                *slot = candidates[idx];
            }
            capacity
        } else {
            out[..candidates.len()].copy_from_slice(&candidates);
            candidates.len()
        };

        out[length..].fill(SENTINEL);
        length
    }

    #[inline]
    fn qualifies(
        &self,
        interaction: &Interaction,
        row: RowIndex,
        timestamp: i64,
        kind: ContextKind,
    ) -> bool {
        if !kind.polarity.matches(interaction.rating, self.threshold) {
            return false;
        }
        if self.current_event == CurrentEventPolicy::Exclude && interaction.row == row {
            return false;
        }
        match self.scope {
            HistoryScope::Full => true,
            HistoryScope::Prior => (interaction.timestamp, interaction.row) < (timestamp, row),
        }
    }
}
