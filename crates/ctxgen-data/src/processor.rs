//! Shard processing: one [`EventFeatureRecord`] per row of a [`Shard`].
//!
//! [`ShardProcessor`] drives the [`HistoryExtractor`] four times per row and
//! fills a [`ShardBuffers`] owned by that shard alone. Buffers are flat,
//! row-major arrays ready to be persisted without copying; row `i` of every
//! array belongs to row `shard.start + i` of the log.

use ctxgen_core::{
    label_for, ContextKind, CtxgenError, Event, HistorySequence, Result, RowIndex, Shard,
    SENTINEL,
};

use crate::history::HistoryExtractor;

/// Output arrays of one shard.
#[derive(Debug, Clone, PartialEq)]
pub struct ShardBuffers {
    shard: Shard,
    feature_length: usize,
    contexts: [Vec<i64>; 4],
    lengths: [Vec<i64>; 4],
    labels: Vec<u8>,
}

impl ShardBuffers {
    /// Allocates sentinel-filled buffers for `shard`.
    pub fn new(shard: Shard, feature_length: usize) -> Self {
        let rows = shard.len();
        Self {
            shard,
            feature_length,
            contexts: std::array::from_fn(|_| vec![SENTINEL; rows * feature_length]),
            lengths: std::array::from_fn(|_| vec![0; rows]),
            labels: vec![0; rows],
        }
    }

    /// The shard these buffers belong to.
    pub fn shard(&self) -> &Shard {
        &self.shard
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.labels.len()
    }

    /// Capacity of every sequence.
    pub fn feature_length(&self) -> usize {
        self.feature_length
    }

    /// Row-major `[rows, feature_length]` values of `kind`.
    pub fn context(&self, kind: ContextKind) -> &[i64] {
        &self.contexts[kind.index()]
    }

    /// Per-row lengths of `kind`.
    pub fn lengths(&self, kind: ContextKind) -> &[i64] {
        &self.lengths[kind.index()]
    }

    /// Per-row binary labels.
    pub fn labels(&self) -> &[u8] {
        &self.labels
    }

    /// The `kind` sequence at `offset` within the shard.
    pub fn sequence(&self, offset: usize, kind: ContextKind) -> Option<HistorySequence> {
        let length = usize::try_from(*self.lengths(kind).get(offset)?).ok()?;
        let start = offset * self.feature_length;
        let values = self.context(kind)[start..start + self.feature_length].to_vec();
        HistorySequence::from_padded(values, length).ok()
    }

    /// Checks that every array agrees with the shard's row count.
    pub fn check_shape(&self) -> Result<()> {
        let rows = self.shard.len();
        if self.labels.len() != rows {
            return Err(CtxgenError::schema(format!(
                "{}: {} labels for {rows} rows",
                self.shard,
                self.labels.len()
            )));
        }
        for kind in ContextKind::ALL {
            let values = self.context(kind).len();
            let lengths = self.lengths(kind).len();
            if values != rows * self.feature_length || lengths != rows {
                return Err(CtxgenError::schema(format!(
                    "{}: {kind} has {values} values and {lengths} lengths, expected {} and {rows}",
                    self.shard,
                    rows * self.feature_length
                )));
            }
        }
        Ok(())
    }

    fn slot_mut(&mut self, offset: usize, kind: ContextKind) -> &mut [i64] {
        let start = offset * self.feature_length;
        &mut self.contexts[kind.index()][start..start + self.feature_length]
    }
}

/// The complete feature set of one event row.
#[derive(Debug, Clone, PartialEq)]
pub struct EventFeatureRecord {
    /// Row of the event in the log.
    pub row: RowIndex,
    /// The event itself.
    pub event: Event,
    /// `1` if the rating reaches the positive threshold.
    pub label: u8,
    /// The four histories, indexed like [`ContextKind::ALL`].
    pub contexts: [HistorySequence; 4],
}

impl EventFeatureRecord {
    /// The history of `kind`.
    pub fn context(&self, kind: ContextKind) -> &HistorySequence {
        &self.contexts[kind.index()]
    }
}

/// Computes every row of a shard.
#[derive(Debug, Clone)]
pub struct ShardProcessor<'a> {
    extractor: HistoryExtractor<'a>,
}

impl<'a> ShardProcessor<'a> {
    /// Wraps an extractor.
    pub fn new(extractor: HistoryExtractor<'a>) -> Self {
        Self { extractor }
    }

    /// Computes the record of a single row.
    pub fn record(&self, row: RowIndex) -> Option<EventFeatureRecord> {
        let event = self.extractor.store().log().event(row)?;
        Some(EventFeatureRecord {
            row,
            event,
            label: event.label(self.extractor.threshold()),
            contexts: ContextKind::ALL.map(|kind| self.extractor.extract(row, kind)),
        })
    }

    /// Computes all rows of `shard`, in row order.
    ///
    /// # Errors
    ///
    /// Returns [`CtxgenError::SchemaMismatch`] if the shard reaches past the
    /// end of the log.
    pub fn process(&self, shard: &Shard) -> Result<ShardBuffers> {
        let log = self.extractor.store().log();
        if shard.end > log.len() || shard.start > shard.end {
            return Err(CtxgenError::schema(format!(
                "{shard} is outside the event log of {} rows",
                log.len()
            )));
        }

        let threshold = self.extractor.threshold();
        let mut buffers = ShardBuffers::new(*shard, self.extractor.feature_length());
        let ratings = &log.ratings()[shard.rows()];

        for (offset, row) in shard.rows().enumerate() {
            for kind in ContextKind::ALL {
                let length = self
                    .extractor
                    .extract_into(row, kind, buffers.slot_mut(offset, kind));
                buffers.lengths[kind.index()][offset] = length as i64;
            }
            buffers.labels[offset] = label_for(ratings[offset], threshold);
        }

        Ok(buffers)
    }
}
