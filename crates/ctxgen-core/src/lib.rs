//! Core types, configuration and errors for ctxgen.
//!
//! ctxgen derives bounded, time-ordered interaction histories ("context
//! features") from a flat `(user, item, rating, timestamp)` event log. This
//! crate holds the pieces every other ctxgen crate shares:
//!
//! - **Events and selectors**: [`Event`], [`Relation`], [`Polarity`] and the
//!   four [`ContextKind`]s computed per event.
//! - **History sequences**: [`HistorySequence`], a sentinel-padded,
//!   fixed-capacity id sequence.
//! - **Shards**: [`Shard`] descriptors and the [`partition`] function.
//! - **Configuration**: [`FeatureParams`] and its builder.
//! - **Errors**: [`CtxgenError`].
//!
//! # Example
//!
//! ```
//! use ctxgen_core::{partition, ContextKind, FeatureParams, HistorySequence};
//!
//! let params = FeatureParams::builder()
//!     .feature_length(4)
//!     .shard_width(1_000)
//!     .seed(42)
//!     .build()
//!     .unwrap();
//!
//! let shards = partition(2_500, params.shard_width).unwrap();
//! assert_eq!(shards.len(), 3);
//!
//! let seq = HistorySequence::from_ids(params.feature_length, &[3, 1]).unwrap();
//! assert_eq!(seq.padded(), &[3, 1, 0, 0]);
//! assert_eq!(ContextKind::ALL[0].name(), "positive_item_context");
//! ```

pub mod error;
pub mod event;
pub mod params;
pub mod sequence;
pub mod shard;

pub use error::{CtxgenError, Result};
pub use event::{
    label_for, ContextKind, Event, ItemId, Polarity, Relation, RowIndex, Timestamp, UserId,
    DEFAULT_POSITIVE_THRESHOLD, SENTINEL,
};
pub use params::{
    CurrentEventPolicy, FeatureParams, FeatureParamsBuilder, HistoryScope, DEFAULT_FEATURE_LENGTH,
};
pub use sequence::HistorySequence;
pub use shard::{partition, Shard, DEFAULT_SHARD_WIDTH};
