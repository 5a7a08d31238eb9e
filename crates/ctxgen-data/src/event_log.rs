//! Columnar event log and its by-user / by-item indexes.
//!
//! [`EventLog`] holds the raw columns in row order. [`EventLogStore`] wraps a
//! log with two posting-list indexes so that every history query is a direct
//! key lookup:
//!
//! - `by_user`: user id -> the user's interactions (counterpart = item id)
//! - `by_item`: item id -> the item's interactions (counterpart = user id)
//!
//! Each posting list is sorted once at build time by timestamp descending,
//! ties broken by ascending row index. The store is never mutated after
//! [`EventLogStore::build`], so it can be shared across worker threads behind
//! an `Arc` without locking.
//!
//! # Example
//!
//! ```
//! use ctxgen_core::{Event, Relation};
//! use ctxgen_data::event_log::{EventLog, EventLogStore};
//!
//! let log: EventLog = vec![
//!     Event::new(1, 10, 5.0, 1),
//!     Event::new(1, 11, 2.0, 2),
//!     Event::new(2, 10, 4.0, 3),
//! ]
//! .into_iter()
//! .collect();
//!
//! let store = EventLogStore::build(log);
//! let items: Vec<i64> = store.by_user(1).iter().map(|x| x.counterpart).collect();
//! assert_eq!(items, vec![11, 10]);
//! assert_eq!(store.interactions(Relation::UserContext, 10).len(), 2);
//! ```

use std::cmp::Reverse;
use std::collections::HashMap;

use ctxgen_core::{CtxgenError, Event, ItemId, Relation, Result, RowIndex, Timestamp, UserId};
use rayon::prelude::*;

/// An ordered, immutable sequence of events stored column by column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventLog {
    user_ids: Vec<UserId>,
    item_ids: Vec<ItemId>,
    ratings: Vec<f32>,
    timestamps: Vec<Timestamp>,
}

impl EventLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty log with room for `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            user_ids: Vec::with_capacity(capacity),
            item_ids: Vec::with_capacity(capacity),
            ratings: Vec::with_capacity(capacity),
            timestamps: Vec::with_capacity(capacity),
        }
    }

    /// Builds a log from parallel columns.
    ///
    /// # Errors
    ///
    /// Returns [`CtxgenError::SchemaMismatch`] if the columns differ in
    /// length.
    pub fn from_columns(
        user_ids: Vec<UserId>,
        item_ids: Vec<ItemId>,
        ratings: Vec<f32>,
        timestamps: Vec<Timestamp>,
    ) -> Result<Self> {
        let n = user_ids.len();
        if item_ids.len() != n || ratings.len() != n || timestamps.len() != n {
            return Err(CtxgenError::schema(format!(
                "event columns differ in length: user_id={}, item_id={}, rating={}, timestamp={}",
                n,
                item_ids.len(),
                ratings.len(),
                timestamps.len()
            )));
        }
        Ok(Self {
            user_ids,
            item_ids,
            ratings,
            timestamps,
        })
    }

    /// Appends an event; its row index is the previous length.
    pub fn push(&mut self, event: Event) {
        self.user_ids.push(event.user_id);
        self.item_ids.push(event.item_id);
        self.ratings.push(event.rating);
        self.timestamps.push(event.timestamp);
    }

    /// Number of events.
    #[inline]
    pub fn len(&self) -> usize {
        self.user_ids.len()
    }

    /// Returns `true` if the log holds no events.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.user_ids.is_empty()
    }

    /// The event at `row`, if any.
    #[inline]
    pub fn event(&self, row: RowIndex) -> Option<Event> {
        Some(Event {
            user_id: *self.user_ids.get(row)?,
            item_id: self.item_ids[row],
            rating: self.ratings[row],
            timestamp: self.timestamps[row],
        })
    }

    /// Iterates over events in row order.
    pub fn iter(&self) -> impl Iterator<Item = Event> + '_ {
        (0..self.len()).filter_map(move |row| self.event(row))
    }

    /// The user id column.
    pub fn user_ids(&self) -> &[UserId] {
        &self.user_ids
    }

    /// The item id column.
    pub fn item_ids(&self) -> &[ItemId] {
        &self.item_ids
    }

    /// The rating column.
    pub fn ratings(&self) -> &[f32] {
        &self.ratings
    }

    /// The timestamp column.
    pub fn timestamps(&self) -> &[Timestamp] {
        &self.timestamps
    }
}

impl FromIterator<Event> for EventLog {
    fn from_iter<I: IntoIterator<Item = Event>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut log = EventLog::with_capacity(iter.size_hint().0);
        for event in iter {
            log.push(event);
        }
        log
    }
}

/// One entry of a posting list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interaction {
    /// Row of the originating event.
    pub row: RowIndex,
    /// The other side of the interaction: the item for a user's list, the
    /// user for an item's list.
    pub counterpart: i64,
    /// Rating of the originating event.
    pub rating: f32,
    /// Timestamp of the originating event.
    pub timestamp: Timestamp,
}

type PostingLists = HashMap<i64, Vec<Interaction>>;

/// A read-only event log indexed by user and by item.
#[derive(Debug, Default)]
pub struct EventLogStore {
    log: EventLog,
    by_user: PostingLists,
    by_item: PostingLists,
}

impl EventLogStore {
    /// Indexes `log`. O(N) to bucket plus a per-key sort in parallel.
    pub fn build(log: EventLog) -> Self {
        let mut by_user: PostingLists = HashMap::new();
        let mut by_item: PostingLists = HashMap::new();

        for (row, event) in log.iter().enumerate() {
            by_user.entry(event.user_id).or_default().push(Interaction {
                row,
                counterpart: event.item_id,
                rating: event.rating,
                timestamp: event.timestamp,
            });
            by_item.entry(event.item_id).or_default().push(Interaction {
                row,
                counterpart: event.user_id,
                rating: event.rating,
                timestamp: event.timestamp,
            });
        }

        // Lists are filled in row order, so a stable sort on the timestamp
        // alone keeps ties in ascending row order.
        by_user
            .par_iter_mut()
            .chain(by_item.par_iter_mut())
            .for_each(|(_, list)| list.sort_by_key(|x| Reverse(x.timestamp)));

        tracing::debug!(
            rows = log.len(),
            users = by_user.len(),
            items = by_item.len(),
            "Indexed event log"
        );

        Self {
            log,
            by_user,
            by_item,
        }
    }

    /// The underlying log.
    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Number of events.
    #[inline]
    pub fn len(&self) -> usize {
        self.log.len()
    }

    /// Returns `true` if the store holds no events.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    /// Number of distinct users.
    pub fn num_users(&self) -> usize {
        self.by_user.len()
    }

    /// Number of distinct items.
    pub fn num_items(&self) -> usize {
        self.by_item.len()
    }

    /// All interactions of `user_id`, most recent first.
    pub fn by_user(&self, user_id: UserId) -> &[Interaction] {
        self.by_user.get(&user_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All interactions with `item_id`, most recent first.
    pub fn by_item(&self, item_id: ItemId) -> &[Interaction] {
        self.by_item.get(&item_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Posting list for `key` under `relation`.
    #[inline]
    pub fn interactions(&self, relation: Relation, key: i64) -> &[Interaction] {
        match relation {
            Relation::ItemContext => self.by_user(key),
            Relation::UserContext => self.by_item(key),
        }
    }

    /// Distinct user ids, unordered.
    pub fn user_ids(&self) -> impl Iterator<Item = UserId> + '_ {
        self.by_user.keys().copied()
    }

    /// Distinct item ids, unordered.
    pub fn item_ids(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.by_item.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_log() -> EventLog {
        vec![
            Event::new(1, 100, 5.0, 30),
            Event::new(2, 100, 3.0, 10),
            Event::new(1, 101, 4.0, 10),
            Event::new(1, 102, 1.0, 30),
            Event::new(3, 101, 4.5, 20),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_from_columns_checks_lengths() {
        let err = EventLog::from_columns(vec![1, 2], vec![3], vec![1.0, 2.0], vec![0, 1])
            .unwrap_err();
        assert!(matches!(err, CtxgenError::SchemaMismatch { .. }));

        let log = EventLog::from_columns(vec![1], vec![3], vec![1.0], vec![0]).unwrap();
        assert_eq!(log.event(0), Some(Event::new(1, 3, 1.0, 0)));
        assert_eq!(log.event(1), None);
    }

    #[test]
    fn test_posting_lists_sorted_by_recency_then_row() {
        let store = EventLogStore::build(sample_log());
        let rows: Vec<usize> = store.by_user(1).iter().map(|x| x.row).collect();
        // t=30 rows 0 and 3 (row order), then t=10 row 2.
        assert_eq!(rows, vec![0, 3, 2]);

        let users: Vec<i64> = store.by_item(101).iter().map(|x| x.counterpart).collect();
        assert_eq!(users, vec![3, 1]);
    }

    #[test]
    fn test_unknown_keys_are_empty() {
        let store = EventLogStore::build(sample_log());
        assert!(store.by_user(999).is_empty());
        assert!(store.by_item(999).is_empty());
    }

    #[test]
    fn test_counts() {
        let store = EventLogStore::build(sample_log());
        assert_eq!(store.len(), 5);
        assert_eq!(store.num_users(), 3);
        assert_eq!(store.num_items(), 3);
        let total: usize = store.user_ids().map(|u| store.by_user(u).len()).sum();
        assert_eq!(total, 5);
    }

    #[test]
    fn test_store_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<EventLogStore>();
    }
}
