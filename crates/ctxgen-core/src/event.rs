//! Events and the selectors that pick history out of an event log.
//!
//! An [`Event`] is one `(user, item, rating, timestamp)` record. Histories are
//! addressed by a [`Relation`] (whose history: the user's items or the item's
//! users) and a [`Polarity`] (which side of the rating threshold). The four
//! combinations are enumerated by [`ContextKind`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CtxgenError, Result};

/// Alias for user identifiers.
pub type UserId = i64;
/// Alias for item identifiers.
pub type ItemId = i64;
/// Alias for event timestamps.
pub type Timestamp = i64;
/// Position of an event in the log. Output rows are aligned on it.
pub type RowIndex = usize;

/// Padding value for unused history slots.
///
/// Identifiers are expected to be strictly positive so the sentinel never
/// collides with a real id.
pub const SENTINEL: i64 = 0;

/// Rating threshold used by the source datasets: `rating >= 4.0` is positive.
pub const DEFAULT_POSITIVE_THRESHOLD: f32 = 4.0;

/// A single interaction record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// The acting user.
    pub user_id: UserId,
    /// The acted-upon item.
    pub item_id: ItemId,
    /// Explicit rating given by the user.
    pub rating: f32,
    /// Interaction time.
    pub timestamp: Timestamp,
}

impl Event {
    /// Creates a new event.
    pub fn new(user_id: UserId, item_id: ItemId, rating: f32, timestamp: Timestamp) -> Self {
        Self {
            user_id,
            item_id,
            rating,
            timestamp,
        }
    }

    /// Binary label of this event under `threshold`.
    #[inline]
    pub fn label(&self, threshold: f32) -> u8 {
        label_for(self.rating, threshold)
    }
}

/// Returns 1 when `rating >= threshold`, else 0.
#[inline]
pub fn label_for(rating: f32, threshold: f32) -> u8 {
    u8::from(rating >= threshold)
}

/// Whose history a context sequence describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// Items the event's user interacted with (keyed by user id).
    ItemContext,
    /// Users who interacted with the event's item (keyed by item id).
    UserContext,
}

impl Relation {
    /// Short name used in array names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::ItemContext => "item",
            Relation::UserContext => "user",
        }
    }

    /// The lookup key for `event` under this relation.
    #[inline]
    pub fn key_of(&self, event: &Event) -> i64 {
        match self {
            Relation::ItemContext => event.user_id,
            Relation::UserContext => event.item_id,
        }
    }
}

impl FromStr for Relation {
    type Err = CtxgenError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "item" | "item_context" | "ic" => Ok(Relation::ItemContext),
            "user" | "user_context" | "uc" => Ok(Relation::UserContext),
            _ => Err(CtxgenError::UnknownSelector {
                kind: "relation",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of the rating threshold an interaction falls on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// `rating >= threshold`.
    Positive,
    /// `rating < threshold`.
    Negative,
}

impl Polarity {
    /// Classifies a rating.
    #[inline]
    pub fn of(rating: f32, threshold: f32) -> Self {
        if rating >= threshold {
            Polarity::Positive
        } else {
            Polarity::Negative
        }
    }

    /// Returns `true` if `rating` belongs to this polarity.
    #[inline]
    pub fn matches(&self, rating: f32, threshold: f32) -> bool {
        Self::of(rating, threshold) == *self
    }

    /// Short name used in array names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Polarity::Positive => "positive",
            Polarity::Negative => "negative",
        }
    }
}

impl FromStr for Polarity {
    type Err = CtxgenError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" | "pos" => Ok(Polarity::Positive),
            "negative" | "neg" => Ok(Polarity::Negative),
            _ => Err(CtxgenError::UnknownSelector {
                kind: "polarity",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the four history sequences computed per event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextKind {
    /// Whose history.
    pub relation: Relation,
    /// Which ratings.
    pub polarity: Polarity,
}

impl ContextKind {
    /// Items the user rated at or above the threshold.
    pub const POSITIVE_ITEM: ContextKind = ContextKind::new(Relation::ItemContext, Polarity::Positive);
    /// Items the user rated below the threshold.
    pub const NEGATIVE_ITEM: ContextKind = ContextKind::new(Relation::ItemContext, Polarity::Negative);
    /// Users who rated the item at or above the threshold.
    pub const POSITIVE_USER: ContextKind = ContextKind::new(Relation::UserContext, Polarity::Positive);
    /// Users who rated the item below the threshold.
    pub const NEGATIVE_USER: ContextKind = ContextKind::new(Relation::UserContext, Polarity::Negative);

    /// All kinds, in output order.
    pub const ALL: [ContextKind; 4] = [
        Self::POSITIVE_ITEM,
        Self::NEGATIVE_ITEM,
        Self::POSITIVE_USER,
        Self::NEGATIVE_USER,
    ];

    /// Creates a context kind.
    pub const fn new(relation: Relation, polarity: Polarity) -> Self {
        Self { relation, polarity }
    }

    /// Position of this kind in [`ContextKind::ALL`].
    #[inline]
    pub fn index(&self) -> usize {
        match (self.relation, self.polarity) {
            (Relation::ItemContext, Polarity::Positive) => 0,
            (Relation::ItemContext, Polarity::Negative) => 1,
            (Relation::UserContext, Polarity::Positive) => 2,
            (Relation::UserContext, Polarity::Negative) => 3,
        }
    }

    /// Array name of the padded values, e.g. `positive_item_context`.
    pub fn name(&self) -> String {
        format!("{}_{}_context", self.polarity, self.relation)
    }

    /// Array name of the lengths, e.g. `positive_item_context_length`.
    pub fn length_name(&self) -> String {
        format!("{}_length", self.name())
    }
}

impl FromStr for ContextKind {
    type Err = CtxgenError;

    /// Parses `<polarity>_<relation>[_context]`, e.g. `negative_user_context`.
    fn from_str(s: &str) -> Result<Self> {
        let unknown = || CtxgenError::UnknownSelector {
            kind: "context",
            value: s.to_string(),
        };
        let lowered = s.trim().to_ascii_lowercase();
        let body = lowered.strip_suffix("_context").unwrap_or(&lowered);
        let (polarity, relation) = body.split_once('_').ok_or_else(unknown)?;
        Ok(ContextKind::new(
            relation.parse().map_err(|_| unknown())?,
            polarity.parse().map_err(|_| unknown())?,
        ))
    }
}

impl fmt::Display for ContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}
