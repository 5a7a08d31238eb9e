//! Passthrough sparse attributes copied verbatim into the record table.
//!
//! Datasets may carry per-user attributes (gender, age, occupation) and
//! per-item attributes (title, genre). They play no part in history
//! extraction; the writer looks them up by id for every output row.

use std::collections::HashMap;

use ctxgen_core::{CtxgenError, Event, ItemId, Result, UserId};

use crate::event_log::EventLog;

/// A keyed table of string-valued attribute columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeTable {
    columns: Vec<String>,
    rows: HashMap<i64, Vec<String>>,
}

impl AttributeTable {
    /// Creates an empty table with the given column names.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: HashMap::new(),
        }
    }

    /// Inserts or replaces the row for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CtxgenError::SchemaMismatch`] if `values` does not match the
    /// column count.
    pub fn insert(&mut self, key: i64, values: Vec<String>) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(CtxgenError::schema(format!(
                "attribute row for id {key} has {} values, expected {} ({})",
                values.len(),
                self.columns.len(),
                self.columns.join(", ")
            )));
        }
        self.rows.insert(key, values);
        Ok(())
    }

    /// Column names, in output order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// The row for `key`.
    pub fn get(&self, key: i64) -> Option<&[String]> {
        self.rows.get(&key).map(Vec::as_slice)
    }

    /// Number of keyed rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the table has no columns; such a table contributes
    /// nothing and is never validated against the log.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    fn missing_keys<'a>(&self, keys: impl Iterator<Item = &'a i64>) -> Vec<i64> {
        let mut missing: Vec<i64> = keys
            .filter(|k| !self.rows.contains_key(*k))
            .copied()
            .collect();
        missing.sort_unstable();
        missing.dedup();
        missing
    }
}

/// User and item attribute tables of a dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassthroughAttributes {
    /// Attributes keyed by user id.
    pub user: AttributeTable,
    /// Attributes keyed by item id.
    pub item: AttributeTable,
}

impl PassthroughAttributes {
    /// No passthrough columns.
    pub fn none() -> Self {
        Self::default()
    }

    /// All passthrough column names: user columns, then item columns.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.user
            .columns()
            .iter()
            .chain(self.item.columns())
            .map(String::as_str)
    }

    /// Number of passthrough columns.
    pub fn width(&self) -> usize {
        self.user.columns().len() + self.item.columns().len()
    }

    /// Appends the attribute values of `event` to `out`.
    ///
    /// Ids without a row contribute empty strings; [`Self::validate`] rejects
    /// that case before any shard is dispatched.
    pub fn extend_values<'a>(&'a self, event: &Event, out: &mut Vec<&'a str>) {
        Self::extend_from(&self.user, event.user_id, out);
        Self::extend_from(&self.item, event.item_id, out);
    }

    fn extend_from<'a>(table: &'a AttributeTable, key: i64, out: &mut Vec<&'a str>) {
        match table.get(key) {
            Some(values) => out.extend(values.iter().map(String::as_str)),
            None => out.extend(std::iter::repeat("").take(table.columns().len())),
        }
    }

    /// Checks that every user and item in `log` has an attribute row in each
    /// non-empty table.
    pub fn validate(&self, log: &EventLog) -> Result<()> {
        Self::validate_table(&self.user, "user", log.user_ids())?;
        Self::validate_table(&self.item, "item", log.item_ids())
    }

    fn validate_table(table: &AttributeTable, what: &str, keys: &[i64]) -> Result<()> {
        if table.is_empty() {
            return Ok(());
        }
        let missing = table.missing_keys(keys.iter());
        if missing.is_empty() {
            return Ok(());
        }
        let preview: Vec<String> = missing.iter().take(5).map(i64::to_string).collect();
        Err(CtxgenError::schema(format!(
            "{} {what} id(s) have no attribute row (e.g. {})",
            missing.len(),
            preview.join(", ")
        )))
    }

    /// Convenience lookup for a user's attributes.
    pub fn user_row(&self, user_id: UserId) -> Option<&[String]> {
        self.user.get(user_id)
    }

    /// Convenience lookup for an item's attributes.
    pub fn item_row(&self, item_id: ItemId) -> Option<&[String]> {
        self.item.get(item_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attributes() -> PassthroughAttributes {
        let mut user = AttributeTable::new(["gender", "age"]);
        user.insert(1, vec!["0".into(), "25".into()]).unwrap();
        let mut item = AttributeTable::new(["movie_name"]);
        item.insert(10, vec!["Heat (1995)".into()]).unwrap();
        PassthroughAttributes { user, item }
    }

    #[test]
    fn test_insert_checks_width() {
        let mut table = AttributeTable::new(["a", "b"]);
        assert!(table.insert(1, vec!["x".into()]).is_err());
        assert!(table.insert(1, vec!["x".into(), "y".into()]).is_ok());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_columns_and_values() {
        let attrs = attributes();
        let cols: Vec<&str> = attrs.columns().collect();
        assert_eq!(cols, vec!["gender", "age", "movie_name"]);

        let mut out = Vec::new();
        attrs.extend_values(&Event::new(1, 10, 5.0, 0), &mut out);
        assert_eq!(out, vec!["0", "25", "Heat (1995)"]);

        out.clear();
        attrs.extend_values(&Event::new(2, 10, 5.0, 0), &mut out);
        assert_eq!(out, vec!["", "", "Heat (1995)"]);
    }

    #[test]
    fn test_validate_reports_missing_ids() {
        let attrs = attributes();
        let ok: EventLog = vec![Event::new(1, 10, 5.0, 0)].into_iter().collect();
        assert!(attrs.validate(&ok).is_ok());

        let bad: EventLog = vec![Event::new(1, 10, 5.0, 0), Event::new(2, 10, 1.0, 1)]
            .into_iter()
            .collect();
        let err = attrs.validate(&bad).unwrap_err();
        assert!(err.to_string().contains("1 user id(s)"));
    }

    #[test]
    fn test_empty_tables_skip_validation() {
        let log: EventLog = vec![Event::new(5, 6, 1.0, 0)].into_iter().collect();
        assert!(PassthroughAttributes::none().validate(&log).is_ok());
        assert_eq!(PassthroughAttributes::none().width(), 0);
    }
}
