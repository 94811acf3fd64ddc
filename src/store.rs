// Generic in-memory item store

use crate::filter::SearchQuery;
use crate::record::{Completable, DraftError, Record};
use chrono::Utc;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Insertion-ordered collection of one record kind
///
/// The store owns every mutation of its list: ids are assigned here and
/// records are never reordered. Persistence is the caller's concern (see
/// `Organizer`), so the store itself never touches a backend.
#[derive(Debug, Clone)]
pub struct ItemStore<T: Record> {
    items: Vec<T>,
    ids: IdClock,
}

impl<T: Record> Default for ItemStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> ItemStore<T> {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            ids: IdClock::default(),
        }
    }

    /// Build a store from previously persisted records
    ///
    /// Order is kept. Records whose id repeats an earlier one are re-keyed so
    /// ids stay unique within the list.
    pub fn from_items(items: Vec<T>) -> Self {
        let max_id = items.iter().map(|r| r.id()).max().unwrap_or(0);
        let mut ids = IdClock::seeded(max_id);
        let mut taken: HashSet<i64> = items.iter().map(|r| r.id()).collect();
        let mut seen = HashSet::with_capacity(items.len());

        let items = items
            .into_iter()
            .map(|mut record| {
                if !seen.insert(record.id()) {
                    let fresh = ids.peek(|id| taken.contains(&id));
                    ids.commit(fresh);
                    taken.insert(fresh);
                    warn!(
                        slot = T::slot_name(),
                        old_id = record.id(),
                        new_id = fresh,
                        "Duplicate id in stored list, re-keying"
                    );
                    record.set_id(fresh);
                    seen.insert(fresh);
                }
                record
            })
            .collect();

        Self { items, ids }
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Validate `draft` and append the resulting record
    ///
    /// Invalid drafts are dropped without error and leave the store unchanged.
    pub fn add(&mut self, draft: T::Draft) -> Option<T> {
        match self.try_add(draft) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!(slot = T::slot_name(), reason = %e, "Draft rejected");
                None
            }
        }
    }

    /// Like `add`, but reports why a draft was rejected
    pub fn try_add(&mut self, draft: T::Draft) -> Result<T, DraftError> {
        let items = &self.items;
        let id = self.ids.peek(|id| items.iter().any(|r| r.id() == id));
        let record = T::from_draft(draft, id, Utc::now())?;
        self.ids.commit(id);

        self.items.push(record.clone());
        debug!(
            slot = T::slot_name(),
            id,
            len = self.items.len(),
            "Record added"
        );
        Ok(record)
    }

    /// Delete the record with `id`; returns whether one was removed
    pub fn remove(&mut self, id: i64) -> bool {
        match self.items.iter().position(|r| r.id() == id) {
            Some(index) => {
                self.items.remove(index);
                debug!(slot = T::slot_name(), id, "Record removed");
                true
            }
            None => false,
        }
    }

    /// Replace the whole list, as an import does
    pub fn replace(&mut self, items: Vec<T>) {
        *self = Self::from_items(items);
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Records whose primary text contains `query`, ignoring case
    ///
    /// An empty query yields every record. The iterator is rebuilt on each
    /// call and walks the list in insertion order.
    pub fn filter<'a>(&'a self, query: &str) -> impl Iterator<Item = &'a T> + use<'a, T> {
        let query = SearchQuery::new(query);
        self.items.iter().filter(move |record| query.matches_record(*record))
    }

    pub fn get(&self, id: i64) -> Option<&T> {
        self.items.iter().find(|r| r.id() == id)
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: Record + Completable> ItemStore<T> {
    /// Flip the `done` flag of the record with `id`
    ///
    /// Returns the new value, or `None` when no record has that id.
    pub fn toggle_done(&mut self, id: i64) -> Option<bool> {
        let record = self.items.iter_mut().find(|r| r.id() == id)?;
        let done = !record.is_done();
        record.set_done(done);
        debug!(slot = T::slot_name(), id, done, "Record toggled");
        Some(done)
    }
}

/// Monotonic millisecond id source
///
/// Ids track the wall clock but never repeat: when two records are created
/// within the same millisecond the second one gets `last + 1`. Once `last`
/// reaches `i64::MAX` (only possible through stored data) the clock can no
/// longer move forward, and ids are taken from the first gap at or after the
/// current time instead.
#[derive(Debug, Clone, Default)]
struct IdClock {
    last: i64,
}

impl IdClock {
    fn seeded(last: i64) -> Self {
        Self { last }
    }

    /// Next id to hand out; `taken` reports ids already in the list
    fn peek(&self, taken: impl Fn(i64) -> bool) -> i64 {
        if let Some(next) = self.last.checked_add(1) {
            return now_ms().max(next);
        }

        let now = now_ms();
        (now..=i64::MAX)
            .chain(i64::MIN..now)
            .find(|id| !taken(*id))
            .unwrap_or(now)
    }

    fn commit(&mut self, id: i64) {
        self.last = self.last.max(id);
    }
}

// Helper function for timestamps
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
