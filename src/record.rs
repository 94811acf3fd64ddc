// Generic record trait for the organizer's lists

use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};

/// Core trait that any list entry must implement
pub trait Record: Serialize + DeserializeOwned + Clone + 'static {
    /// User input accepted by `ItemStore::add`
    type Draft;

    /// Unique identifier within this record's own list
    fn id(&self) -> i64;

    /// Re-key a record; only used to repair duplicate ids found in stored data
    fn set_id(&mut self, id: i64);

    /// Primary text searched by `ItemStore::filter`
    fn search_text(&self) -> &str;

    /// Slot name this list is persisted under (e.g., "tasks")
    fn slot_name() -> &'static str
    where
        Self: Sized;

    /// Slot name used by older data exports, consulted when `slot_name()` is absent
    fn legacy_slot_name() -> Option<&'static str>
    where
        Self: Sized,
    {
        None
    }

    /// Validate a draft and build the record from it
    fn from_draft(draft: Self::Draft, id: i64, now: DateTime<Utc>) -> Result<Self, DraftError>
    where
        Self: Sized;
}

/// Records carrying a `done` flag that can be flipped in place
pub trait Completable {
    fn is_done(&self) -> bool;
    fn set_done(&mut self, done: bool);
}

/// Why a draft was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftError {
    /// A required field was empty after trimming
    Empty(&'static str),
    /// A field could not be parsed (field name, offending input)
    Invalid(&'static str, String),
}

impl std::fmt::Display for DraftError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DraftError::Empty(field) => write!(f, "{} must not be empty", field),
            DraftError::Invalid(field, value) => write!(f, "invalid {}: {:?}", field, value),
        }
    }
}

impl std::error::Error for DraftError {}

/// Reject `value` when it is blank; the value itself is kept as typed
pub fn required(field: &'static str, value: &str) -> Result<(), DraftError> {
    if value.trim().is_empty() {
        return Err(DraftError::Empty(field));
    }
    Ok(())
}
