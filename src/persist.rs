// Slot serialization and whole-state load/save

use crate::kv::KeyValueStore;
use crate::models::{Event, Note, Task};
use crate::record::Record;
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

/// The three lists as one value, as loaded at startup or exchanged by export/import
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default, alias = "tareas")]
    pub tasks: Vec<Task>,
    #[serde(default, alias = "notas")]
    pub notes: Vec<Note>,
    #[serde(default, alias = "eventos")]
    pub events: Vec<Event>,
}

/// Load all three slots
///
/// Never fails: a slot that is missing, unreadable, or not a JSON array loads
/// as an empty list and the remaining slots are still read.
pub fn load(kv: &dyn KeyValueStore) -> Snapshot {
    let snapshot = Snapshot {
        tasks: load_slot(kv),
        notes: load_slot(kv),
        events: load_slot(kv),
    };

    info!(
        tasks = snapshot.tasks.len(),
        notes = snapshot.notes.len(),
        events = snapshot.events.len(),
        "Loaded organizer state"
    );
    snapshot
}

/// Write every list to its own slot, replacing what was there
pub fn save(
    kv: &mut dyn KeyValueStore,
    tasks: &[Task],
    notes: &[Note],
    events: &[Event],
) -> Result<()> {
    save_slot(kv, tasks)?;
    save_slot(kv, notes)?;
    save_slot(kv, events)?;
    Ok(())
}

/// Read one list, falling back to its legacy slot name when the current one is absent
///
/// A backend read error yields an empty list with a warning; use
/// `try_load_slot` to tell that apart from a missing slot.
pub fn load_slot<T: Record>(kv: &dyn KeyValueStore) -> Vec<T> {
    try_load_slot(kv).unwrap_or_else(|e| {
        warn!(slot = T::slot_name(), error = ?e, "Failed to read slot, starting empty");
        Vec::new()
    })
}

/// Like `load_slot`, but a backend read error is returned instead of swallowed
///
/// Undecodable payloads still load as empty or partial lists: only a slot
/// whose bytes could not be read at all is an error.
pub fn try_load_slot<T: Record>(kv: &dyn KeyValueStore) -> Result<Vec<T>> {
    let keys = std::iter::once(T::slot_name()).chain(T::legacy_slot_name());

    for key in keys {
        let payload = kv
            .get(key)
            .with_context(|| format!("Failed to read slot {}", key))?;
        if let Some(payload) = payload {
            debug!(key, bytes = payload.len(), "Read slot");
            return Ok(decode_slot(key, &payload));
        }
    }

    Ok(Vec::new())
}

/// Serialize one list into its slot
pub fn save_slot<T: Record>(kv: &mut dyn KeyValueStore, records: &[T]) -> Result<()> {
    let key = T::slot_name();
    let payload = serde_json::to_string(records)
        .with_context(|| format!("Failed to serialize slot {}", key))?;
    kv.set(key, &payload)
        .with_context(|| format!("Failed to write slot {}", key))?;
    Ok(())
}

/// Decode a JSON array of records
///
/// Elements that don't decode as `T` are skipped with a warning; a payload
/// that is not an array at all yields an empty list.
pub fn decode_slot<T: Record>(key: &str, payload: &str) -> Vec<T> {
    let elements: Vec<Value> = match serde_json::from_str(payload) {
        Ok(Value::Array(elements)) => elements,
        Ok(other) => {
            warn!(key, kind = value_kind(&other), "Slot is not a JSON array, starting empty");
            return Vec::new();
        }
        Err(e) => {
            warn!(key, error = ?e, "Failed to parse slot, starting empty");
            return Vec::new();
        }
    };

    let total = elements.len();
    let records: Vec<T> = elements
        .into_iter()
        .enumerate()
        .filter_map(|(index, element)| match serde_json::from_value(element) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(key, index, error = ?e, "Failed to decode record, skipping");
                None
            }
        })
        .collect();

    if records.len() < total {
        warn!(key, kept = records.len(), total, "Dropped undecodable records from slot");
    }
    records
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
