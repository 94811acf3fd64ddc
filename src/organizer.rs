// Top-level application object: three lists plus their backend

use crate::kv::KeyValueStore;
use crate::models::{Event, EventDraft, Note, NoteDraft, Task, TaskDraft};
use crate::persist::{self, Snapshot};
use crate::record::Record;
use crate::store::ItemStore;
use eyre::{Result, eyre};
use tracing::{debug, info, warn};

/// Which list a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListKind {
    Tasks,
    Events,
    Notes,
}

impl ListKind {
    pub const ALL: [ListKind; 3] = [ListKind::Tasks, ListKind::Events, ListKind::Notes];
}

impl std::fmt::Display for ListKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListKind::Tasks => write!(f, "tasks"),
            ListKind::Events => write!(f, "events"),
            ListKind::Notes => write!(f, "notes"),
        }
    }
}

/// Matches of one query across all lists, each in insertion order
#[derive(Debug, Default)]
pub struct SearchResults<'a> {
    pub tasks: Vec<&'a Task>,
    pub events: Vec<&'a Event>,
    pub notes: Vec<&'a Note>,
}

impl SearchResults<'_> {
    pub fn count(&self, kind: ListKind) -> usize {
        match kind {
            ListKind::Tasks => self.tasks.len(),
            ListKind::Events => self.events.len(),
            ListKind::Notes => self.notes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty() && self.events.is_empty() && self.notes.is_empty()
    }
}

/// Owns the task, note and event stores and keeps the backend in step with them
///
/// Every mutation that changes a list is followed, within the same call, by a
/// save of all three lists. A failed save doesn't undo the mutation: it is
/// logged and kept in `persist_error()` until the next successful save.
///
/// A slot the backend could not read at open time is never written back, so a
/// transient read failure can't replace stored records with an empty list.
pub struct Organizer {
    kv: Box<dyn KeyValueStore>,
    tasks: ItemStore<Task>,
    notes: ItemStore<Note>,
    events: ItemStore<Event>,
    unreadable: Vec<&'static str>,
    persist_error: Option<eyre::Report>,
}

impl Organizer {
    /// Load state from `kv` and take ownership of it
    pub fn open(kv: impl KeyValueStore + 'static) -> Self {
        Self::open_boxed(Box::new(kv))
    }

    pub fn open_boxed(kv: Box<dyn KeyValueStore>) -> Self {
        let mut unreadable = Vec::new();
        let tasks: Vec<Task> = load_or_flag(&*kv, &mut unreadable);
        let notes: Vec<Note> = load_or_flag(&*kv, &mut unreadable);
        let events: Vec<Event> = load_or_flag(&*kv, &mut unreadable);
        info!(
            tasks = tasks.len(),
            notes = notes.len(),
            events = events.len(),
            "Loaded organizer state"
        );

        let persist_error = (!unreadable.is_empty()).then(|| unreadable_error(&unreadable));
        Self {
            kv,
            tasks: ItemStore::from_items(tasks),
            notes: ItemStore::from_items(notes),
            events: ItemStore::from_items(events),
            unreadable,
            persist_error,
        }
    }

    // ========================================================================
    // Tasks
    // ========================================================================

    pub fn add_task(&mut self, draft: TaskDraft) -> Option<Task> {
        let task = self.tasks.add(draft)?;
        self.persist();
        Some(task)
    }

    /// Returns the task's new `done` value, or `None` if the id is unknown
    pub fn toggle_task(&mut self, id: i64) -> Option<bool> {
        let done = self.tasks.toggle_done(id)?;
        self.persist();
        Some(done)
    }

    pub fn remove_task(&mut self, id: i64) -> bool {
        self.remove_with(id, |org| &mut org.tasks)
    }

    // ========================================================================
    // Notes
    // ========================================================================

    pub fn add_note(&mut self, draft: NoteDraft) -> Option<Note> {
        let note = self.notes.add(draft)?;
        self.persist();
        Some(note)
    }

    pub fn remove_note(&mut self, id: i64) -> bool {
        self.remove_with(id, |org| &mut org.notes)
    }

    // ========================================================================
    // Events
    // ========================================================================

    pub fn add_event(&mut self, draft: EventDraft) -> Option<Event> {
        let event = self.events.add(draft)?;
        self.persist();
        Some(event)
    }

    pub fn remove_event(&mut self, id: i64) -> bool {
        self.remove_with(id, |org| &mut org.events)
    }

    // ========================================================================
    // Whole-state operations
    // ========================================================================

    pub fn tasks(&self) -> &ItemStore<Task> {
        &self.tasks
    }

    pub fn notes(&self) -> &ItemStore<Note> {
        &self.notes
    }

    pub fn events(&self) -> &ItemStore<Event> {
        &self.events
    }

    /// Run `query` against every list
    pub fn search(&self, query: &str) -> SearchResults<'_> {
        SearchResults {
            tasks: self.tasks.filter(query).collect(),
            events: self.events.filter(query).collect(),
            notes: self.notes.filter(query).collect(),
        }
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            tasks: self.tasks.items().to_vec(),
            notes: self.notes.items().to_vec(),
            events: self.events.items().to_vec(),
        }
    }

    /// Replace all three lists, then save
    pub fn replace(&mut self, snapshot: Snapshot) {
        self.tasks.replace(snapshot.tasks);
        self.notes.replace(snapshot.notes);
        self.events.replace(snapshot.events);
        self.persist();
    }

    /// Write all three lists now, reporting failure to the caller
    ///
    /// Slots that were unreadable at open time are skipped and reported as an
    /// error, after the readable ones have been written.
    pub fn save(&mut self) -> Result<()> {
        let kv = &mut *self.kv;
        save_unless_unreadable(kv, &self.unreadable, self.tasks.items())?;
        save_unless_unreadable(kv, &self.unreadable, self.notes.items())?;
        save_unless_unreadable(kv, &self.unreadable, self.events.items())?;
        if !self.unreadable.is_empty() {
            return Err(unreadable_error(&self.unreadable));
        }
        self.persist_error = None;
        Ok(())
    }

    /// The most recent save failure, cleared by the next successful save
    pub fn persist_error(&self) -> Option<&eyre::Report> {
        self.persist_error.as_ref()
    }

    pub fn kv(&self) -> &dyn KeyValueStore {
        &*self.kv
    }

    fn remove_with<T, F>(&mut self, id: i64, store: F) -> bool
    where
        T: Record,
        F: FnOnce(&mut Self) -> &mut ItemStore<T>,
    {
        if !store(self).remove(id) {
            debug!(slot = T::slot_name(), id, "Remove of unknown id ignored");
            return false;
        }
        self.persist();
        true
    }

    fn persist(&mut self) {
        if let Err(e) = self.save() {
            warn!(error = ?e, "Failed to persist organizer state");
            self.persist_error = Some(e);
        }
    }
}

fn load_or_flag<T: Record>(kv: &dyn KeyValueStore, unreadable: &mut Vec<&'static str>) -> Vec<T> {
    persist::try_load_slot(kv).unwrap_or_else(|e| {
        warn!(slot = T::slot_name(), error = ?e, "Slot unreadable; it will not be overwritten");
        unreadable.push(T::slot_name());
        Vec::new()
    })
}

fn save_unless_unreadable<T: Record>(
    kv: &mut dyn KeyValueStore,
    unreadable: &[&'static str],
    records: &[T],
) -> Result<()> {
    if unreadable.contains(&T::slot_name()) {
        debug!(slot = T::slot_name(), "Skipping save of unreadable slot");
        return Ok(());
    }
    persist::save_slot(kv, records)
}

fn unreadable_error(slots: &[&'static str]) -> eyre::Report {
    eyre!("Could not read slots {}; they are left untouched", slots.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{FileKv, MemoryKv, SqliteKv};
    use tempfile::TempDir;

    /// Backend whose writes always fail
    struct ReadOnlyKv;

    impl KeyValueStore for ReadOnlyKv {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }

        fn set(&mut self, key: &str, _value: &str) -> Result<()> {
            Err(eyre::eyre!("quota exceeded writing {}", key))
        }
    }

    fn dentist() -> EventDraft {
        EventDraft {
            title: "Dentist".to_string(),
            date: "2024-03-01".to_string(),
            time: "09:30".to_string(),
            reminder: true,
        }
    }

    #[test]
    fn test_mutations_are_persisted() {
        let temp = TempDir::new().unwrap();

        let (task_id, note_id) = {
            let mut org = Organizer::open(FileKv::open(temp.path()).unwrap());
            let task = org.add_task(TaskDraft::new("buy milk")).unwrap();
            org.toggle_task(task.id);
            let note = org.add_note(NoteDraft::new("door code 4411")).unwrap();
            org.add_event(dentist()).unwrap();
            assert!(org.persist_error().is_none());
            (task.id, note.id)
        };

        let mut org = Organizer::open(FileKv::open(temp.path()).unwrap());
        assert_eq!(org.tasks().len(), 1);
        assert!(org.tasks().get(task_id).unwrap().done);
        assert_eq!(org.notes().get(note_id).unwrap().text, "door code 4411");
        assert_eq!(org.events().items()[0].title, "Dentist");

        assert!(org.remove_note(note_id));
        let org = Organizer::open(FileKv::open(temp.path()).unwrap());
        assert!(org.notes().is_empty());
    }

    #[test]
    fn test_sqlite_backend_round_trip() {
        let temp = TempDir::new().unwrap();
        {
            let mut org = Organizer::open(SqliteKv::open(temp.path()).unwrap());
            org.add_task(TaskDraft::new("file taxes")).unwrap();
        }

        let org = Organizer::open(SqliteKv::open(temp.path()).unwrap());
        assert_eq!(org.tasks().items()[0].text, "file taxes");
    }

    #[test]
    fn test_save_writes_every_slot() {
        let mut org = Organizer::open(MemoryKv::new());
        org.add_note(NoteDraft::new("only a note")).unwrap();

        assert_eq!(org.kv().get("tasks").unwrap().as_deref(), Some("[]"));
        assert_eq!(org.kv().get("events").unwrap().as_deref(), Some("[]"));
        assert!(org.kv().get("notes").unwrap().unwrap().contains("only a note"));
    }

    #[test]
    fn test_rejected_and_missed_operations_are_silent() {
        let mut org = Organizer::open(MemoryKv::new());

        assert!(org.add_task(TaskDraft::new("  ")).is_none());
        assert!(org.add_event(EventDraft::default()).is_none());
        assert_eq!(org.toggle_task(42), None);
        assert!(!org.remove_task(42));
        assert!(!org.remove_event(42));

        // Nothing changed, so nothing was written
        assert_eq!(org.kv().get("tasks").unwrap(), None);
    }

    #[test]
    fn test_search_across_lists() {
        let mut org = Organizer::open(MemoryKv::new());
        org.add_task(TaskDraft::new("Book dentist")).unwrap();
        org.add_task(TaskDraft::new("buy milk")).unwrap();
        org.add_event(dentist()).unwrap();
        org.add_note(NoteDraft::new("dentist is on 5th street")).unwrap();

        let results = org.search("DENTIST");
        assert_eq!(results.count(ListKind::Tasks), 1);
        assert_eq!(results.count(ListKind::Events), 1);
        assert_eq!(results.count(ListKind::Notes), 1);

        assert!(org.search("zebra").is_empty());
        assert_eq!(org.search("").tasks.len(), 2);
    }

    #[test]
    fn test_replace_and_snapshot() {
        let mut source = Organizer::open(MemoryKv::new());
        source.add_task(TaskDraft::new("a")).unwrap();
        source.add_note(NoteDraft::new("b")).unwrap();
        let snapshot = source.snapshot();

        let mut target = Organizer::open(MemoryKv::new());
        target.add_event(dentist()).unwrap();
        target.replace(snapshot.clone());

        assert_eq!(target.snapshot(), snapshot);
        assert!(target.events().is_empty());
        assert_eq!(persist::load(target.kv()), snapshot);
    }

    #[test]
    fn test_persist_failure_is_not_fatal() {
        let mut org = Organizer::open(ReadOnlyKv);

        let task = org.add_task(TaskDraft::new("still works")).unwrap();
        assert_eq!(org.tasks().len(), 1);
        assert_eq!(org.tasks().items()[0].id, task.id);

        let err = org.persist_error().unwrap();
        assert!(format!("{:#}", err).contains("quota exceeded"));
        assert!(org.save().is_err());
    }

    #[test]
    fn test_unreadable_slot_is_not_overwritten() {
        let temp = TempDir::new().unwrap();
        let tasks_path = temp.path().join("tasks.json");
        let garbage = vec![0xff, 0xfe, b'[', b']'];
        std::fs::write(&tasks_path, &garbage).unwrap();

        let mut org = Organizer::open(FileKv::open(temp.path()).unwrap());
        assert!(org.tasks().is_empty());
        assert!(org.persist_error().is_some());

        org.add_note(NoteDraft::new("still saved")).unwrap();
        org.add_task(TaskDraft::new("kept in memory only")).unwrap();

        assert_eq!(std::fs::read(&tasks_path).unwrap(), garbage);
        let notes = std::fs::read_to_string(temp.path().join("notes.json")).unwrap();
        assert!(notes.contains("still saved"));

        let err = org.save().unwrap_err();
        assert!(err.to_string().contains("tasks"));
        assert!(org.persist_error().is_some());
    }

    #[test]
    fn test_add_after_max_stored_id() {
        let max_task = format!(
            r#"{{"id":{},"text":"a","done":false,"createdAt":"2024-01-05T10:00:00Z"}}"#,
            i64::MAX
        );
        let mut kv = MemoryKv::new();
        kv.set("tasks", &format!("[{}]", max_task)).unwrap();

        let mut org = Organizer::open(kv);
        let added = org.add_task(TaskDraft::new("b")).unwrap();
        assert_eq!(org.tasks().len(), 2);
        assert_ne!(added.id, i64::MAX);
    }

    #[test]
    fn test_duplicate_max_ids_load_without_panic() {
        let max_task = format!(
            r#"{{"id":{},"text":"a","done":false,"createdAt":"2024-01-05T10:00:00Z"}}"#,
            i64::MAX
        );
        let mut kv = MemoryKv::new();
        kv.set("tasks", &format!("[{0},{0}]", max_task)).unwrap();

        let mut org = Organizer::open(kv);
        org.add_task(TaskDraft::new("c")).unwrap();

        let mut ids: Vec<i64> = org.tasks().items().iter().map(|t| t.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_note_text_survives_reopen_unchanged() {
        let temp = TempDir::new().unwrap();
        let text = "  - item one\n  - item two\n";
        let id = {
            let mut org = Organizer::open(FileKv::open(temp.path()).unwrap());
            let note = org.add_note(NoteDraft::new(text)).unwrap();
            assert_eq!(note.text, text);
            note.id
        };

        let org = Organizer::open(FileKv::open(temp.path()).unwrap());
        assert_eq!(org.notes().get(id).unwrap().text, text);
    }

    #[test]
    fn test_list_kind_display() {
        let names: Vec<String> = ListKind::ALL.iter().map(|k| k.to_string()).collect();
        assert_eq!(names, vec!["tasks", "events", "notes"]);
    }
}
