// Organizer - tasks, notes and calendar events over a key-value JSON store

pub mod config;
pub mod filter;
pub mod kv;
pub mod models;
pub mod organizer;
pub mod persist;
pub mod record;
pub mod store;

// Re-export main types for convenience
pub use config::{Backend, Config};
pub use filter::SearchQuery;
pub use kv::{FileKv, KeyValueStore, MemoryKv, SqliteKv};
pub use models::{Event, EventDraft, Note, NoteDraft, Task, TaskDraft};
pub use organizer::{ListKind, Organizer, SearchResults};
pub use persist::Snapshot;
pub use record::{Completable, DraftError, Record};
pub use store::{ItemStore, now_ms};
