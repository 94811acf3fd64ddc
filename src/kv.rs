// Key-value backends holding serialized slots

use eyre::{Context, Result, eyre};
use fs2::FileExt;
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// String-keyed store of string values, the organizer's only persistence boundary
pub trait KeyValueStore {
    /// Read the value stored under `key`, if any
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// Slot keys become file names and table keys, so keep them boring
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(eyre!("Key cannot be empty"));
    }
    if key.len() > 64 {
        return Err(eyre!("Key too long: {} (max 64 chars)", key));
    }
    if !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(eyre!("Invalid key: {} (must be alphanumeric with _/-)", key));
    }
    Ok(())
}

// ============================================================================
// In-memory
// ============================================================================

/// HashMap-backed store; nothing survives the process
#[derive(Debug, Clone, Default)]
pub struct MemoryKv {
    entries: HashMap<String, String>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<String>> {
        validate_key(key)?;
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ============================================================================
// Directory of JSON files
// ============================================================================

/// One `<key>.json` file per slot inside a data directory
///
/// Writes land in a temp file that is renamed over the slot file while an
/// exclusive lock on `.lock` is held, so readers never see a half-written slot.
#[derive(Debug)]
pub struct FileKv {
    base_path: PathBuf,
}

impl FileKv {
    /// Open or create a file store rooted at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).context("Failed to create data directory")?;
        info!(path = ?base_path, "Opened file store");
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn slot_path(&self, key: &str) -> PathBuf {
        self.base_path.join(format!("{}.json", key))
    }

    fn lock(&self) -> Result<File> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.base_path.join(".lock"))
            .context("Failed to open lock file")?;
        file.lock_exclusive().context("Failed to acquire file lock")?;
        Ok(file)
    }
}

impl KeyValueStore for FileKv {
    fn get(&self, key: &str) -> Result<Option<String>> {
        validate_key(key)?;
        let path = self.slot_path(key);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read slot file {:?}", path))?;
        Ok(Some(content))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        let path = self.slot_path(key);
        let tmp_path = self.base_path.join(format!(".{}.json.tmp", key));

        // Lock is released when the guard is dropped
        let _guard = self.lock()?;

        let mut tmp = File::create(&tmp_path).context("Failed to create temp slot file")?;
        tmp.write_all(value.as_bytes())?;
        tmp.sync_all()?;
        drop(tmp);

        fs::rename(&tmp_path, &path)
            .with_context(|| format!("Failed to replace slot file {:?}", path))?;
        debug!(key, bytes = value.len(), "Wrote slot file");
        Ok(())
    }
}

// ============================================================================
// SQLite
// ============================================================================

/// Slots kept as rows of a single SQLite table
pub struct SqliteKv {
    db: Connection,
}

impl SqliteKv {
    /// Open or create `organizer.db` inside the directory `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let base_path = path.as_ref();
        fs::create_dir_all(base_path).context("Failed to create data directory")?;

        let db_path = base_path.join("organizer.db");
        let db = Connection::open(&db_path).context("Failed to open SQLite database")?;
        let store = Self { db };
        store.create_schema()?;

        info!(path = ?db_path, "Opened SQLite store");
        Ok(store)
    }

    /// Open a throwaway in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let store = Self { db };
        store.create_schema()?;
        Ok(store)
    }

    fn create_schema(&self) -> Result<()> {
        debug!("Creating slot schema");

        self.db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS slots (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;

        Ok(())
    }
}

impl KeyValueStore for SqliteKv {
    fn get(&self, key: &str) -> Result<Option<String>> {
        validate_key(key)?;
        let value = self
            .db
            .query_row("SELECT value FROM slots WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        self.db.execute(
            "INSERT OR REPLACE INTO slots (key, value, updated_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![key, value, crate::now_ms()],
        )?;
        debug!(key, bytes = value.len(), "Wrote slot row");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn exercise(kv: &mut dyn KeyValueStore) {
        assert_eq!(kv.get("tasks").unwrap(), None);

        kv.set("tasks", "[]").unwrap();
        assert_eq!(kv.get("tasks").unwrap().as_deref(), Some("[]"));

        kv.set("tasks", r#"[{"id":1}]"#).unwrap();
        assert_eq!(kv.get("tasks").unwrap().as_deref(), Some(r#"[{"id":1}]"#));

        assert!(kv.set("../escape", "x").is_err());
        assert!(kv.get("").is_err());
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("tasks").is_ok());
        assert!(validate_key("legacy-notes_2").is_ok());

        assert!(validate_key("").is_err());
        assert!(validate_key("a/b").is_err());
        assert!(validate_key("a.json").is_err());
        assert!(validate_key(&"k".repeat(65)).is_err());
    }

    #[test]
    fn test_memory_kv() {
        exercise(&mut MemoryKv::new());
    }

    #[test]
    fn test_file_kv() {
        let temp = TempDir::new().unwrap();
        let mut kv = FileKv::open(temp.path().join("data")).unwrap();
        exercise(&mut kv);

        assert!(temp.path().join("data/tasks.json").exists());
        assert!(!temp.path().join("data/.tasks.json.tmp").exists());
    }

    #[test]
    fn test_file_kv_survives_reopen() {
        let temp = TempDir::new().unwrap();
        {
            let mut kv = FileKv::open(temp.path()).unwrap();
            kv.set("notes", r#"[{"id":2}]"#).unwrap();
        }

        let kv = FileKv::open(temp.path()).unwrap();
        assert_eq!(kv.get("notes").unwrap().as_deref(), Some(r#"[{"id":2}]"#));
    }

    #[test]
    fn test_sqlite_kv() {
        let mut kv = SqliteKv::open_in_memory().unwrap();
        exercise(&mut kv);
    }

    #[test]
    fn test_sqlite_kv_survives_reopen() {
        let temp = TempDir::new().unwrap();
        {
            let mut kv = SqliteKv::open(temp.path()).unwrap();
            kv.set("events", "[]").unwrap();
        }

        assert!(temp.path().join("organizer.db").exists());
        let kv = SqliteKv::open(temp.path()).unwrap();
        assert_eq!(kv.get("events").unwrap().as_deref(), Some("[]"));
    }
}
