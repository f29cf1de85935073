//! Cache storage trait and SQLite implementation.

use chrono::Utc;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, TransactionBehavior};
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::key::CacheKey;
use crate::error::StoreError;

/// Read side of the store.
pub trait CacheRead: Send + Sync {
  /// Read a live (unexpired) value.
  fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Result<Option<T>, StoreError>;
}

/// Key/value store with per-key expiry.
///
/// Every method is atomic for the single key it touches. There are no
/// cross-key transactions.
pub trait CacheStore: CacheRead {
  /// Write a value. `ttl` of `None` means the entry never expires.
  #[allow(dead_code)]
  fn set<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Option<Duration>)
    -> Result<(), StoreError>;

  /// Read-modify-write under a single write lock. The result never expires.
  fn update<T, F>(&self, key: &CacheKey, f: F) -> Result<T, StoreError>
  where
    T: Serialize + DeserializeOwned,
    F: FnOnce(Option<T>) -> T;

  /// Create the entry unless a live one exists. Returns whether this call
  /// created it.
  fn claim(&self, key: &CacheKey, ttl: Duration) -> Result<bool, StoreError>;
}

/// SQLite-based cache storage.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open (or create) the cache database at `path`.
  pub fn open(path: &Path) -> Result<Self, StoreError> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
        path: parent.display().to_string(),
        source,
      })?;
    }

    let conn = Connection::open(path)?;
    // Refresh and read invocations run as separate processes on the same file.
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;

    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    storage.purge_expired()?;

    Ok(storage)
  }

  /// Private in-memory database, used by tests.
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self, StoreError> {
    let storage = Self {
      conn: Mutex::new(Connection::open_in_memory()?),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Default database path under the user's data directory.
  pub fn default_path() -> Option<PathBuf> {
    dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .map(|dir| dir.join("prodsync").join("cache.db"))
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
    self.conn.lock().map_err(|_| StoreError::Poisoned)
  }

  fn run_migrations(&self) -> Result<(), StoreError> {
    self.lock()?.execute_batch(CACHE_SCHEMA)?;
    Ok(())
  }

  /// Drop entries whose expiry has passed.
  pub fn purge_expired(&self) -> Result<usize, StoreError> {
    let removed = self.lock()?.execute(
      "DELETE FROM cache_entries WHERE expires_at IS NOT NULL AND expires_at <= ?",
      params![now_millis()],
    )?;
    Ok(removed)
  }
}

const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cache_entries (
    cache_key TEXT PRIMARY KEY,
    description TEXT NOT NULL,
    value BLOB NOT NULL,
    -- unix millis, NULL = never expires
    expires_at INTEGER,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

fn now_millis() -> i64 {
  Utc::now().timestamp_millis()
}

fn expiry_millis(ttl: Option<Duration>) -> Option<i64> {
  ttl.map(|ttl| now_millis().saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)))
}

fn read_live(conn: &Connection, key: &CacheKey) -> Result<Option<Vec<u8>>, StoreError> {
  let data = conn
    .query_row(
      "SELECT value FROM cache_entries
       WHERE cache_key = ? AND (expires_at IS NULL OR expires_at > ?)",
      params![key.as_str(), now_millis()],
      |row| row.get::<_, Vec<u8>>(0),
    )
    .optional()?;
  Ok(data)
}

fn write(
  conn: &Connection,
  key: &CacheKey,
  data: &[u8],
  expires_at: Option<i64>,
) -> Result<(), StoreError> {
  conn.execute(
    "INSERT OR REPLACE INTO cache_entries (cache_key, description, value, expires_at, updated_at)
     VALUES (?, ?, ?, ?, datetime('now'))",
    params![key.as_str(), key.description(), data, expires_at],
  )?;
  Ok(())
}

impl CacheRead for SqliteStorage {
  fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Result<Option<T>, StoreError> {
    let conn = self.lock()?;
    match read_live(&conn, key)? {
      Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
      None => Ok(None),
    }
  }
}

impl CacheStore for SqliteStorage {
  fn set<T: Serialize>(
    &self,
    key: &CacheKey,
    value: &T,
    ttl: Option<Duration>,
  ) -> Result<(), StoreError> {
    let data = serde_json::to_vec(value)?;
    let conn = self.lock()?;
    write(&conn, key, &data, expiry_millis(ttl))
  }

  fn update<T, F>(&self, key: &CacheKey, f: F) -> Result<T, StoreError>
  where
    T: Serialize + DeserializeOwned,
    F: FnOnce(Option<T>) -> T,
  {
    let mut conn = self.lock()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let current = match read_live(&tx, key)? {
      Some(data) => Some(serde_json::from_slice(&data)?),
      None => None,
    };
    let next = f(current);
    write(&tx, key, &serde_json::to_vec(&next)?, None)?;

    tx.commit()?;
    Ok(next)
  }

  fn claim(&self, key: &CacheKey, ttl: Duration) -> Result<bool, StoreError> {
    let now = now_millis();
    let data = serde_json::to_vec(&Utc::now().to_rfc3339())?;
    let conn = self.lock()?;

    let changed = conn.execute(
      "INSERT INTO cache_entries (cache_key, description, value, expires_at, updated_at)
       VALUES (?1, ?2, ?3, ?4, datetime('now'))
       ON CONFLICT(cache_key) DO UPDATE SET
         description = excluded.description,
         value = excluded.value,
         expires_at = excluded.expires_at,
         updated_at = excluded.updated_at
       WHERE cache_entries.expires_at IS NOT NULL AND cache_entries.expires_at <= ?5",
      params![key.as_str(), key.description(), data, expiry_millis(Some(ttl)), now],
    )?;

    Ok(changed == 1)
  }
}

/// Read-only view of a cache database, for read mode.
///
/// Never creates, migrates or purges anything. The file is opened on the
/// first read that finds it; until then, and while the table does not exist,
/// every key reads as absent.
pub struct ReadOnlyStorage {
  path: PathBuf,
  conn: Mutex<Option<Connection>>,
}

impl ReadOnlyStorage {
  pub fn open(path: &Path) -> Self {
    Self {
      path: path.to_path_buf(),
      conn: Mutex::new(None),
    }
  }

  fn connect(&self) -> Result<Option<Connection>, StoreError> {
    if !self.path.exists() {
      return Ok(None);
    }

    let conn = Connection::open_with_flags(
      &self.path,
      OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(Some(conn))
  }
}

impl CacheRead for ReadOnlyStorage {
  fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Result<Option<T>, StoreError> {
    let mut slot = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
    if slot.is_none() {
      *slot = self.connect()?;
    }
    let Some(conn) = slot.as_ref() else {
      return Ok(None);
    };

    match read_live(conn, key) {
      Ok(Some(data)) => Ok(Some(serde_json::from_slice(&data)?)),
      Ok(None) => Ok(None),
      // refresh has not created the schema yet
      Err(StoreError::Sqlite(e)) if is_missing_table(&e) => Ok(None),
      Err(e) => Err(e),
    }
  }
}

fn is_missing_table(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.starts_with("no such table")
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::QueryKey;

  struct TestKey(&'static str);

  impl QueryKey for TestKey {
    fn cache_hash(&self) -> String {
      self.0.to_string()
    }

    fn description(&self) -> String {
      format!("test {}", self.0)
    }
  }

  fn key(name: &'static str) -> CacheKey {
    CacheKey::new(&TestKey(name))
  }

  #[test]
  fn test_get_missing_returns_none() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let value: Option<Vec<String>> = storage.get(&key("missing")).unwrap();
    assert!(value.is_none());
  }

  #[test]
  fn test_set_then_get() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage
      .set(&key("a"), &vec!["x".to_string(), "y".to_string()], None)
      .unwrap();

    let value: Option<Vec<String>> = storage.get(&key("a")).unwrap();
    assert_eq!(value, Some(vec!["x".to_string(), "y".to_string()]));
  }

  #[test]
  fn test_expired_entry_is_invisible() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.set(&key("a"), &1u32, Some(Duration::ZERO)).unwrap();

    let value: Option<u32> = storage.get(&key("a")).unwrap();
    assert!(value.is_none());
  }

  #[test]
  fn test_update_sees_previous_value() {
    let storage = SqliteStorage::open_in_memory().unwrap();

    let first = storage
      .update(&key("counter"), |prev: Option<u32>| prev.unwrap_or(0) + 1)
      .unwrap();
    let second = storage
      .update(&key("counter"), |prev: Option<u32>| prev.unwrap_or(0) + 1)
      .unwrap();

    assert_eq!(first, 1);
    assert_eq!(second, 2);
    assert_eq!(storage.get::<u32>(&key("counter")).unwrap(), Some(2));
  }

  #[test]
  fn test_claim_is_exclusive_until_expiry() {
    let storage = SqliteStorage::open_in_memory().unwrap();

    assert!(storage.claim(&key("m"), Duration::from_secs(60)).unwrap());
    assert!(!storage.claim(&key("m"), Duration::from_secs(60)).unwrap());
  }

  #[test]
  fn test_claim_succeeds_after_expiry() {
    let storage = SqliteStorage::open_in_memory().unwrap();

    assert!(storage.claim(&key("m"), Duration::ZERO).unwrap());
    assert!(storage.claim(&key("m"), Duration::from_secs(60)).unwrap());
    assert!(!storage.claim(&key("m"), Duration::from_secs(60)).unwrap());
  }

  #[test]
  fn test_claim_never_takes_over_permanent_entry() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.set(&key("items"), &vec![1u32], None).unwrap();

    assert!(!storage.claim(&key("items"), Duration::from_secs(1)).unwrap());
    assert_eq!(storage.get::<Vec<u32>>(&key("items")).unwrap(), Some(vec![1]));
  }

  #[test]
  fn test_two_handles_share_one_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("cache.db");

    let writer = SqliteStorage::open(&path).unwrap();
    let reader = SqliteStorage::open(&path).unwrap();

    assert!(writer.claim(&key("m"), Duration::from_secs(60)).unwrap());
    assert!(!reader.claim(&key("m"), Duration::from_secs(60)).unwrap());

    writer.set(&key("items"), &vec!["a".to_string()], None).unwrap();
    assert_eq!(
      reader.get::<Vec<String>>(&key("items")).unwrap(),
      Some(vec!["a".to_string()])
    );
  }

  #[test]
  fn test_open_purges_expired_entries() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");

    {
      let storage = SqliteStorage::open(&path).unwrap();
      storage.set(&key("old"), &1u32, Some(Duration::ZERO)).unwrap();
      storage.set(&key("keep"), &2u32, None).unwrap();
    }

    let storage = SqliteStorage::open(&path).unwrap();
    assert_eq!(storage.purge_expired().unwrap(), 0);
    assert_eq!(storage.get::<u32>(&key("keep")).unwrap(), Some(2));
  }

  fn row_count(path: &Path) -> i64 {
    Connection::open(path)
      .unwrap()
      .query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0))
      .unwrap()
  }

  #[test]
  fn test_read_only_sees_writer_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");

    let writer = SqliteStorage::open(&path).unwrap();
    writer.set(&key("items"), &vec!["a".to_string()], None).unwrap();

    let reader = ReadOnlyStorage::open(&path);
    assert_eq!(
      reader.get::<Vec<String>>(&key("items")).unwrap(),
      Some(vec!["a".to_string()])
    );
    assert!(reader.get::<Vec<String>>(&key("other")).unwrap().is_none());
  }

  #[test]
  fn test_read_only_leaves_expired_rows_alone() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");

    {
      let storage = SqliteStorage::open(&path).unwrap();
      assert!(storage.claim(&key("marker"), Duration::ZERO).unwrap());
    }
    assert_eq!(row_count(&path), 1);

    let reader = ReadOnlyStorage::open(&path);
    assert!(reader.get::<String>(&key("marker")).unwrap().is_none());
    assert_eq!(row_count(&path), 1);
  }

  #[test]
  fn test_read_only_missing_file_reads_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent").join("cache.db");

    let reader = ReadOnlyStorage::open(&path);
    assert!(reader.get::<u32>(&key("a")).unwrap().is_none());
    assert!(!path.exists());

    // picked up once a writer creates it
    let writer = SqliteStorage::open(&path).unwrap();
    writer.set(&key("a"), &7u32, None).unwrap();
    assert_eq!(reader.get::<u32>(&key("a")).unwrap(), Some(7));
  }

  #[test]
  fn test_read_only_missing_table_reads_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");
    Connection::open(&path)
      .unwrap()
      .execute_batch("CREATE TABLE unrelated (x INTEGER);")
      .unwrap();

    let reader = ReadOnlyStorage::open(&path);
    assert!(reader.get::<u32>(&key("a")).unwrap().is_none());
  }
}
