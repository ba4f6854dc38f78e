//! Per-namespace persistence store.
//!
//! A per-namespace store behaves as a mapping from key to string. This
//! crate defines that mapping as a trait and backs it with `redb`, an
//! embedded KV engine. One `redb::Database` file lives per namespace
//! directory, with a single table keyed by `${name}.rep`; `redb`'s
//! transactions are atomic, so a write either lands in full or not at
//! all, with no partial-write state to tolerate.

use redb::{ReadableTable, TableDefinition};
use replicant_base::{Error, ErrorKind, Result};
use std::path::Path;
use std::sync::Arc;

const TABLE: TableDefinition<&str, &str> = TableDefinition::new("replicants");

/// Required operations on a namespace's persistence store.
pub trait PersistenceStore: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> Result<()>;
}

fn persistence_failed<E: std::error::Error + Send + Sync + 'static>(e: E) -> Error {
    Error::new(ErrorKind::PersistenceFailed, e)
}

/// A `redb`-backed store rooted at one file per namespace.
pub struct RedbStore {
    db: Arc<redb::Database>,
}

impl RedbStore {
    /// Opens (creating if absent) the database file for `namespace` under
    /// `namespace_root`. The root directory defaults to `db/replicants/`
    /// and is created if absent.
    pub fn open(namespace_root: impl AsRef<Path>, namespace: &str) -> Result<Self> {
        let dir = namespace_root.as_ref();
        std::fs::create_dir_all(dir).map_err(persistence_failed)?;
        let path = dir.join(format!("{namespace}.redb"));
        let db = redb::Database::create(&path).map_err(persistence_failed)?;
        {
            // Ensure the table exists even before the first write, so a
            // fresh-declare `get_item` doesn't need to special-case "never
            // written to" vs. "table missing".
            let txn = db.begin_write().map_err(persistence_failed)?;
            {
                let _ = txn.open_table(TABLE).map_err(persistence_failed)?;
            }
            txn.commit().map_err(persistence_failed)?;
        }
        Ok(RedbStore { db: Arc::new(db) })
    }
}

impl PersistenceStore for RedbStore {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let txn = self.db.begin_read().map_err(persistence_failed)?;
        let table = match txn.open_table(TABLE) {
            Ok(t) => t,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(persistence_failed(e)),
        };
        let value = table.get(key).map_err(persistence_failed)?;
        Ok(value.map(|guard| guard.value().to_string()))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let txn = self.db.begin_write().map_err(persistence_failed)?;
        {
            let mut table = txn.open_table(TABLE).map_err(persistence_failed)?;
            table.insert(key, value).map_err(persistence_failed)?;
        }
        txn.commit().map_err(persistence_failed)?;
        Ok(())
    }
}

/// An in-memory store. Useful in tests that don't want a `redb` file on
/// disk, and as a second concrete example of the trait.
#[derive(Default)]
pub struct MemoryStore {
    items: std::sync::Mutex<std::collections::HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistenceStore for MemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.lock().unwrap().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.items.lock().unwrap().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_a_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbStore::open(dir.path(), "my-bundle").unwrap();
        store.set_item("dashboard.rep", "{\"x\":1}").unwrap();
        assert_eq!(store.get_item("dashboard.rep").unwrap(), Some("{\"x\":1}".to_string()));
    }

    #[test]
    fn missing_key_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbStore::open(dir.path(), "my-bundle").unwrap();
        assert_eq!(store.get_item("nope.rep").unwrap(), None);
    }

    #[test]
    fn write_fully_replaces_prior_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbStore::open(dir.path(), "my-bundle").unwrap();
        store.set_item("k.rep", "first").unwrap();
        store.set_item("k.rep", "second").unwrap();
        assert_eq!(store.get_item("k.rep").unwrap(), Some("second".to_string()));
    }

    #[test]
    fn durable_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = RedbStore::open(dir.path(), "my-bundle").unwrap();
            store.set_item("k.rep", "value").unwrap();
        }
        let reopened = RedbStore::open(dir.path(), "my-bundle").unwrap();
        assert_eq!(reopened.get_item("k.rep").unwrap(), Some("value".to_string()));
    }

    #[test]
    fn namespaces_are_partitioned_into_separate_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = RedbStore::open(dir.path(), "ns-a").unwrap();
        let b = RedbStore::open(dir.path(), "ns-b").unwrap();
        a.set_item("k.rep", "a-value").unwrap();
        assert_eq!(b.get_item("k.rep").unwrap(), None);
        assert!(dir.path().join("ns-a.redb").exists());
        assert!(dir.path().join("ns-b.redb").exists());
    }
}
