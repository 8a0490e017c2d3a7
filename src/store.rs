//! Durable session storage.
//!
//! Holds the measured row heights, the current reading position and the
//! source that was open. Every write is committed before the call returns so
//! a later "restore last session" sees it.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use directories::ProjectDirs;
use hashbrown::HashMap;
use parking_lot::Mutex;
use redb::{Database, ReadableTable, TableDefinition, TableError};
use thiserror::Error;

use crate::content::{ContentKind, SessionSource};

const ROW_HEIGHTS: TableDefinition<u64, f32> = TableDefinition::new("row_heights");
const POSITION: TableDefinition<&str, u64> = TableDefinition::new("position");
const SOURCE: TableDefinition<&str, &str> = TableDefinition::new("source");

const POS_KEY: &str = "pos";
const PATH_KEY: &str = "path";
const KIND_KEY: &str = "kind";

/// File name of the session database inside the data directory.
pub const STORE_FILE_NAME: &str = "session.redb";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to prepare session store directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("session database error: {0}")]
    Database(#[from] redb::DatabaseError),
    #[error("session transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),
    #[error("session table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("session storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("session commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("no data directory available for the session store")]
    NoDataDir,
}

/// Key-value persistence used by a viewer session.
pub trait SessionStore {
    fn row_heights(&self) -> Result<Vec<(usize, f32)>, StoreError>;
    fn put_row_height(&mut self, index: usize, height: f32) -> Result<(), StoreError>;

    fn position(&self) -> Result<Option<usize>, StoreError>;
    fn put_position(&mut self, position: usize) -> Result<(), StoreError>;

    fn source(&self) -> Result<Option<SessionSource>, StoreError>;
    fn put_source(&mut self, source: &SessionSource) -> Result<(), StoreError>;

    /// Forget heights and position, keep the source.
    fn reset_layout(&mut self) -> Result<(), StoreError>;
    /// Forget everything.
    fn clear(&mut self) -> Result<(), StoreError>;
}

/// Platform data directory location of the session database.
pub fn default_store_path() -> Result<PathBuf, StoreError> {
    ProjectDirs::from("", "", "strip-viewer")
        .map(|dirs| dirs.data_dir().join(STORE_FILE_NAME))
        .ok_or(StoreError::NoDataDir)
}

/// Session store backed by a redb database file.
pub struct RedbStore {
    db: Database,
    path: PathBuf,
}

impl RedbStore {
    /// Open (or create) the database at `path`, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let db = Database::create(path)?;
        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for RedbStore {
    fn row_heights(&self) -> Result<Vec<(usize, f32)>, StoreError> {
        let txn = self.db.begin_read()?;
        let table = match txn.open_table(ROW_HEIGHTS) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut heights = Vec::new();
        for entry in table.iter()? {
            let (index, height) = entry?;
            heights.push((index.value() as usize, height.value()));
        }
        Ok(heights)
    }

    fn put_row_height(&mut self, index: usize, height: f32) -> Result<(), StoreError> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(ROW_HEIGHTS)?;
            table.insert(index as u64, height)?;
        }
        txn.commit()?;
        Ok(())
    }

    fn position(&self) -> Result<Option<usize>, StoreError> {
        let txn = self.db.begin_read()?;
        let table = match txn.open_table(POSITION) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let pos = table.get(POS_KEY)?.map(|guard| guard.value() as usize);
        Ok(pos)
    }

    fn put_position(&mut self, position: usize) -> Result<(), StoreError> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(POSITION)?;
            table.insert(POS_KEY, position as u64)?;
        }
        txn.commit()?;
        Ok(())
    }

    fn source(&self) -> Result<Option<SessionSource>, StoreError> {
        let txn = self.db.begin_read()?;
        let table = match txn.open_table(SOURCE) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let path = table.get(PATH_KEY)?.map(|guard| guard.value().to_string());
        let kind = table
            .get(KIND_KEY)?
            .and_then(|guard| ContentKind::from_str(guard.value()));

        Ok(match (path, kind) {
            (Some(path), Some(kind)) => Some(SessionSource::new(path, kind)),
            _ => None,
        })
    }

    fn put_source(&mut self, source: &SessionSource) -> Result<(), StoreError> {
        let path = source.path.to_string_lossy();
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SOURCE)?;
            table.insert(PATH_KEY, path.as_ref())?;
            table.insert(KIND_KEY, source.kind.as_str())?;
        }
        txn.commit()?;
        Ok(())
    }

    fn reset_layout(&mut self) -> Result<(), StoreError> {
        let txn = self.db.begin_write()?;
        txn.delete_table(ROW_HEIGHTS)?;
        txn.delete_table(POSITION)?;
        txn.commit()?;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        let txn = self.db.begin_write()?;
        txn.delete_table(ROW_HEIGHTS)?;
        txn.delete_table(POSITION)?;
        txn.delete_table(SOURCE)?;
        txn.commit()?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    row_heights: HashMap<usize, f32>,
    position: Option<usize>,
    source: Option<SessionSource>,
    writes: usize,
}

/// In-memory store for ephemeral sessions and tests.
///
/// Clones share the same state, so a caller can keep a handle after boxing
/// one into a session.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of write operations performed so far.
    pub fn write_count(&self) -> usize {
        self.state.lock().writes
    }
}

impl SessionStore for MemoryStore {
    fn row_heights(&self) -> Result<Vec<(usize, f32)>, StoreError> {
        Ok(self
            .state
            .lock()
            .row_heights
            .iter()
            .map(|(&i, &h)| (i, h))
            .collect())
    }

    fn put_row_height(&mut self, index: usize, height: f32) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.row_heights.insert(index, height);
        state.writes += 1;
        Ok(())
    }

    fn position(&self) -> Result<Option<usize>, StoreError> {
        Ok(self.state.lock().position)
    }

    fn put_position(&mut self, position: usize) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.position = Some(position);
        state.writes += 1;
        Ok(())
    }

    fn source(&self) -> Result<Option<SessionSource>, StoreError> {
        Ok(self.state.lock().source.clone())
    }

    fn put_source(&mut self, source: &SessionSource) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.source = Some(source.clone());
        state.writes += 1;
        Ok(())
    }

    fn reset_layout(&mut self) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.row_heights.clear();
        state.position = None;
        state.writes += 1;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.row_heights.clear();
        state.position = None;
        state.source = None;
        state.writes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(store: &mut dyn SessionStore) {
        assert!(store.row_heights().unwrap().is_empty());
        assert_eq!(store.position().unwrap(), None);
        assert_eq!(store.source().unwrap(), None);

        store.put_row_height(3, 420.0).unwrap();
        store.put_row_height(3, 440.0).unwrap();
        store.put_row_height(9, 100.0).unwrap();
        store.put_position(7).unwrap();
        let source = SessionSource::file("/books/vol1.cbz");
        store.put_source(&source).unwrap();

        let mut heights = store.row_heights().unwrap();
        heights.sort_by_key(|(i, _)| *i);
        assert_eq!(heights, vec![(3, 440.0), (9, 100.0)]);
        assert_eq!(store.position().unwrap(), Some(7));
        assert_eq!(store.source().unwrap(), Some(source.clone()));

        store.reset_layout().unwrap();
        assert!(store.row_heights().unwrap().is_empty());
        assert_eq!(store.position().unwrap(), None);
        assert_eq!(store.source().unwrap(), Some(source));

        store.put_position(2).unwrap();
        store.clear().unwrap();
        assert_eq!(store.position().unwrap(), None);
        assert_eq!(store.source().unwrap(), None);
    }

    #[test]
    fn memory_store_contract() {
        let mut store = MemoryStore::new();
        exercise(&mut store);
        assert!(store.write_count() > 0);
    }

    #[test]
    fn redb_store_contract() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = RedbStore::open(dir.path().join("nested").join(STORE_FILE_NAME)).unwrap();
        exercise(&mut store);
    }

    #[test]
    fn clearing_an_empty_database_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = RedbStore::open(dir.path().join(STORE_FILE_NAME)).unwrap();
        store.clear().unwrap();
        store.reset_layout().unwrap();
    }

    #[test]
    fn memory_store_clones_share_state() {
        let store = MemoryStore::new();
        let mut boxed: Box<dyn SessionStore> = Box::new(store.clone());
        boxed.put_position(11).unwrap();
        assert_eq!(store.position().unwrap(), Some(11));
        assert_eq!(store.write_count(), 1);
    }
}
