//! State Store: persistent, single-process-writer key-value store of
//! per-file discovery state, keyed by filesystem path.
//!
//! Backed by `redb`, the embedded pure-Rust crash-safe KV store already used
//! elsewhere in the pack for exactly this role (persistence of a retrieval
//! index). `redb`'s transactions give atomic single-key writes and
//! many-reader/one-writer semantics for free; a `tokio::sync::Mutex`
//! additionally serializes writer transactions the way the spec's
//! concurrency model calls for.

use catalogue_common::FileState;
use redb::{Database, ReadableTable, TableDefinition};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

const TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("file_state");

#[derive(Error, Debug)]
pub enum StateStoreError {
    #[error("redb database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StateResult<T> = Result<T, StateStoreError>;

/// Single-process-writer persistent store of `FileState`, keyed by `path`.
pub struct StateStore {
    db: Database,
    /// Serializes writer transactions; `redb` already refuses concurrent
    /// write transactions, but holding this explicitly keeps the
    /// single-writer discipline visible at the call site instead of buried
    /// in the storage engine.
    writer_lock: Arc<Mutex<()>>,
}

impl StateStore {
    pub fn open(path: impl AsRef<Path>) -> StateResult<Self> {
        let db = Database::create(path)?;
        {
            let tx = db.begin_write()?;
            tx.open_table(TABLE)?;
            tx.commit()?;
        }
        Ok(Self {
            db,
            writer_lock: Arc::new(Mutex::new(())),
        })
    }

    pub async fn get(&self, path: &str) -> StateResult<Option<FileState>> {
        let tx = self.db.begin_read()?;
        let table = tx.open_table(TABLE)?;
        match table.get(path)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(bytes.value())?)),
            None => Ok(None),
        }
    }

    /// Atomic replace of the row for `state.path`. Durable on return: the
    /// underlying `redb` write transaction is committed (fsync'd) before
    /// this function returns.
    pub async fn upsert(&self, state: FileState) -> StateResult<()> {
        let _guard = self.writer_lock.lock().await;
        let bytes = serde_json::to_vec(&state)?;
        let tx = self.db.begin_write()?;
        {
            let mut table = tx.open_table(TABLE)?;
            table.insert(state.path.as_str(), bytes.as_slice())?;
        }
        tx.commit()?;
        Ok(())
    }

    pub async fn delete(&self, path: &str) -> StateResult<()> {
        let _guard = self.writer_lock.lock().await;
        let tx = self.db.begin_write()?;
        {
            let mut table = tx.open_table(TABLE)?;
            table.remove(path)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Snapshot of every row currently in the store. Readers never block
    /// writers or each other: this opens its own read transaction.
    pub async fn all(&self) -> StateResult<Vec<FileState>> {
        let tx = self.db.begin_read()?;
        let table = tx.open_table(TABLE)?;
        let mut out = Vec::new();
        for entry in table.iter()? {
            let (_, bytes) = entry?;
            out.push(serde_json::from_slice(bytes.value())?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalogue_common::FileStatus;
    use tempfile::tempdir;

    fn sample(path: &str) -> FileState {
        FileState {
            path: path.to_string(),
            pdf_sha256: "abc".to_string(),
            config_hash: "def".to_string(),
            bookmarks_hash: "ghi".to_string(),
            last_indexed_at: None,
            status: FileStatus::Unseen,
            last_mtime_secs: 0,
            last_size_bytes: 0,
            last_error: None,
        }
    }

    #[tokio::test]
    async fn upsert_then_get_roundtrips() {
        let dir = tempdir().unwrap();
        let store = StateStore::open(dir.path().join("state.redb")).unwrap();
        store.upsert(sample("a.pdf")).await.unwrap();
        let got = store.get("a.pdf").await.unwrap().unwrap();
        assert_eq!(got.pdf_sha256, "abc");
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let dir = tempdir().unwrap();
        let store = StateStore::open(dir.path().join("state.redb")).unwrap();
        assert!(store.get("missing.pdf").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_removes_row() {
        let dir = tempdir().unwrap();
        let store = StateStore::open(dir.path().join("state.redb")).unwrap();
        store.upsert(sample("a.pdf")).await.unwrap();
        store.delete("a.pdf").await.unwrap();
        assert!(store.get("a.pdf").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn all_lists_every_row() {
        let dir = tempdir().unwrap();
        let store = StateStore::open(dir.path().join("state.redb")).unwrap();
        store.upsert(sample("a.pdf")).await.unwrap();
        store.upsert(sample("b.pdf")).await.unwrap();
        let mut all = store.all().await.unwrap();
        all.sort_by(|a, b| a.path.cmp(&b.path));
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].path, "a.pdf");
        assert_eq!(all[1].path, "b.pdf");
    }

    #[tokio::test]
    async fn upsert_replaces_existing_row() {
        let dir = tempdir().unwrap();
        let store = StateStore::open(dir.path().join("state.redb")).unwrap();
        store.upsert(sample("a.pdf")).await.unwrap();
        let mut updated = sample("a.pdf");
        updated.status = FileStatus::Indexed;
        store.upsert(updated).await.unwrap();
        let got = store.get("a.pdf").await.unwrap().unwrap();
        assert_eq!(got.status, FileStatus::Indexed);
    }
}
