//! The async Entry Store Gateway consumed by the orchestrator.
//!
//! [`EntryStore`] is deliberately narrow: create and query, both scoped by the
//! caller's [`OwnerId`]. [`SqliteEntryStore`] implements it over the
//! synchronous functions in [`super::store`], running them on the blocking
//! pool.

use async_trait::async_trait;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use super::store;
use super::types::{Category, Entry, EntryFilter, NewEntry, OwnerId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Validation(String),
    #[error("entry {0} not found")]
    NotFound(i64),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("store task failed: {0}")]
    Task(String),
}

/// Owner-scoped entry persistence.
///
/// Implementations must enforce owner isolation themselves: a call made with
/// one owner never observes or mutates another owner's entries.
#[async_trait]
pub trait EntryStore: Send + Sync {
    async fn create(&self, owner: &OwnerId, entry: NewEntry) -> Result<Entry, StoreError>;

    async fn query(
        &self,
        owner: &OwnerId,
        category: Option<&Category>,
    ) -> Result<Vec<Entry>, StoreError>;
}

/// [`EntryStore`] backed by a shared SQLite connection.
#[derive(Clone)]
pub struct SqliteEntryStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteEntryStore {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self::new(Arc::new(Mutex::new(conn)))
    }

    /// Run a closure against the locked connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let mut conn = db
                .lock()
                .map_err(|e| StoreError::Task(format!("db lock poisoned: {e}")))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(format!("db task failed: {e}")))?
    }
}

#[async_trait]
impl EntryStore for SqliteEntryStore {
    async fn create(&self, owner: &OwnerId, entry: NewEntry) -> Result<Entry, StoreError> {
        let owner = owner.clone();
        self.with_conn(move |conn| store::create_entry(conn, &owner, &entry))
            .await
    }

    async fn query(
        &self,
        owner: &OwnerId,
        category: Option<&Category>,
    ) -> Result<Vec<Entry>, StoreError> {
        let owner = owner.clone();
        let filter = EntryFilter::category(category.cloned());
        self.with_conn(move |conn| store::query_entries(conn, &owner, &filter))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> SqliteEntryStore {
        SqliteEntryStore::from_connection(crate::db::open_memory_database().unwrap())
    }

    #[tokio::test]
    async fn read_after_write_in_same_category() {
        let store = test_store();
        let owner = OwnerId::new("alice");
        let category: Category = "reminder".parse().unwrap();

        let created = store
            .create(&owner, NewEntry::new("Buy eggs", "Before Friday", category.clone()))
            .await
            .unwrap();
        let found = store.query(&owner, Some(&category)).await.unwrap();

        assert_eq!(found, vec![created]);
    }

    #[tokio::test]
    async fn validation_error_is_reported() {
        let store = test_store();
        let err = store
            .create(
                &OwnerId::new("alice"),
                NewEntry::new("Title", "  ", "note".parse().unwrap()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }
}
