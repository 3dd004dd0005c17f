//! StateStore — redb-backed persistence for the synchronizer's records.
//!
//! Provides typed operations over subscriptions, API keys, outbox commands
//! and distributed events. All values are JSON-serialized into redb's
//! `&[u8]` value columns. The store supports both on-disk and in-memory
//! backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Storage))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(SUBSCRIPTIONS).map_err(map_err!(Storage))?;
        txn.open_table(API_KEYS).map_err(map_err!(Storage))?;
        txn.open_table(COMMANDS).map_err(map_err!(Storage))?;
        txn.open_table(DISTRIBUTED_EVENTS).map_err(map_err!(Storage))?;
        txn.commit().map_err(map_err!(Storage))?;
        Ok(())
    }

    // ── Subscriptions ──────────────────────────────────────────────

    /// Insert or update a subscription record.
    pub fn put_subscription(&self, record: &SubscriptionRecord) -> StateResult<()> {
        self.put(SUBSCRIPTIONS, &record.id, record)?;
        debug!(subscription_id = %record.id, "subscription stored");
        Ok(())
    }

    /// Get a subscription record by id.
    pub fn get_subscription(&self, id: &str) -> StateResult<Option<SubscriptionRecord>> {
        self.get(SUBSCRIPTIONS, id)
    }

    /// Delete a subscription record. Returns true if it existed.
    pub fn delete_subscription(&self, id: &str) -> StateResult<bool> {
        self.delete(SUBSCRIPTIONS, id)
    }

    /// Search subscription records matching `criteria`, ordered by last update.
    pub fn search_subscriptions(
        &self,
        criteria: &SubscriptionCriteria,
        sort: Sort,
    ) -> StateResult<Vec<SubscriptionRecord>> {
        let mut results: Vec<SubscriptionRecord> = self
            .scan(SUBSCRIPTIONS)?
            .into_iter()
            .filter(|record| criteria.matches(record))
            .collect();
        sort_by_updated_at(&mut results, sort, |r| r.updated_at);
        Ok(results)
    }

    // ── API keys ───────────────────────────────────────────────────

    /// Insert or update an API key record.
    pub fn put_api_key(&self, record: &ApiKeyRecord) -> StateResult<()> {
        self.put(API_KEYS, &record.id, record)?;
        debug!(key_id = %record.id, "api key stored");
        Ok(())
    }

    /// Find API key records matching `criteria`, ordered by last update.
    pub fn find_api_keys(
        &self,
        criteria: &ApiKeyCriteria,
        sort: Sort,
    ) -> StateResult<Vec<ApiKeyRecord>> {
        let mut results: Vec<ApiKeyRecord> = self
            .scan(API_KEYS)?
            .into_iter()
            .filter(|record| criteria.matches(record))
            .collect();
        sort_by_updated_at(&mut results, sort, |r| r.updated_at);
        Ok(results)
    }

    // ── Commands ───────────────────────────────────────────────────

    /// Persist a new outbox command. Commands are never overwritten.
    pub fn create_command(&self, command: &Command) -> StateResult<()> {
        let value = serde_json::to_vec(command).map_err(map_err!(Encode))?;
        let txn = self.db.begin_write().map_err(map_err!(Storage))?;
        {
            let mut table = txn.open_table(COMMANDS).map_err(map_err!(Storage))?;
            if table
                .get(command.id.as_str())
                .map_err(map_err!(Storage))?
                .is_some()
            {
                return Err(StateError::DuplicateCommand(command.id.clone()));
            }
            table
                .insert(command.id.as_str(), value.as_slice())
                .map_err(map_err!(Storage))?;
        }
        txn.commit().map_err(map_err!(Storage))?;
        debug!(command_id = %command.id, "command created");
        Ok(())
    }

    /// Get a command by id.
    pub fn get_command(&self, id: &str) -> StateResult<Option<Command>> {
        self.get(COMMANDS, id)
    }

    /// List commands, optionally restricted to those carrying `tag`.
    pub fn list_commands(&self, tag: Option<CommandTag>) -> StateResult<Vec<Command>> {
        let mut results: Vec<Command> = self
            .scan(COMMANDS)?
            .into_iter()
            .filter(|c: &Command| tag.is_none_or(|t| c.tags.contains(&t)))
            .collect();
        results.sort_by_key(|c| c.created_at);
        Ok(results)
    }

    // ── Distributed events ─────────────────────────────────────────

    /// Insert or replace the latest distributed event for a deployable.
    pub fn put_distributed_event(&self, event: &DistributedEvent) -> StateResult<()> {
        let key = event.table_key();
        self.put(DISTRIBUTED_EVENTS, &key, event)?;
        debug!(%key, action = ?event.sync_action, "distributed event stored");
        Ok(())
    }

    /// List all distributed events, oldest first.
    pub fn list_distributed_events(&self) -> StateResult<Vec<DistributedEvent>> {
        let mut results: Vec<DistributedEvent> = self.scan(DISTRIBUTED_EVENTS)?;
        sort_by_updated_at(&mut results, Sort::updated_at_asc(), |e| e.updated_at);
        Ok(results)
    }

    // ── Internal helpers ───────────────────────────────────────────

    fn put<T: Serialize>(
        &self,
        table: JsonTable,
        key: &str,
        record: &T,
    ) -> StateResult<()> {
        let value = serde_json::to_vec(record).map_err(map_err!(Encode))?;
        let txn = self.db.begin_write().map_err(map_err!(Storage))?;
        {
            let mut table = txn.open_table(table).map_err(map_err!(Storage))?;
            table
                .insert(key, value.as_slice())
                .map_err(map_err!(Storage))?;
        }
        txn.commit().map_err(map_err!(Storage))?;
        Ok(())
    }

    fn get<T: DeserializeOwned>(
        &self,
        table: JsonTable,
        key: &str,
    ) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Storage))?;
        let table = txn.open_table(table).map_err(map_err!(Storage))?;
        match table.get(key).map_err(map_err!(Storage))? {
            Some(guard) => {
                let record: T = decode(key, guard.value())?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn delete(&self, table: JsonTable, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Storage))?;
        let existed;
        {
            let mut table = txn.open_table(table).map_err(map_err!(Storage))?;
            existed = table.remove(key).map_err(map_err!(Storage))?.is_some();
        }
        txn.commit().map_err(map_err!(Storage))?;
        debug!(%key, existed, "record deleted");
        Ok(existed)
    }

    fn scan<T: DeserializeOwned>(&self, table: JsonTable) -> StateResult<Vec<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Storage))?;
        let table = txn.open_table(table).map_err(map_err!(Storage))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Storage))? {
            let (key, value) = entry.map_err(map_err!(Storage))?;
            results.push(decode(key.value(), value.value())?);
        }
        Ok(results)
    }
}

fn decode<T: DeserializeOwned>(key: &str, value: &[u8]) -> StateResult<T> {
    serde_json::from_slice(value).map_err(|e| StateError::Corrupt {
        key: key.to_string(),
        message: e.to_string(),
    })
}

/// Stable sort, so records updated at the same instant keep key order.
fn sort_by_updated_at<T>(records: &mut [T], sort: Sort, updated_at: impl Fn(&T) -> u64) {
    match sort.order {
        Order::Asc => records.sort_by_key(|r| updated_at(r)),
        Order::Desc => records.sort_by_key(|r| std::cmp::Reverse(updated_at(r))),
    }
}
