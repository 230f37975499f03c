/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Durable record store.
//!
//! The [`RecordStore`] trait is the seam between the server and its storage.
//! It exposes typed operations over the four record kinds with the only
//! atomic primitives the core relies on:
//!
//! - **claim**: find the earliest due task and mark it active in one step
//! - **guarded append**: add a timeline entry only if the caller saw the
//!   latest sequence number
//! - **reject-if-older**: write a relay item only if it is not older than
//!   the stored one
//!
//! Two backends are provided: [`MemoryStore`] for tests and single-process
//! use, and (with the `sqlite` feature) `SqliteStore` backed by diesel.
//!
//! # Example
//!
//! ```rust,ignore
//! use aftercast::database::{AccessLevel, Database};
//!
//! let db = Database::open("sqlite:///var/lib/aftercast/server1.db", AccessLevel::ReadWrite).await?;
//! let memory = Database::memory();
//! ```

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::dispatcher::Opcode;
use crate::error::StoreError;
use crate::models::{
    ClaimedRecord, LogEntry, NewLogEntry, NewTask, NewTimelineEntry, RecordKind, RelayItem,
    RelayTopic, RelayWrite, Task, TaskId, TimelineEntry,
};

/// Whether a store accepts writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    ReadOnly,
    ReadWrite,
}

/// Storage backends understood by [`Database::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    Memory,
    Sqlite,
}

impl BackendType {
    /// Detects the backend from a connection URL.
    pub fn from_url(url: &str) -> Result<Self, StoreError> {
        if url == "memory:" || url.starts_with("memory://") {
            Ok(BackendType::Memory)
        } else if url.starts_with("sqlite://") || url.ends_with(".db") || url.ends_with(".sqlite")
        {
            Ok(BackendType::Sqlite)
        } else {
            Err(StoreError::ConfigurationViolation(format!(
                "unsupported database url '{}'",
                url
            )))
        }
    }
}

/// Selection of queued tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub opcode: Option<Opcode>,
    pub event_id: Option<String>,
}

impl TaskFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_event(event_id: impl Into<String>) -> Self {
        Self {
            opcode: None,
            event_id: Some(event_id.into()),
        }
    }

    pub fn for_opcode(opcode: Opcode, event_id: impl Into<String>) -> Self {
        Self {
            opcode: Some(opcode),
            event_id: Some(event_id.into()),
        }
    }

    pub fn matches(&self, task: &Task) -> bool {
        self.opcode.map_or(true, |op| op == task.opcode)
            && self.event_id.as_ref().map_or(true, |id| *id == task.event_id)
    }
}

/// Selection of log entries; times are inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    pub event_id: Option<String>,
    pub min_time: i64,
    pub max_time: i64,
    pub limit: Option<usize>,
}

impl Default for LogFilter {
    fn default() -> Self {
        Self {
            event_id: None,
            min_time: i64::MIN,
            max_time: i64::MAX,
            limit: None,
        }
    }
}

impl LogFilter {
    pub fn matches(&self, entry: &LogEntry) -> bool {
        entry.log_time >= self.min_time
            && entry.log_time <= self.max_time
            && self.event_id.as_ref().map_or(true, |id| *id == entry.event_id)
    }
}

/// Typed CRUD, range query and atomic claim over the four record kinds.
#[async_trait]
pub trait RecordStore: Send + Sync {
    fn backend(&self) -> BackendType;

    fn access_level(&self) -> AccessLevel;

    // ---------------------------------------------------------------- tasks

    async fn insert_task(&self, new_task: NewTask, submit_time: i64) -> Result<Task, StoreError>;

    async fn get_task(&self, id: TaskId) -> Result<Option<Task>, StoreError>;

    /// Atomically selects the task with the smallest `exec_time <= now`
    /// (active tasks first, then submit time) and marks it active.
    async fn claim_next_task(&self, now: i64) -> Result<Option<ClaimedRecord>, StoreError>;

    /// Smallest `exec_time` in the queue, if any.
    async fn next_exec_time(&self) -> Result<Option<i64>, StoreError>;

    /// Replaces the stored task with the same id.
    async fn update_task(&self, task: &Task) -> Result<(), StoreError>;

    /// Returns false when the task no longer exists.
    async fn delete_task(&self, id: TaskId) -> Result<bool, StoreError>;

    /// Matching tasks ordered by `exec_time`.
    async fn find_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, StoreError>;

    // ------------------------------------------------------------- timeline

    /// Appends an entry with `sequence_no = expected_last + 1`.
    ///
    /// Fails with [`StoreError::VersionConflict`] when the latest stored
    /// sequence number for the event is not `expected_last` (zero for a
    /// new timeline).
    async fn append_timeline_entry(
        &self,
        entry: NewTimelineEntry,
        expected_last: i64,
    ) -> Result<TimelineEntry, StoreError>;

    /// All entries for the event ordered by sequence number.
    async fn timeline_entries(&self, event_id: &str) -> Result<Vec<TimelineEntry>, StoreError>;

    async fn latest_timeline_entry(
        &self,
        event_id: &str,
    ) -> Result<Option<TimelineEntry>, StoreError>;

    async fn timeline_event_ids(&self) -> Result<Vec<String>, StoreError>;

    /// Administrative rebuild: atomically replaces every entry of the event.
    async fn replace_timeline(
        &self,
        event_id: &str,
        entries: Vec<NewTimelineEntry>,
    ) -> Result<Vec<TimelineEntry>, StoreError>;

    // ---------------------------------------------------------------- relay

    /// Stores the item unless the stored one has a newer `relay_time`.
    async fn put_relay_item(&self, item: RelayItem) -> Result<RelayWrite, StoreError>;

    async fn get_relay_item(
        &self,
        topic: RelayTopic,
        relay_id: &str,
    ) -> Result<Option<RelayItem>, StoreError>;

    /// Items of the topic with `min_time <= relay_time <= max_time`,
    /// ordered by relay time.
    async fn query_relay_items(
        &self,
        topic: RelayTopic,
        min_time: i64,
        max_time: i64,
    ) -> Result<Vec<RelayItem>, StoreError>;

    async fn delete_relay_items_before(
        &self,
        topic: RelayTopic,
        time: i64,
    ) -> Result<usize, StoreError>;

    // ------------------------------------------------------------------ log

    async fn insert_log_entry(&self, entry: NewLogEntry) -> Result<LogEntry, StoreError>;

    /// Matching entries ordered by log time.
    async fn query_log_entries(&self, filter: &LogFilter) -> Result<Vec<LogEntry>, StoreError>;

    async fn delete_log_entries_before(&self, time: i64) -> Result<usize, StoreError>;

    async fn count(&self, kind: RecordKind) -> Result<u64, StoreError>;
}

/// Helper for backends: rejects writes through a read-only store.
pub(crate) fn require_write(access: AccessLevel, operation: &str) -> Result<(), StoreError> {
    match access {
        AccessLevel::ReadWrite => Ok(()),
        AccessLevel::ReadOnly => Err(StoreError::ConfigurationViolation(format!(
            "{} requires write access but the store was opened read-only",
            operation
        ))),
    }
}

/// Handle to an opened store.
#[derive(Clone)]
pub struct Database {
    store: Arc<dyn RecordStore>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("backend", &self.store.backend())
            .field("access", &self.store.access_level())
            .finish()
    }
}

impl Database {
    /// Opens the store named by `url` (`memory:` or `sqlite://path`).
    pub async fn open(url: &str, access: AccessLevel) -> Result<Self, StoreError> {
        match BackendType::from_url(url)? {
            BackendType::Memory => {
                info!("Opening in-memory record store");
                Ok(Self::from_store(Arc::new(MemoryStore::with_access(access))))
            }
            #[cfg(feature = "sqlite")]
            BackendType::Sqlite => {
                let store = SqliteStore::open(url, access).await?;
                Ok(Self::from_store(Arc::new(store)))
            }
            #[cfg(not(feature = "sqlite"))]
            BackendType::Sqlite => Err(StoreError::ConfigurationViolation(
                "this build does not include the sqlite backend".to_string(),
            )),
        }
    }

    /// A fresh read-write in-memory store.
    pub fn memory() -> Self {
        Self::from_store(Arc::new(MemoryStore::new()))
    }

    pub fn from_store(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> Arc<dyn RecordStore> {
        self.store.clone()
    }

    pub fn backend(&self) -> BackendType {
        self.store.backend()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_from_url() {
        assert_eq!(BackendType::from_url("memory:").unwrap(), BackendType::Memory);
        assert_eq!(
            BackendType::from_url("sqlite:///tmp/a.db").unwrap(),
            BackendType::Sqlite
        );
        assert!(BackendType::from_url("postgres://localhost/x")
            .unwrap_err()
            .is_configuration_violation());
    }
}
