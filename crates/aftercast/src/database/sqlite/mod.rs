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

//! SQLite record store.
//!
//! Uses diesel through a `deadpool-diesel` pool. SQLite has limited write
//! concurrency even in WAL mode, so the pool holds a single connection and
//! every read-then-write operation runs in an IMMEDIATE transaction, which
//! takes the write lock up front.

pub mod models;
pub mod schema;

use async_trait::async_trait;
use deadpool_diesel::sqlite::{Manager, Pool, Runtime};
use diesel::prelude::*;
use diesel::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use self::models::{LogEntryRow, RelayItemRow, TaskRow, TimelineEntryRow};
use self::schema::{log_entries, relay_items, tasks, timeline_entries};
use super::{require_write, AccessLevel, BackendType, LogFilter, RecordStore, TaskFilter};
use crate::error::StoreError;
use crate::models::{
    ClaimedRecord, LogEntry, NewLogEntry, NewTask, NewTimelineEntry, RecordKind, RelayItem,
    RelayTopic, RelayWrite, Task, TaskId, TimelineEntry,
};

pub const SQLITE_MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/sqlite");

pub struct SqliteStore {
    pool: Pool,
    access: AccessLevel,
}

impl SqliteStore {
    /// Opens the database file, applying pragmas and pending migrations.
    pub async fn open(url: &str, access: AccessLevel) -> Result<Self, StoreError> {
        let path = url.strip_prefix("sqlite://").unwrap_or(url).to_string();
        let manager = Manager::new(path.clone(), Runtime::Tokio1);
        let pool = Pool::builder(manager)
            .max_size(1)
            .build()
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))?;

        let store = Self { pool, access };
        store.prepare(access).await?;
        info!(path = %path, ?access, "SQLite record store opened");
        Ok(store)
    }

    async fn prepare(&self, access: AccessLevel) -> Result<(), StoreError> {
        self.interact(move |conn| {
            diesel::sql_query("PRAGMA busy_timeout=30000;").execute(conn)?;
            if access == AccessLevel::ReadWrite {
                // WAL mode allows concurrent readers during writes.
                diesel::sql_query("PRAGMA journal_mode=WAL;").execute(conn)?;
                conn.run_pending_migrations(SQLITE_MIGRATIONS)
                    .map_err(|e| StoreError::Migration(e.to_string()))?;
            }
            Ok(())
        })
        .await
    }

    async fn interact<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<R, StoreError> + Send + 'static,
        R: Send + 'static,
    {
        let conn = self
            .pool
            .get()
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))?;
        conn.interact(f)
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))?
    }

    fn write(&self, operation: &str) -> Result<(), StoreError> {
        require_write(self.access, operation)
    }
}

/// Converts rows, dropping (and reporting) any that cannot be decoded.
fn decode_tasks(rows: Vec<TaskRow>) -> Vec<Task> {
    rows.into_iter()
        .filter_map(|row| match row.into_task() {
            Ok(task) => Some(task),
            Err(e) => {
                warn!(error = %e, "Skipping undecodable task row");
                None
            }
        })
        .collect()
}

fn decode_relay_items(rows: Vec<RelayItemRow>) -> Vec<RelayItem> {
    rows.into_iter()
        .filter_map(|row| match row.into_item() {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(error = %e, "Skipping undecodable relay row");
                None
            }
        })
        .collect()
}

#[async_trait]
impl RecordStore for SqliteStore {
    fn backend(&self) -> BackendType {
        BackendType::Sqlite
    }

    fn access_level(&self) -> AccessLevel {
        self.access
    }

    async fn insert_task(&self, new_task: NewTask, submit_time: i64) -> Result<Task, StoreError> {
        self.write("insert_task")?;
        let task = Task {
            id: TaskId::new_v4(),
            opcode: new_task.opcode,
            event_id: new_task.event_id,
            stage: new_task.stage,
            exec_time: new_task.exec_time,
            submit_time,
            submit_id: new_task.submit_id,
            apparent_time: new_task.exec_time,
            payload: new_task.payload,
            claim_count: 0,
            fault_count: 0,
        };
        let row = TaskRow::from(&task);
        self.interact(move |conn| {
            diesel::insert_into(tasks::table).values(&row).execute(conn)?;
            Ok(())
        })
        .await?;
        Ok(task)
    }

    async fn get_task(&self, id: TaskId) -> Result<Option<Task>, StoreError> {
        let key = id.to_string();
        let row: Option<TaskRow> = self
            .interact(move |conn| {
                Ok(tasks::table
                    .find(key)
                    .select(TaskRow::as_select())
                    .first(conn)
                    .optional()?)
            })
            .await?;
        Ok(row.map(|r| decode_tasks(vec![r])).and_then(|mut v| v.pop()))
    }

    async fn claim_next_task(&self, now: i64) -> Result<Option<ClaimedRecord>, StoreError> {
        self.write("claim_next_task")?;
        self.interact(move |conn| {
            conn.immediate_transaction::<_, StoreError, _>(|conn| loop {
                let row: Option<TaskRow> = tasks::table
                    .filter(tasks::exec_time.le(now))
                    .order((
                        tasks::exec_time.asc(),
                        tasks::submit_time.asc(),
                        tasks::id.asc(),
                    ))
                    .select(TaskRow::as_select())
                    .first(conn)
                    .optional()?;

                let Some(row) = row else {
                    return Ok(None);
                };
                let row_id = row.id.clone();

                let mut task = match row.into_task() {
                    Ok(task) => task,
                    Err(e) => {
                        // An unknown opcode can never be dispatched; discard it.
                        error!(task_id = %row_id, error = %e, "Discarding undecodable task");
                        diesel::delete(tasks::table.find(&row_id)).execute(conn)?;
                        continue;
                    }
                };

                let restarted = task.exec_time == 0;
                if !restarted {
                    task.apparent_time = task.exec_time;
                }
                task.exec_time = 0;
                task.claim_count += 1;

                diesel::update(tasks::table.find(&row_id))
                    .set((
                        tasks::exec_time.eq(0_i64),
                        tasks::apparent_time.eq(task.apparent_time),
                        tasks::claim_count.eq(task.claim_count),
                    ))
                    .execute(conn)?;

                return Ok(Some(ClaimedRecord { task, restarted }));
            })
        })
        .await
    }

    async fn next_exec_time(&self) -> Result<Option<i64>, StoreError> {
        self.interact(|conn| {
            Ok(tasks::table
                .select(diesel::dsl::min(tasks::exec_time))
                .first::<Option<i64>>(conn)?)
        })
        .await
    }

    async fn update_task(&self, task: &Task) -> Result<(), StoreError> {
        self.write("update_task")?;
        let row = TaskRow::from(task);
        let updated = self
            .interact(move |conn| {
                Ok(diesel::update(tasks::table.find(row.id.clone()))
                    .set((
                        tasks::stage.eq(row.stage),
                        tasks::exec_time.eq(row.exec_time),
                        tasks::apparent_time.eq(row.apparent_time),
                        tasks::payload.eq(row.payload),
                        tasks::claim_count.eq(row.claim_count),
                        tasks::fault_count.eq(row.fault_count),
                    ))
                    .execute(conn)?)
            })
            .await?;
        if updated == 0 {
            return Err(StoreError::NotFound {
                kind: RecordKind::Task,
                key: task.id.to_string(),
            });
        }
        Ok(())
    }

    async fn delete_task(&self, id: TaskId) -> Result<bool, StoreError> {
        self.write("delete_task")?;
        let key = id.to_string();
        let deleted = self
            .interact(move |conn| Ok(diesel::delete(tasks::table.find(key)).execute(conn)?))
            .await?;
        Ok(deleted > 0)
    }

    async fn find_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, StoreError> {
        let opcode = filter.opcode.map(|op| op.code());
        let event_id = filter.event_id.clone();
        let rows: Vec<TaskRow> = self
            .interact(move |conn| {
                let mut query = tasks::table
                    .select(TaskRow::as_select())
                    .into_boxed::<diesel::sqlite::Sqlite>();
                if let Some(opcode) = opcode {
                    query = query.filter(tasks::opcode.eq(opcode));
                }
                if let Some(event_id) = event_id {
                    query = query.filter(tasks::event_id.eq(event_id));
                }
                Ok(query
                    .order((
                        tasks::exec_time.asc(),
                        tasks::submit_time.asc(),
                        tasks::id.asc(),
                    ))
                    .load(conn)?)
            })
            .await?;
        Ok(decode_tasks(rows))
    }

    async fn append_timeline_entry(
        &self,
        entry: NewTimelineEntry,
        expected_last: i64,
    ) -> Result<TimelineEntry, StoreError> {
        self.write("append_timeline_entry")?;
        self.interact(move |conn| {
            conn.immediate_transaction::<_, StoreError, _>(|conn| {
                let found = timeline_entries::table
                    .filter(timeline_entries::event_id.eq(&entry.event_id))
                    .select(diesel::dsl::max(timeline_entries::sequence_no))
                    .first::<Option<i64>>(conn)?
                    .unwrap_or(0);
                if found != expected_last {
                    return Err(StoreError::VersionConflict {
                        kind: RecordKind::TimelineEntry,
                        key: entry.event_id.clone(),
                        expected: Some(expected_last),
                        found: Some(found),
                    });
                }
                let row = TimelineEntryRow {
                    event_id: entry.event_id.clone(),
                    sequence_no: expected_last + 1,
                    action_code: entry.action_code,
                    action_time: entry.action_time,
                    payload: entry.payload.clone(),
                };
                diesel::insert_into(timeline_entries::table)
                    .values(&row)
                    .execute(conn)?;
                Ok(TimelineEntry::from(row))
            })
        })
        .await
    }

    async fn timeline_entries(&self, event_id: &str) -> Result<Vec<TimelineEntry>, StoreError> {
        let event_id = event_id.to_string();
        let rows: Vec<TimelineEntryRow> = self
            .interact(move |conn| {
                Ok(timeline_entries::table
                    .filter(timeline_entries::event_id.eq(event_id))
                    .order(timeline_entries::sequence_no.asc())
                    .select(TimelineEntryRow::as_select())
                    .load(conn)?)
            })
            .await?;
        Ok(rows.into_iter().map(TimelineEntry::from).collect())
    }

    async fn latest_timeline_entry(
        &self,
        event_id: &str,
    ) -> Result<Option<TimelineEntry>, StoreError> {
        let event_id = event_id.to_string();
        let row: Option<TimelineEntryRow> = self
            .interact(move |conn| {
                Ok(timeline_entries::table
                    .filter(timeline_entries::event_id.eq(event_id))
                    .order(timeline_entries::sequence_no.desc())
                    .select(TimelineEntryRow::as_select())
                    .first(conn)
                    .optional()?)
            })
            .await?;
        Ok(row.map(TimelineEntry::from))
    }

    async fn timeline_event_ids(&self) -> Result<Vec<String>, StoreError> {
        self.interact(|conn| {
            Ok(timeline_entries::table
                .select(timeline_entries::event_id)
                .distinct()
                .order(timeline_entries::event_id.asc())
                .load(conn)?)
        })
        .await
    }

    async fn replace_timeline(
        &self,
        event_id: &str,
        entries: Vec<NewTimelineEntry>,
    ) -> Result<Vec<TimelineEntry>, StoreError> {
        self.write("replace_timeline")?;
        let event_id = event_id.to_string();
        let rows: Vec<TimelineEntryRow> = entries
            .into_iter()
            .zip(1..)
            .map(|(entry, sequence_no)| TimelineEntryRow {
                event_id: event_id.clone(),
                sequence_no,
                action_code: entry.action_code,
                action_time: entry.action_time,
                payload: entry.payload,
            })
            .collect();
        self.interact(move |conn| {
            conn.immediate_transaction::<_, StoreError, _>(|conn| {
                let removed = diesel::delete(
                    timeline_entries::table.filter(timeline_entries::event_id.eq(&event_id)),
                )
                .execute(conn)?;
                diesel::insert_into(timeline_entries::table)
                    .values(&rows)
                    .execute(conn)?;
                debug!(event_id = %event_id, removed, written = rows.len(), "Timeline replaced");
                Ok(rows.into_iter().map(TimelineEntry::from).collect())
            })
        })
        .await
    }

    async fn put_relay_item(&self, item: RelayItem) -> Result<RelayWrite, StoreError> {
        self.write("put_relay_item")?;
        let row = RelayItemRow::from(&item);
        self.interact(move |conn| {
            conn.immediate_transaction::<_, StoreError, _>(|conn| {
                let stored_time: Option<i64> = relay_items::table
                    .find((row.topic, row.relay_id.clone()))
                    .select(relay_items::relay_time)
                    .first(conn)
                    .optional()?;
                if let Some(stored_time) = stored_time {
                    if stored_time > row.relay_time {
                        return Ok(RelayWrite::Superseded { stored_time });
                    }
                }
                diesel::replace_into(relay_items::table)
                    .values(&row)
                    .execute(conn)?;
                Ok(RelayWrite::Stored)
            })
        })
        .await
    }

    async fn get_relay_item(
        &self,
        topic: RelayTopic,
        relay_id: &str,
    ) -> Result<Option<RelayItem>, StoreError> {
        let key = (topic.code(), relay_id.to_string());
        let row: Option<RelayItemRow> = self
            .interact(move |conn| {
                Ok(relay_items::table
                    .find(key)
                    .select(RelayItemRow::as_select())
                    .first(conn)
                    .optional()?)
            })
            .await?;
        Ok(row.map(|r| decode_relay_items(vec![r])).and_then(|mut v| v.pop()))
    }

    async fn query_relay_items(
        &self,
        topic: RelayTopic,
        min_time: i64,
        max_time: i64,
    ) -> Result<Vec<RelayItem>, StoreError> {
        let code = topic.code();
        let rows: Vec<RelayItemRow> = self
            .interact(move |conn| {
                Ok(relay_items::table
                    .filter(relay_items::topic.eq(code))
                    .filter(relay_items::relay_time.ge(min_time))
                    .filter(relay_items::relay_time.le(max_time))
                    .order((relay_items::relay_time.asc(), relay_items::relay_id.asc()))
                    .select(RelayItemRow::as_select())
                    .load(conn)?)
            })
            .await?;
        Ok(decode_relay_items(rows))
    }

    async fn delete_relay_items_before(
        &self,
        topic: RelayTopic,
        time: i64,
    ) -> Result<usize, StoreError> {
        self.write("delete_relay_items_before")?;
        let code = topic.code();
        self.interact(move |conn| {
            Ok(diesel::delete(
                relay_items::table
                    .filter(relay_items::topic.eq(code))
                    .filter(relay_items::relay_time.lt(time)),
            )
            .execute(conn)?)
        })
        .await
    }

    async fn insert_log_entry(&self, entry: NewLogEntry) -> Result<LogEntry, StoreError> {
        self.write("insert_log_entry")?;
        let stored = LogEntry {
            id: Uuid::new_v4(),
            log_time: entry.log_time,
            opcode: entry.opcode,
            event_id: entry.event_id,
            stage: entry.stage,
            result_code: entry.result_code,
            payload: entry.payload,
            details: entry.details,
        };
        let row = LogEntryRow::from(&stored);
        self.interact(move |conn| {
            diesel::insert_into(log_entries::table)
                .values(&row)
                .execute(conn)?;
            Ok(())
        })
        .await?;
        Ok(stored)
    }

    async fn query_log_entries(&self, filter: &LogFilter) -> Result<Vec<LogEntry>, StoreError> {
        let filter = filter.clone();
        let rows: Vec<LogEntryRow> = self
            .interact(move |conn| {
                let mut query = log_entries::table
                    .select(LogEntryRow::as_select())
                    .filter(log_entries::log_time.ge(filter.min_time))
                    .filter(log_entries::log_time.le(filter.max_time))
                    .into_boxed::<diesel::sqlite::Sqlite>();
                if let Some(event_id) = filter.event_id {
                    query = query.filter(log_entries::event_id.eq(event_id));
                }
                if let Some(limit) = filter.limit {
                    query = query.limit(limit as i64);
                }
                Ok(query.order(log_entries::log_time.asc()).load(conn)?)
            })
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| match row.into_entry() {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "Skipping undecodable log row");
                    None
                }
            })
            .collect())
    }

    async fn delete_log_entries_before(&self, time: i64) -> Result<usize, StoreError> {
        self.write("delete_log_entries_before")?;
        self.interact(move |conn| {
            Ok(diesel::delete(log_entries::table.filter(log_entries::log_time.lt(time)))
                .execute(conn)?)
        })
        .await
    }

    async fn count(&self, kind: RecordKind) -> Result<u64, StoreError> {
        let count: i64 = self
            .interact(move |conn| {
                Ok(match kind {
                    RecordKind::Task => tasks::table.count().get_result(conn)?,
                    RecordKind::TimelineEntry => timeline_entries::table.count().get_result(conn)?,
                    RecordKind::RelayItem => relay_items::table.count().get_result(conn)?,
                    RecordKind::LogEntry => log_entries::table.count().get_result(conn)?,
                })
            })
            .await?;
        Ok(count as u64)
    }
}
