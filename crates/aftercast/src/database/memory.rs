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

//! In-process record store.
//!
//! All state sits behind one mutex, so every operation is trivially atomic.
//! Sharing one `Arc<MemoryStore>` between two servers in the same process
//! gives them a common relay store.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use super::{require_write, AccessLevel, BackendType, LogFilter, RecordStore, TaskFilter};
use crate::error::StoreError;
use crate::models::{
    ClaimedRecord, LogEntry, NewLogEntry, NewTask, NewTimelineEntry, RecordKind, RelayItem,
    RelayTopic, RelayWrite, Task, TaskId, TimelineEntry,
};

#[derive(Default)]
struct MemoryState {
    tasks: HashMap<TaskId, Task>,
    timelines: BTreeMap<String, Vec<TimelineEntry>>,
    relay: BTreeMap<(RelayTopic, String), RelayItem>,
    logs: Vec<LogEntry>,
}

pub struct MemoryStore {
    access: AccessLevel,
    state: Mutex<MemoryState>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_access(AccessLevel::ReadWrite)
    }

    pub fn with_access(access: AccessLevel) -> Self {
        Self {
            access,
            state: Mutex::new(MemoryState::default()),
        }
    }

    fn write(&self, operation: &str) -> Result<(), StoreError> {
        require_write(self.access, operation)
    }
}

fn claim_order(task: &Task) -> (i64, i64, TaskId) {
    (task.exec_time, task.submit_time, task.id)
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn backend(&self) -> BackendType {
        BackendType::Memory
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
        self.state.lock().tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn get_task(&self, id: TaskId) -> Result<Option<Task>, StoreError> {
        Ok(self.state.lock().tasks.get(&id).cloned())
    }

    async fn claim_next_task(&self, now: i64) -> Result<Option<ClaimedRecord>, StoreError> {
        self.write("claim_next_task")?;
        let mut state = self.state.lock();
        let next_id = state
            .tasks
            .values()
            .filter(|t| t.exec_time <= now)
            .min_by_key(|t| claim_order(t))
            .map(|t| t.id);

        let Some(id) = next_id else {
            return Ok(None);
        };
        let Some(task) = state.tasks.get_mut(&id) else {
            return Ok(None);
        };

        let restarted = task.exec_time == 0;
        if !restarted {
            task.apparent_time = task.exec_time;
        }
        task.exec_time = 0;
        task.claim_count += 1;
        Ok(Some(ClaimedRecord {
            task: task.clone(),
            restarted,
        }))
    }

    async fn next_exec_time(&self) -> Result<Option<i64>, StoreError> {
        Ok(self.state.lock().tasks.values().map(|t| t.exec_time).min())
    }

    async fn update_task(&self, task: &Task) -> Result<(), StoreError> {
        self.write("update_task")?;
        let mut state = self.state.lock();
        match state.tasks.get_mut(&task.id) {
            Some(stored) => {
                *stored = task.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound {
                kind: RecordKind::Task,
                key: task.id.to_string(),
            }),
        }
    }

    async fn delete_task(&self, id: TaskId) -> Result<bool, StoreError> {
        self.write("delete_task")?;
        Ok(self.state.lock().tasks.remove(&id).is_some())
    }

    async fn find_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, StoreError> {
        let state = self.state.lock();
        let mut tasks: Vec<Task> = state
            .tasks
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        tasks.sort_by_key(claim_order);
        Ok(tasks)
    }

    async fn append_timeline_entry(
        &self,
        entry: NewTimelineEntry,
        expected_last: i64,
    ) -> Result<TimelineEntry, StoreError> {
        self.write("append_timeline_entry")?;
        let mut state = self.state.lock();
        let entries = state.timelines.entry(entry.event_id.clone()).or_default();
        let found = entries.last().map(|e| e.sequence_no).unwrap_or(0);
        if found != expected_last {
            return Err(StoreError::VersionConflict {
                kind: RecordKind::TimelineEntry,
                key: entry.event_id,
                expected: Some(expected_last),
                found: Some(found),
            });
        }
        let stored = TimelineEntry {
            event_id: entry.event_id,
            sequence_no: expected_last + 1,
            action_code: entry.action_code,
            action_time: entry.action_time,
            payload: entry.payload,
        };
        entries.push(stored.clone());
        Ok(stored)
    }

    async fn timeline_entries(&self, event_id: &str) -> Result<Vec<TimelineEntry>, StoreError> {
        Ok(self
            .state
            .lock()
            .timelines
            .get(event_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn latest_timeline_entry(
        &self,
        event_id: &str,
    ) -> Result<Option<TimelineEntry>, StoreError> {
        Ok(self
            .state
            .lock()
            .timelines
            .get(event_id)
            .and_then(|entries| entries.last().cloned()))
    }

    async fn timeline_event_ids(&self) -> Result<Vec<String>, StoreError> {
        Ok(self
            .state
            .lock()
            .timelines
            .iter()
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn replace_timeline(
        &self,
        event_id: &str,
        entries: Vec<NewTimelineEntry>,
    ) -> Result<Vec<TimelineEntry>, StoreError> {
        self.write("replace_timeline")?;
        let rewritten: Vec<TimelineEntry> = entries
            .into_iter()
            .zip(1..)
            .map(|(entry, sequence_no)| TimelineEntry {
                event_id: event_id.to_string(),
                sequence_no,
                action_code: entry.action_code,
                action_time: entry.action_time,
                payload: entry.payload,
            })
            .collect();
        self.state
            .lock()
            .timelines
            .insert(event_id.to_string(), rewritten.clone());
        Ok(rewritten)
    }

    async fn put_relay_item(&self, item: RelayItem) -> Result<RelayWrite, StoreError> {
        self.write("put_relay_item")?;
        let mut state = self.state.lock();
        let key = (item.topic, item.relay_id.clone());
        if let Some(stored) = state.relay.get(&key) {
            if stored.relay_time > item.relay_time {
                return Ok(RelayWrite::Superseded {
                    stored_time: stored.relay_time,
                });
            }
        }
        state.relay.insert(key, item);
        Ok(RelayWrite::Stored)
    }

    async fn get_relay_item(
        &self,
        topic: RelayTopic,
        relay_id: &str,
    ) -> Result<Option<RelayItem>, StoreError> {
        Ok(self
            .state
            .lock()
            .relay
            .get(&(topic, relay_id.to_string()))
            .cloned())
    }

    async fn query_relay_items(
        &self,
        topic: RelayTopic,
        min_time: i64,
        max_time: i64,
    ) -> Result<Vec<RelayItem>, StoreError> {
        let state = self.state.lock();
        let mut items: Vec<RelayItem> = state
            .relay
            .values()
            .filter(|i| i.topic == topic && i.relay_time >= min_time && i.relay_time <= max_time)
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            a.relay_time
                .cmp(&b.relay_time)
                .then_with(|| a.relay_id.cmp(&b.relay_id))
        });
        Ok(items)
    }

    async fn delete_relay_items_before(
        &self,
        topic: RelayTopic,
        time: i64,
    ) -> Result<usize, StoreError> {
        self.write("delete_relay_items_before")?;
        let mut state = self.state.lock();
        let before = state.relay.len();
        state
            .relay
            .retain(|_, item| item.topic != topic || item.relay_time >= time);
        Ok(before - state.relay.len())
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
        self.state.lock().logs.push(stored.clone());
        Ok(stored)
    }

    async fn query_log_entries(&self, filter: &LogFilter) -> Result<Vec<LogEntry>, StoreError> {
        let state = self.state.lock();
        let mut entries: Vec<LogEntry> = state
            .logs
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.log_time);
        if let Some(limit) = filter.limit {
            entries.truncate(limit);
        }
        Ok(entries)
    }

    async fn delete_log_entries_before(&self, time: i64) -> Result<usize, StoreError> {
        self.write("delete_log_entries_before")?;
        let mut state = self.state.lock();
        let before = state.logs.len();
        state.logs.retain(|e| e.log_time >= time);
        Ok(before - state.logs.len())
    }

    async fn count(&self, kind: RecordKind) -> Result<u64, StoreError> {
        let state = self.state.lock();
        let count = match kind {
            RecordKind::Task => state.tasks.len(),
            RecordKind::TimelineEntry => state.timelines.values().map(Vec::len).sum(),
            RecordKind::RelayItem => state.relay.len(),
            RecordKind::LogEntry => state.logs.len(),
        };
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::Opcode;

    fn new_task(opcode: Opcode, event_id: &str, exec_time: i64) -> NewTask {
        NewTask {
            opcode,
            event_id: event_id.to_string(),
            stage: 0,
            exec_time,
            submit_id: "test".to_string(),
            payload: "{}".to_string(),
        }
    }

    #[tokio::test]
    async fn test_claim_orders_by_exec_time_then_submit_time() {
        let store = MemoryStore::new();
        store
            .insert_task(new_task(Opcode::NoOp, "late", 300), 2)
            .await
            .unwrap();
        store
            .insert_task(new_task(Opcode::NoOp, "second", 100), 2)
            .await
            .unwrap();
        store
            .insert_task(new_task(Opcode::NoOp, "first", 100), 1)
            .await
            .unwrap();

        let claimed = store.claim_next_task(200).await.unwrap().unwrap();
        assert_eq!(claimed.task.event_id, "first");
        assert_eq!(claimed.task.exec_time, 0);
        assert_eq!(claimed.task.apparent_time, 100);
        assert_eq!(claimed.task.claim_count, 1);
        assert!(!claimed.restarted);

        // The active task sorts first and is reported as restarted.
        let again = store.claim_next_task(200).await.unwrap().unwrap();
        assert_eq!(again.task.event_id, "first");
        assert!(again.restarted);
        assert_eq!(again.task.claim_count, 2);
        assert_eq!(again.task.apparent_time, 100);
    }

    #[tokio::test]
    async fn test_claim_ignores_future_tasks() {
        let store = MemoryStore::new();
        store
            .insert_task(new_task(Opcode::NoOp, "future", 1_000), 0)
            .await
            .unwrap();
        assert!(store.claim_next_task(999).await.unwrap().is_none());
        assert_eq!(store.next_exec_time().await.unwrap(), Some(1_000));
    }

    #[tokio::test]
    async fn test_guarded_append() {
        let store = MemoryStore::new();
        let entry = |t| NewTimelineEntry {
            event_id: "us1000abc".to_string(),
            action_code: 1,
            action_time: t,
            payload: "{}".to_string(),
        };
        let first = store.append_timeline_entry(entry(10), 0).await.unwrap();
        assert_eq!(first.sequence_no, 1);
        let err = store.append_timeline_entry(entry(20), 0).await.unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { .. }));
        let second = store.append_timeline_entry(entry(20), 1).await.unwrap();
        assert_eq!(second.sequence_no, 2);
    }

    #[tokio::test]
    async fn test_relay_rejects_older_and_accepts_equal() {
        let store = MemoryStore::new();
        let item = |t, p: &str| RelayItem {
            topic: RelayTopic::ServerStatus,
            relay_id: "1".to_string(),
            relay_time: t,
            payload: p.to_string(),
        };
        assert!(store.put_relay_item(item(100, "a")).await.unwrap().is_stored());
        assert_eq!(
            store.put_relay_item(item(50, "b")).await.unwrap(),
            RelayWrite::Superseded { stored_time: 100 }
        );
        assert!(store.put_relay_item(item(100, "c")).await.unwrap().is_stored());
        let stored = store
            .get_relay_item(RelayTopic::ServerStatus, "1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.payload, "c");
    }

    #[tokio::test]
    async fn test_read_only_rejects_writes() {
        let store = MemoryStore::with_access(AccessLevel::ReadOnly);
        let err = store
            .insert_task(new_task(Opcode::NoOp, "x", 0), 0)
            .await
            .unwrap_err();
        assert!(err.is_configuration_violation());
        assert!(store.find_tasks(&TaskFilter::all()).await.unwrap().is_empty());
    }
}
