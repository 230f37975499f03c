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

//! Row structs for the SQLite backend.
//!
//! Rows keep raw integer codes and text ids; conversion to domain types
//! happens here so that a row with an unknown code surfaces as a
//! [`CorruptRecord`] instead of a query failure.

use diesel::prelude::*;
use uuid::Uuid;

use super::schema::{log_entries, relay_items, tasks, timeline_entries};
use crate::dispatcher::{Opcode, ResultCode};
use crate::error::CorruptRecord;
use crate::models::{
    LogEntry, RecordKind, RelayItem, RelayTopic, Task, TaskId, TimelineEntry,
};

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = tasks)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TaskRow {
    pub id: String,
    pub opcode: i32,
    pub event_id: String,
    pub stage: i32,
    pub exec_time: i64,
    pub submit_time: i64,
    pub submit_id: String,
    pub apparent_time: i64,
    pub payload: String,
    pub claim_count: i32,
    pub fault_count: i32,
}

impl TaskRow {
    pub fn into_task(self) -> Result<Task, CorruptRecord> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| CorruptRecord::new(RecordKind::Task, &self.id, e))?;
        let opcode = Opcode::from_code(self.opcode).ok_or_else(|| {
            CorruptRecord::new(
                RecordKind::Task,
                &self.id,
                format!("unknown opcode {}", self.opcode),
            )
        })?;
        Ok(Task {
            id: TaskId(id),
            opcode,
            event_id: self.event_id,
            stage: self.stage,
            exec_time: self.exec_time,
            submit_time: self.submit_time,
            submit_id: self.submit_id,
            apparent_time: self.apparent_time,
            payload: self.payload,
            claim_count: self.claim_count,
            fault_count: self.fault_count,
        })
    }
}

impl From<&Task> for TaskRow {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.to_string(),
            opcode: task.opcode.code(),
            event_id: task.event_id.clone(),
            stage: task.stage,
            exec_time: task.exec_time,
            submit_time: task.submit_time,
            submit_id: task.submit_id.clone(),
            apparent_time: task.apparent_time,
            payload: task.payload.clone(),
            claim_count: task.claim_count,
            fault_count: task.fault_count,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = timeline_entries)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TimelineEntryRow {
    pub event_id: String,
    pub sequence_no: i64,
    pub action_code: i32,
    pub action_time: i64,
    pub payload: String,
}

impl From<TimelineEntryRow> for TimelineEntry {
    fn from(row: TimelineEntryRow) -> Self {
        Self {
            event_id: row.event_id,
            sequence_no: row.sequence_no,
            action_code: row.action_code,
            action_time: row.action_time,
            payload: row.payload,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = relay_items)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RelayItemRow {
    pub topic: i32,
    pub relay_id: String,
    pub relay_time: i64,
    pub payload: String,
}

impl RelayItemRow {
    pub fn into_item(self) -> Result<RelayItem, CorruptRecord> {
        let topic = RelayTopic::from_code(self.topic).ok_or_else(|| {
            CorruptRecord::new(
                RecordKind::RelayItem,
                &self.relay_id,
                format!("unknown topic {}", self.topic),
            )
        })?;
        Ok(RelayItem {
            topic,
            relay_id: self.relay_id,
            relay_time: self.relay_time,
            payload: self.payload,
        })
    }
}

impl From<&RelayItem> for RelayItemRow {
    fn from(item: &RelayItem) -> Self {
        Self {
            topic: item.topic.code(),
            relay_id: item.relay_id.clone(),
            relay_time: item.relay_time,
            payload: item.payload.clone(),
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = log_entries)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct LogEntryRow {
    pub id: String,
    pub log_time: i64,
    pub opcode: i32,
    pub event_id: String,
    pub stage: i32,
    pub result_code: i32,
    pub payload: String,
    pub details: String,
}

impl LogEntryRow {
    pub fn into_entry(self) -> Result<LogEntry, CorruptRecord> {
        let corrupt = |message: String| CorruptRecord::new(RecordKind::LogEntry, &self.id, message);
        let id = Uuid::parse_str(&self.id).map_err(|e| corrupt(e.to_string()))?;
        let opcode = Opcode::from_code(self.opcode)
            .ok_or_else(|| corrupt(format!("unknown opcode {}", self.opcode)))?;
        let result_code = ResultCode::from_code(self.result_code)
            .ok_or_else(|| corrupt(format!("unknown result code {}", self.result_code)))?;
        Ok(LogEntry {
            id,
            log_time: self.log_time,
            opcode,
            event_id: self.event_id,
            stage: self.stage,
            result_code,
            payload: self.payload,
            details: self.details,
        })
    }
}

impl From<&LogEntry> for LogEntryRow {
    fn from(entry: &LogEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            log_time: entry.log_time,
            opcode: entry.opcode.code(),
            event_id: entry.event_id.clone(),
            stage: entry.stage,
            result_code: entry.result_code.code(),
            payload: entry.payload.clone(),
            details: entry.details.clone(),
        }
    }
}
