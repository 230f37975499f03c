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

//! Domain records persisted by the record store.
//!
//! These are API-level types; backend-specific row structs live next to each
//! backend and are converted at the store boundary.

pub mod log_entry;
pub mod relay_item;
pub mod task;
pub mod timeline_entry;

pub use log_entry::{LogEntry, NewLogEntry};
pub use relay_item::{RelayItem, RelayTopic, RelayWrite};
pub use task::{ClaimedRecord, NewTask, Task, TaskId, CANCEL_STAGE};
pub use timeline_entry::{NewTimelineEntry, TimelineAction, TimelineEntry};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StoreError;

/// The four record kinds (collections) held by a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    Task,
    TimelineEntry,
    RelayItem,
    LogEntry,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Task => "task",
            RecordKind::TimelineEntry => "timeline_entry",
            RecordKind::RelayItem => "relay_item",
            RecordKind::LogEntry => "log_entry",
        }
    }

    pub fn all() -> [RecordKind; 4] {
        [
            RecordKind::Task,
            RecordKind::TimelineEntry,
            RecordKind::RelayItem,
            RecordKind::LogEntry,
        ]
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = StoreError;

    /// Unknown collection names are a configuration violation.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "task" | "tasks" => Ok(RecordKind::Task),
            "timeline" | "timeline_entry" | "timeline_entries" => Ok(RecordKind::TimelineEntry),
            "relay" | "relay_item" | "relay_items" => Ok(RecordKind::RelayItem),
            "log" | "log_entry" | "log_entries" => Ok(RecordKind::LogEntry),
            other => Err(StoreError::ConfigurationViolation(format!(
                "unknown record collection '{}'",
                other
            ))),
        }
    }
}
