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

//! Task Model
//!
//! A task is a unit of deferred work in the dispatcher queue. Tasks are
//! ordered by `exec_time`; a task whose `exec_time` is zero has been claimed
//! by the dispatcher and is in progress. If the server crashes while a task
//! is in progress, the task stays at zero and is the first one claimed after
//! restart.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::dispatcher::Opcode;

/// Stage value meaning "cancel this operation the next time it runs".
pub const CANCEL_STAGE: i32 = -1;

/// Unique identifier of a queued task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new_v4() -> Self {
        TaskId(Uuid::new_v4())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A queued task (domain type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub opcode: Opcode,
    pub event_id: String,
    /// Sub-step within a multi-step operation, or [`CANCEL_STAGE`].
    pub stage: i32,
    /// Earliest time the task may run; zero while in progress.
    pub exec_time: i64,
    pub submit_time: i64,
    /// Who submitted the task (server name, `ctl`, ...).
    pub submit_id: String,
    /// The time the task was scheduled for before it was activated.
    pub apparent_time: i64,
    /// JSON encoding of the opcode's payload.
    pub payload: String,
    /// Number of times the dispatcher claimed this task.
    pub claim_count: i32,
    /// Faults plus crash restarts, compared against the retry ceiling.
    pub fault_count: i32,
}

impl Task {
    pub fn is_active(&self) -> bool {
        self.exec_time == 0
    }

    pub fn is_cancelled(&self) -> bool {
        self.stage == CANCEL_STAGE
    }

    /// Restage the task: it will be persisted with a new time and stage
    /// instead of being deleted.
    pub fn restage(&mut self, exec_time: i64, stage: i32) {
        self.exec_time = exec_time;
        self.apparent_time = exec_time;
        self.stage = stage;
    }
}

/// Structure for submitting a new task (domain type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    pub opcode: Opcode,
    pub event_id: String,
    pub stage: i32,
    pub exec_time: i64,
    pub submit_id: String,
    pub payload: String,
}

/// The outcome of an atomic claim.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimedRecord {
    /// The task after activation (`exec_time == 0`).
    pub task: Task,
    /// True when the task was already active before this claim, meaning a
    /// previous execution was interrupted.
    pub restarted: bool,
}
