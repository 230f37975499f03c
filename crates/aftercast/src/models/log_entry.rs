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

//! Log Entry Model
//!
//! One log entry is written for every task that completes with a result in
//! the normal family, and for every quarantined task.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dispatcher::{Opcode, ResultCode};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: Uuid,
    pub log_time: i64,
    pub opcode: Opcode,
    pub event_id: String,
    pub stage: i32,
    pub result_code: ResultCode,
    /// The task payload at completion.
    pub payload: String,
    /// Free-form detail; a JSON task snapshot for quarantined tasks.
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLogEntry {
    pub log_time: i64,
    pub opcode: Opcode,
    pub event_id: String,
    pub stage: i32,
    pub result_code: ResultCode,
    pub payload: String,
    pub details: String,
}
