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

//! Server metrics.
//!
//! Names and recording helpers for the `metrics` facade. Installing a
//! recorder is up to the embedding binary; without one these calls are
//! no-ops.

use ::metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

use crate::dispatcher::{Opcode, ResultCode};

// ============================================================================
// Dispatcher Metrics
// ============================================================================

/// Tasks completed, by opcode and result family.
pub const TASKS_TOTAL: &str = "aftercast_tasks_total";

/// Handler execution time.
pub const HANDLER_DURATION: &str = "aftercast_handler_duration_seconds";

/// Handler faults, by opcode.
pub const TASK_FAULTS: &str = "aftercast_task_faults_total";

/// Tasks removed after exceeding the fault ceiling.
pub const TASKS_QUARANTINED: &str = "aftercast_tasks_quarantined_total";

// ============================================================================
// Timeline and Relay Metrics
// ============================================================================

/// Timeline entries appended, by action.
pub const TIMELINE_APPENDS: &str = "aftercast_timeline_appends_total";

/// Publish attempts, by resulting publish status.
pub const PUBLISH_ATTEMPTS: &str = "aftercast_publish_attempts_total";

/// Relay engine cycles.
pub const RELAY_CYCLES: &str = "aftercast_relay_cycles_total";

/// 1 while this server is primary.
pub const RELAY_PRIMARY: &str = "aftercast_relay_primary";

/// Registers all metric descriptions.
///
/// Call this once at application startup after installing the recorder.
pub fn register_metrics() {
    describe_counter!(TASKS_TOTAL, "Total tasks completed by the dispatcher");
    describe_histogram!(HANDLER_DURATION, "Task handler execution time in seconds");
    describe_counter!(TASK_FAULTS, "Total handler faults");
    describe_counter!(TASKS_QUARANTINED, "Total tasks quarantined");
    describe_counter!(TIMELINE_APPENDS, "Total timeline entries appended");
    describe_counter!(PUBLISH_ATTEMPTS, "Total publish attempts");
    describe_counter!(RELAY_CYCLES, "Total relay engine cycles");
    describe_gauge!(RELAY_PRIMARY, "Whether this server is primary");
}

pub fn record_task_completed(opcode: Opcode, code: ResultCode, duration_secs: f64) {
    counter!(
        TASKS_TOTAL,
        "opcode" => opcode.as_str(),
        "family" => code.family().as_str()
    )
    .increment(1);
    histogram!(HANDLER_DURATION, "opcode" => opcode.as_str()).record(duration_secs);
}

pub fn record_task_fault(opcode: Opcode) {
    counter!(TASK_FAULTS, "opcode" => opcode.as_str()).increment(1);
}

pub fn record_task_quarantined(opcode: Opcode) {
    counter!(TASKS_QUARANTINED, "opcode" => opcode.as_str()).increment(1);
}

pub fn record_timeline_append(action: &'static str) {
    counter!(TIMELINE_APPENDS, "action" => action).increment(1);
}

pub fn record_publish_attempt(status: &'static str) {
    counter!(PUBLISH_ATTEMPTS, "status" => status).increment(1);
}

pub fn record_relay_cycle(is_primary: bool) {
    counter!(RELAY_CYCLES).increment(1);
    gauge!(RELAY_PRIMARY).set(if is_primary { 1.0 } else { 0.0 });
}
