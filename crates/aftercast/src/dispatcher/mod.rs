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

//! # Task Dispatcher
//!
//! A durable, single-consumer queue of timed tasks. Every task names an
//! [`Opcode`]; the [`Dispatcher`] claims the earliest due task, runs the
//! [`TaskHandler`] registered for the opcode and applies the returned
//! [`ResultCode`]:
//!
//! - normal family: delete the task and write a log entry
//! - delete family: delete the task silently
//! - stage family: persist the task as the handler restaged it
//!
//! Handler errors are faults. The task is kept and retried after the
//! configured fault delay until its fault count exceeds the ceiling, at which
//! point it is quarantined.

#[allow(clippy::module_inception)]
pub mod dispatcher;
pub mod handler;
pub mod opcode;
pub mod payload;
pub mod result_code;
pub mod work_distributor;

pub use dispatcher::{DispatchHandle, DispatchOutcome, Dispatcher, TaskOutcome};
pub use handler::{HandlerContext, HandlerTable, TaskHandler};
pub use opcode::Opcode;
pub use payload::{
    AliasSplitRequest, AliasStopRequest, AnalystRequest, ConsoleMessage, ExpireCommand,
    ForecastCommand, ForeignProductNotice, IntakeRequest, Payload, RelayModeRequest,
    ReportCommand, CLEANUP_EVENT_ID, CONSOLE_EVENT_ID, HEALTH_EVENT_ID, POLL_EVENT_ID,
    RELAY_EVENT_ID, SHUTDOWN_EVENT_ID,
};
pub use result_code::{ResultCode, ResultFamily};
pub use work_distributor::{LocalDistributor, WorkDistributor};
