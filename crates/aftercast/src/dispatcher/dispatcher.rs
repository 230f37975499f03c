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

//! The dispatcher loop.
//!
//! A single worker per server repeatedly claims the earliest due task,
//! runs the handler registered for its opcode and applies the result code.
//! A crash leaves the claimed task active (`exec_time == 0`), so it is the
//! first task claimed after restart and its handler sees `restarted`.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::handler::{HandlerContext, HandlerTable};
use super::opcode::Opcode;
use super::payload::{Payload, CONSOLE_EVENT_ID};
use super::result_code::{ResultCode, ResultFamily};
use super::work_distributor::WorkDistributor;
use crate::clock::Clock;
use crate::database::{RecordStore, TaskFilter};
use crate::error::{DispatchError, StoreError};
use crate::metrics;
use crate::models::{ClaimedRecord, NewLogEntry, NewTask, Task, TaskId, CANCEL_STAGE};

/// Cheaply cloneable handle for submitting work to a dispatcher.
#[derive(Clone)]
pub struct DispatchHandle {
    store: Arc<dyn RecordStore>,
    clock: Clock,
    distributor: Arc<dyn WorkDistributor>,
    submit_id: String,
}

impl DispatchHandle {
    pub fn new(
        store: Arc<dyn RecordStore>,
        clock: Clock,
        distributor: Arc<dyn WorkDistributor>,
        submit_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            clock,
            distributor,
            submit_id: submit_id.into(),
        }
    }

    /// Queues a task for `payload`'s opcode to run at `exec_time`.
    pub async fn submit(
        &self,
        event_id: &str,
        exec_time: i64,
        payload: &Payload,
    ) -> Result<TaskId, DispatchError> {
        self.submit_staged(event_id, exec_time, 0, payload).await
    }

    pub async fn submit_staged(
        &self,
        event_id: &str,
        exec_time: i64,
        stage: i32,
        payload: &Payload,
    ) -> Result<TaskId, DispatchError> {
        if self.distributor.is_shutdown() {
            return Err(DispatchError::ShuttingDown);
        }
        let opcode = payload.opcode();
        let new_task = NewTask {
            opcode,
            event_id: event_id.to_string(),
            stage,
            // Zero would mark the task as already claimed.
            exec_time: exec_time.max(1),
            submit_id: self.submit_id.clone(),
            payload: payload.encode()?,
        };
        let task = self.store.insert_task(new_task, self.clock.now()).await?;
        debug!(task_id = %task.id, %opcode, event_id, exec_time = task.exec_time, "Task submitted");
        self.distributor.notify();
        Ok(task.id)
    }

    /// Submits a task that does not act on an event, due now.
    pub async fn submit_control(&self, payload: &Payload) -> Result<TaskId, DispatchError> {
        let event_id = payload.control_event_id().unwrap_or(CONSOLE_EVENT_ID);
        self.submit(event_id, self.clock.now(), payload).await
    }

    /// Queues a shutdown task behind everything already due.
    pub async fn request_shutdown(&self) -> Result<TaskId, DispatchError> {
        self.submit_control(&Payload::Shutdown).await
    }

    /// Restages every waiting task matching `(opcode, event_id)` to the
    /// cancel stage, due now. Returns the number of tasks cancelled.
    pub async fn cancel(&self, opcode: Opcode, event_id: &str) -> Result<usize, DispatchError> {
        let now = self.clock.now();
        let mut cancelled = 0;
        for mut task in self
            .store
            .find_tasks(&TaskFilter::for_opcode(opcode, event_id))
            .await?
        {
            if task.is_active() || task.is_cancelled() {
                continue;
            }
            task.restage(now, CANCEL_STAGE);
            self.store.update_task(&task).await?;
            cancelled += 1;
        }
        if cancelled > 0 {
            debug!(%opcode, event_id, cancelled, "Tasks cancelled");
            self.distributor.notify();
        }
        Ok(cancelled)
    }

    /// Deletes waiting timeline commands for the event, except `keep`.
    ///
    /// A claimed command is left for the dispatcher to finish.
    pub async fn delete_timeline_commands(
        &self,
        event_id: &str,
        keep: Option<TaskId>,
    ) -> Result<usize, DispatchError> {
        let mut deleted = 0;
        for task in self
            .store
            .find_tasks(&TaskFilter::for_event(event_id))
            .await?
        {
            if Some(task.id) == keep || task.is_active() || !task.opcode.is_timeline_command() {
                continue;
            }
            if self.store.delete_task(task.id).await? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    /// Cuts the dispatcher's current sleep short.
    pub fn wake(&self) {
        self.distributor.notify();
    }

    /// Stops the loop after the current task; further submits fail.
    pub fn shutdown(&self) {
        self.distributor.shutdown();
    }

    pub fn is_shutdown(&self) -> bool {
        self.distributor.is_shutdown()
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }
}

/// What happened to one claimed task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed(ResultCode),
    /// The handler faulted; the task will run again.
    Faulted { fault_count: i32 },
    Quarantined,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub task_id: TaskId,
    pub opcode: Opcode,
    pub event_id: String,
    pub outcome: TaskOutcome,
}

impl DispatchOutcome {
    pub fn result_code(&self) -> Option<ResultCode> {
        match self.outcome {
            TaskOutcome::Completed(code) => Some(code),
            TaskOutcome::Quarantined => Some(ResultCode::Quarantined),
            TaskOutcome::Faulted { .. } => None,
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.outcome == TaskOutcome::Completed(ResultCode::Shutdown)
    }
}

pub struct Dispatcher {
    ctx: Arc<HandlerContext>,
    handlers: HandlerTable,
    distributor: Arc<dyn WorkDistributor>,
}

impl Dispatcher {
    pub fn new(
        ctx: Arc<HandlerContext>,
        handlers: HandlerTable,
        distributor: Arc<dyn WorkDistributor>,
    ) -> Self {
        let missing = handlers.missing();
        if !missing.is_empty() {
            warn!(?missing, "Dispatcher created without handlers for some opcodes");
        }
        Self {
            ctx,
            handlers,
            distributor,
        }
    }

    pub fn context(&self) -> &Arc<HandlerContext> {
        &self.ctx
    }

    pub fn handle(&self) -> DispatchHandle {
        self.ctx.dispatch.clone()
    }

    /// Runs until a shutdown task completes or the handle is shut down.
    pub async fn run_loop(&self) -> Result<(), DispatchError> {
        info!("Dispatcher loop started");
        loop {
            if self.distributor.is_shutdown() {
                break;
            }
            match self.run_once().await {
                Ok(Some(outcome)) if outcome.is_shutdown() => {
                    self.distributor.shutdown();
                    break;
                }
                Ok(Some(_)) => continue,
                Ok(None) => {
                    let wait = self.idle_wait().await;
                    self.distributor.wait_for_work(wait).await;
                }
                Err(e) => {
                    error!(error = %e, "Dispatcher iteration failed");
                    let delay = self.ctx.config.get().dispatcher.fault_delay_ms;
                    self.distributor
                        .wait_for_work(Duration::from_millis(delay.max(0) as u64))
                        .await;
                }
            }
        }
        info!("Dispatcher loop stopped");
        Ok(())
    }

    /// Runs tasks until none is due, returning their outcomes.
    ///
    /// Stops early after a shutdown task or after `limit` tasks.
    pub async fn run_until_idle(&self, limit: usize) -> Result<Vec<DispatchOutcome>, DispatchError> {
        let mut outcomes = Vec::new();
        while outcomes.len() < limit {
            match self.run_once().await? {
                Some(outcome) => {
                    let stop = outcome.is_shutdown();
                    outcomes.push(outcome);
                    if stop {
                        break;
                    }
                }
                None => break,
            }
        }
        Ok(outcomes)
    }

    async fn idle_wait(&self) -> Duration {
        let cap = self.ctx.config.get().dispatcher.idle_poll_ms.max(1);
        let now = self.ctx.clock.now();
        let millis = match self.ctx.store.next_exec_time().await {
            Ok(Some(next)) => (next - now).clamp(1, cap),
            Ok(None) => cap,
            Err(e) => {
                warn!(error = %e, "Could not read next execution time");
                cap
            }
        };
        Duration::from_millis(millis as u64)
    }

    /// Claims and executes at most one due task.
    pub async fn run_once(&self) -> Result<Option<DispatchOutcome>, DispatchError> {
        let now = self.ctx.clock.now();
        let Some(claimed) = self.ctx.store.claim_next_task(now).await? else {
            return Ok(None);
        };

        let span = info_span!(
            "task",
            task_id = %claimed.task.id,
            opcode = %claimed.task.opcode,
            event_id = %claimed.task.event_id,
        );
        self.execute(claimed).instrument(span).await.map(Some)
    }

    async fn execute(&self, mut claimed: ClaimedRecord) -> Result<DispatchOutcome, DispatchError> {
        let config = self.ctx.config.get();
        let store = &self.ctx.store;
        let opcode = claimed.task.opcode;

        if claimed.restarted {
            claimed.task.fault_count += 1;
            warn!(fault_count = claimed.task.fault_count, "Task restarted after interruption");
            // Persist the count now so that a crash loop still reaches the ceiling.
            store.update_task(&claimed.task).await?;
        }
        if claimed.task.fault_count > config.dispatcher.max_faults {
            return self.quarantine(claimed.task).await;
        }

        let payload = match Payload::decode(opcode, &claimed.task.id.to_string(), &claimed.task.payload)
        {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, "Discarding task with corrupt payload");
                return self
                    .complete(claimed.task, ResultCode::Corrupt, e.to_string(), 0.0)
                    .await;
            }
        };

        let Some(handler) = self.handlers.get(opcode).cloned() else {
            error!("No handler registered for opcode");
            return self
                .complete(
                    claimed.task,
                    ResultCode::Fatal,
                    format!("no handler registered for {}", opcode),
                    0.0,
                )
                .await;
        };

        let started = Instant::now();
        let result = handler.execute(&self.ctx, &mut claimed, payload).await;
        let elapsed = started.elapsed().as_secs_f64();

        match result {
            Ok(code) => {
                self.ctx.health.record_success();
                self.complete(claimed.task, code, String::new(), elapsed).await
            }
            Err(e) if e.is_corrupt_record() => {
                error!(error = %e, "Discarding task that read a corrupt record");
                self.ctx.health.record_fault(self.ctx.clock.now());
                self.complete(claimed.task, ResultCode::Corrupt, e.to_string(), elapsed)
                    .await
            }
            Err(e) if e.is_fatal() => {
                error!(error = %e, "Task failed with an unretryable error");
                self.ctx.health.record_fault(self.ctx.clock.now());
                self.complete(claimed.task, ResultCode::Fatal, e.to_string(), elapsed)
                    .await
            }
            Err(e) => {
                let mut task = claimed.task;
                task.fault_count += 1;
                metrics::record_task_fault(opcode);
                self.ctx.health.record_fault(self.ctx.clock.now());
                if task.fault_count > config.dispatcher.max_faults {
                    error!(error = %e, fault_count = task.fault_count, "Task exceeded fault ceiling");
                    return self.quarantine(task).await;
                }
                let retry_at = self.ctx.clock.now() + config.dispatcher.fault_delay_ms;
                warn!(
                    error = %e,
                    fault_count = task.fault_count,
                    retry_at,
                    "Task faulted, rescheduling"
                );
                let stage = task.stage;
                task.restage(retry_at, stage);
                store.update_task(&task).await?;
                Ok(DispatchOutcome {
                    task_id: task.id,
                    opcode,
                    event_id: task.event_id,
                    outcome: TaskOutcome::Faulted {
                        fault_count: task.fault_count,
                    },
                })
            }
        }
    }

    /// Applies a handler result code to the task.
    async fn complete(
        &self,
        mut task: Task,
        code: ResultCode,
        details: String,
        elapsed: f64,
    ) -> Result<DispatchOutcome, DispatchError> {
        let store = &self.ctx.store;
        match code.family() {
            ResultFamily::Normal => {
                store.delete_task(task.id).await?;
                self.write_log(&task, code, details).await?;
                info!(result = %code, "Task completed");
            }
            ResultFamily::Delete => {
                store.delete_task(task.id).await?;
                debug!(result = %code, "Task deleted");
            }
            ResultFamily::Stage => {
                if task.is_active() {
                    // A stage result must carry a new time; run again now.
                    let now = self.ctx.clock.now();
                    let stage = task.stage;
                    task.restage(now, stage);
                }
                store.update_task(&task).await?;
                debug!(result = %code, exec_time = task.exec_time, stage = task.stage, "Task restaged");
            }
        }
        metrics::record_task_completed(task.opcode, code, elapsed);
        Ok(DispatchOutcome {
            task_id: task.id,
            opcode: task.opcode,
            event_id: task.event_id,
            outcome: TaskOutcome::Completed(code),
        })
    }

    async fn quarantine(&self, task: Task) -> Result<DispatchOutcome, DispatchError> {
        let snapshot = serde_json::to_string(&task)?;
        self.ctx.store.delete_task(task.id).await?;
        self.write_log(&task, ResultCode::Quarantined, snapshot).await?;
        metrics::record_task_quarantined(task.opcode);
        self.ctx.health.record_quarantine();
        error!(fault_count = task.fault_count, "Task quarantined");
        Ok(DispatchOutcome {
            task_id: task.id,
            opcode: task.opcode,
            event_id: task.event_id,
            outcome: TaskOutcome::Quarantined,
        })
    }

    async fn write_log(&self, task: &Task, code: ResultCode, details: String) -> Result<(), StoreError> {
        self.ctx
            .store
            .insert_log_entry(NewLogEntry {
                log_time: self.ctx.clock.now(),
                opcode: task.opcode,
                event_id: task.event_id.clone(),
                stage: task.stage,
                result_code: code,
                payload: task.payload.clone(),
                details,
            })
            .await?;
        Ok(())
    }
}
