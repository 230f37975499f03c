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

//! Periodic jobs: catalog polling and store cleanup.
//!
//! Each job is a single repeating task under a placeholder event id. A run
//! restages itself one interval ahead; stopping cancels the waiting run.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::control::unexpected;
use super::support::catalog_call;
use crate::database::TaskFilter;
use crate::dispatcher::{
    HandlerContext, IntakeRequest, Opcode, Payload, ResultCode, TaskHandler, CLEANUP_EVENT_ID,
    POLL_EVENT_ID,
};
use crate::error::HandlerError;
use crate::models::{ClaimedRecord, RelayTopic};

/// Starts the job if no run is waiting.
async fn start_job(
    ctx: &HandlerContext,
    run: Payload,
    event_id: &str,
) -> Result<ResultCode, HandlerError> {
    let waiting = ctx
        .store
        .find_tasks(&TaskFilter::for_opcode(run.opcode(), event_id))
        .await?
        .into_iter()
        .any(|t| !t.is_cancelled());
    if waiting {
        debug!(job = %run.opcode(), "Job already scheduled");
        return Ok(ResultCode::DeleteNoop);
    }
    ctx.dispatch.submit(event_id, ctx.clock.now(), &run).await?;
    info!(job = %run.opcode(), "Job started");
    Ok(ResultCode::Success)
}

async fn stop_job(
    ctx: &HandlerContext,
    opcode: Opcode,
    event_id: &str,
) -> Result<ResultCode, HandlerError> {
    let cancelled = ctx.dispatch.cancel(opcode, event_id).await?;
    info!(job = %opcode, cancelled, "Job stopped");
    Ok(ResultCode::Success)
}

fn repeat(claimed: &mut ClaimedRecord, now: i64, interval_ms: i64) -> ResultCode {
    let stage = claimed.task.stage;
    claimed.task.restage(now + interval_ms.max(1), stage);
    ResultCode::StageRepeat
}

/// `poll_start`, `poll_stop` and `poll_run`.
pub struct PollHandler;

#[async_trait]
impl TaskHandler for PollHandler {
    async fn execute(
        &self,
        ctx: &HandlerContext,
        claimed: &mut ClaimedRecord,
        payload: Payload,
    ) -> Result<ResultCode, HandlerError> {
        match payload {
            Payload::PollStart => start_job(ctx, Payload::PollRun, POLL_EVENT_ID).await,
            Payload::PollStop => stop_job(ctx, Opcode::PollRun, POLL_EVENT_ID).await,
            Payload::PollRun => {
                if claimed.task.is_cancelled() {
                    return Ok(ResultCode::DeleteCancelled);
                }
                let config = ctx.config.get();
                let now = ctx.clock.now();
                let recent = catalog_call(
                    &config,
                    ctx.services.catalog.poll_recent(
                        now - config.poll.lookback_ms,
                        now,
                        config.intake.min_magnitude,
                    ),
                )
                .await;
                match recent {
                    Ok(events) => {
                        let mut submitted = 0;
                        for mainshock in events {
                            if ctx.timelines.open(&mainshock.event_id).await?.is_some() {
                                continue;
                            }
                            ctx.dispatch
                                .submit(
                                    &mainshock.event_id,
                                    now,
                                    &Payload::IntakePoll(IntakeRequest::default()),
                                )
                                .await?;
                            submitted += 1;
                        }
                        debug!(submitted, "Catalog poll complete");
                    }
                    Err(e) => warn!(error = %e, "Catalog poll failed"),
                }
                Ok(repeat(claimed, now, config.poll.interval_ms))
            }
            other => Err(unexpected(&other)),
        }
    }
}

/// `cleanup_start`, `cleanup_stop` and `cleanup_run`.
pub struct CleanupHandler;

#[async_trait]
impl TaskHandler for CleanupHandler {
    async fn execute(
        &self,
        ctx: &HandlerContext,
        claimed: &mut ClaimedRecord,
        payload: Payload,
    ) -> Result<ResultCode, HandlerError> {
        match payload {
            Payload::CleanupStart => start_job(ctx, Payload::CleanupRun, CLEANUP_EVENT_ID).await,
            Payload::CleanupStop => stop_job(ctx, Opcode::CleanupRun, CLEANUP_EVENT_ID).await,
            Payload::CleanupRun => {
                if claimed.task.is_cancelled() {
                    return Ok(ResultCode::DeleteCancelled);
                }
                let config = ctx.config.get();
                let now = ctx.clock.now();
                let logs = ctx
                    .store
                    .delete_log_entries_before(now - config.cleanup.log_retention_ms)
                    .await?;
                let mut relay_items = 0;
                // Server status items are live state and never expire.
                for topic in [
                    RelayTopic::PdlCompletion,
                    RelayTopic::ForeignProduct,
                    RelayTopic::AnalystSelection,
                ] {
                    relay_items += ctx
                        .relay
                        .delete_items_before(topic, now - config.cleanup.relay_retention_ms)
                        .await?;
                }
                info!(logs, relay_items, "Cleanup complete");
                Ok(repeat(claimed, now, config.cleanup.interval_ms))
            }
            other => Err(unexpected(&other)),
        }
    }
}
