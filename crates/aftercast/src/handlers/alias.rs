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

//! Alias operations: stopping, reviving and splitting event timelines when
//! the catalog merges or separates event ids.

use async_trait::async_trait;
use tracing::info;

use super::control::unexpected;
use super::support::{delete_published, next_live_lag};
use crate::dispatcher::{
    AliasSplitRequest, AliasStopRequest, HandlerContext, IntakeRequest, Payload, ResultCode,
    TaskHandler,
};
use crate::error::HandlerError;
use crate::models::{ClaimedRecord, TimelineAction};
use crate::timeline::ForecastStatus;

/// `alias_stop`, `alias_revive` and `alias_split`.
pub struct AliasHandler;

#[async_trait]
impl TaskHandler for AliasHandler {
    async fn execute(
        &self,
        ctx: &HandlerContext,
        claimed: &mut ClaimedRecord,
        payload: Payload,
    ) -> Result<ResultCode, HandlerError> {
        if claimed.task.is_cancelled() {
            return Ok(ResultCode::DeleteCancelled);
        }
        match payload {
            Payload::AliasStop(request) => stop(ctx, claimed, request).await,
            Payload::AliasRevive => revive(ctx, claimed).await,
            Payload::AliasSplit(request) => split(ctx, claimed, request).await,
            other => Err(unexpected(&other)),
        }
    }
}

async fn stop(
    ctx: &HandlerContext,
    claimed: &ClaimedRecord,
    request: AliasStopRequest,
) -> Result<ResultCode, HandlerError> {
    let Some(timeline) = ctx.timelines.open(&claimed.task.event_id).await? else {
        return Ok(ResultCode::NoTimeline);
    };
    if timeline.status.forecast_status.is_terminal()
        || timeline.status.forecast_status == ForecastStatus::Stopped
    {
        return Ok(ResultCode::DeleteNoop);
    }

    let mut status = timeline.status.clone();
    status.forecast_status = ForecastStatus::Stopped;
    let updated = ctx
        .timelines
        .append(&timeline, status, TimelineAction::AliasStop)
        .await?;
    ctx.dispatch
        .delete_timeline_commands(&claimed.task.event_id, Some(claimed.task.id))
        .await?;
    info!(reason = %request.reason, "Timeline stopped");

    if ctx.config.get().publish.delete_on_stop {
        delete_published(ctx, &updated.status, &request.reason).await;
    }
    Ok(ResultCode::Stopped)
}

async fn revive(ctx: &HandlerContext, claimed: &ClaimedRecord) -> Result<ResultCode, HandlerError> {
    let Some(timeline) = ctx.timelines.open(&claimed.task.event_id).await? else {
        return Ok(ResultCode::NoTimeline);
    };
    if timeline.status.forecast_status != ForecastStatus::Stopped {
        return Ok(ResultCode::DeleteNoop);
    }
    let config = ctx.config.get();
    let now = ctx.clock.now();
    let origin = timeline.status.origin_time().unwrap_or(now);

    let mut status = timeline.status.clone();
    status.forecast_status = ForecastStatus::Active;
    status.next_forecast_lag = next_live_lag(&config, origin, timeline.status.last_forecast_lag + 1, now);
    let updated = ctx
        .timelines
        .append(&timeline, status, TimelineAction::AliasRevive)
        .await?;
    ctx.timelines
        .resubmit_next(&ctx.dispatch, &updated.status, &config, Some(claimed.task.id))
        .await?;
    info!(next_lag = updated.status.next_forecast_lag, "Timeline revived");
    Ok(ResultCode::Success)
}

/// Detaches `new_event_id` from this timeline's aliases and takes it in as
/// an event of its own.
async fn split(
    ctx: &HandlerContext,
    claimed: &ClaimedRecord,
    request: AliasSplitRequest,
) -> Result<ResultCode, HandlerError> {
    let Some(timeline) = ctx.timelines.open(&claimed.task.event_id).await? else {
        return Ok(ResultCode::NoTimeline);
    };
    if timeline.status.aliases.iter().any(|a| *a == request.new_event_id) {
        let mut status = timeline.status.clone();
        status.aliases.retain(|a| *a != request.new_event_id);
        let updated = ctx
            .timelines
            .append(&timeline, status, TimelineAction::AliasSplit)
            .await?;
        let config = ctx.config.get();
        ctx.timelines
            .resubmit_next(&ctx.dispatch, &updated.status, &config, Some(claimed.task.id))
            .await?;
    }
    ctx.dispatch
        .submit(
            &request.new_event_id,
            ctx.clock.now(),
            &Payload::IntakeSync(IntakeRequest::default()),
        )
        .await?;
    info!(new_event_id = %request.new_event_id, "Alias split off");
    Ok(ResultCode::Success)
}
