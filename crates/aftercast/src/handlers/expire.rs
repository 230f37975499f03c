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

//! Timeline expiry.

use async_trait::async_trait;
use tracing::info;

use super::control::unexpected;
use super::support::stale_command;
use crate::dispatcher::{ExpireCommand, HandlerContext, Payload, ResultCode, TaskHandler};
use crate::error::HandlerError;
use crate::models::{ClaimedRecord, TimelineAction};
use crate::timeline::ForecastStatus;

/// `gen_expire`: ends a timeline once its forecast schedule is exhausted.
pub struct ExpireHandler;

#[async_trait]
impl TaskHandler for ExpireHandler {
    async fn execute(
        &self,
        ctx: &HandlerContext,
        claimed: &mut ClaimedRecord,
        payload: Payload,
    ) -> Result<ResultCode, HandlerError> {
        let Payload::GenExpire(ExpireCommand { expected }) = payload else {
            return Err(unexpected(&payload));
        };
        if claimed.task.is_cancelled() {
            return Ok(ResultCode::DeleteCancelled);
        }
        let Some(timeline) = ctx.timelines.open(&claimed.task.event_id).await? else {
            return Ok(ResultCode::NoTimeline);
        };
        if !timeline.status.matches(&expected) {
            return stale_command(ctx, claimed, &timeline.status).await;
        }
        if timeline.status.forecast_status.is_terminal() {
            return Ok(ResultCode::DeleteNoop);
        }

        let mut status = timeline.status.clone();
        status.forecast_status = ForecastStatus::Expired;
        ctx.timelines
            .append(&timeline, status, TimelineAction::Expire)
            .await?;
        ctx.dispatch
            .delete_timeline_commands(&claimed.task.event_id, Some(claimed.task.id))
            .await?;
        info!(last_lag = timeline.status.last_forecast_lag, "Timeline expired");
        Ok(ResultCode::Expired)
    }
}
