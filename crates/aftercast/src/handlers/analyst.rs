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

//! Analyst interventions.
//!
//! An intervention on one server is shared through the relay store and then
//! applied on each server as a local `analyst_selection` task, so both
//! timelines see the same options.

use async_trait::async_trait;
use tracing::{debug, info};

use super::control::unexpected;
use crate::dispatcher::{AnalystRequest, HandlerContext, IntakeRequest, Payload, ResultCode, TaskHandler};
use crate::error::HandlerError;
use crate::models::{ClaimedRecord, TimelineAction};
use crate::timeline::IntakeOption;

/// `analyst_intervene` and `analyst_selection`.
pub struct AnalystHandler;

#[async_trait]
impl TaskHandler for AnalystHandler {
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
            Payload::AnalystIntervene(request) => intervene(ctx, claimed, request).await,
            Payload::AnalystSelection(request) => select(ctx, claimed, request).await,
            other => Err(unexpected(&other)),
        }
    }
}

async fn intervene(
    ctx: &HandlerContext,
    claimed: &ClaimedRecord,
    request: AnalystRequest,
) -> Result<ResultCode, HandlerError> {
    let mut options = request.options;
    if options.option_time <= 0 {
        options.option_time = ctx.clock.now();
    }
    let event_id = &claimed.task.event_id;
    ctx.relay.publish_analyst_selection(event_id, &options).await?;
    ctx.dispatch
        .submit(
            event_id,
            ctx.clock.now(),
            &Payload::AnalystSelection(AnalystRequest { options }),
        )
        .await?;
    info!(%event_id, "Analyst intervention shared");
    Ok(ResultCode::Success)
}

async fn select(
    ctx: &HandlerContext,
    claimed: &ClaimedRecord,
    request: AnalystRequest,
) -> Result<ResultCode, HandlerError> {
    let options = request.options;
    let event_id = &claimed.task.event_id;

    let Some(timeline) = ctx.timelines.open(event_id).await? else {
        if options.intake_option == IntakeOption::Block {
            return Ok(ResultCode::DeleteNoop);
        }
        // Options for an untracked event: take it in with them.
        ctx.dispatch
            .submit(
                event_id,
                ctx.clock.now(),
                &Payload::IntakeSync(IntakeRequest {
                    analyst_options: Some(options),
                }),
            )
            .await?;
        return Ok(ResultCode::Success);
    };

    let newer = timeline
        .status
        .analyst_options
        .as_ref()
        .map_or(true, |current| options.option_time > current.option_time);
    if !newer || timeline.status.forecast_status.is_terminal() {
        debug!(option_time = options.option_time, "Analyst selection already applied");
        return Ok(ResultCode::DeleteNoop);
    }

    let mut status = timeline.status.clone();
    status.analyst_options = Some(options);
    let updated = ctx
        .timelines
        .append(&timeline, status, TimelineAction::AnalystSelection)
        .await?;
    let config = ctx.config.get();
    ctx.timelines
        .resubmit_next(&ctx.dispatch, &updated.status, &config, None)
        .await?;
    info!(%event_id, "Analyst options applied");
    Ok(ResultCode::Success)
}
