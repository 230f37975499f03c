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

//! Event intake: starting a timeline for a new earthquake.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::control::unexpected;
use super::support::{catalog_call, catalog_retry, next_live_lag, passes_intake_filter};
use crate::dispatcher::{
    ForeignProductNotice, HandlerContext, IntakeRequest, Payload, ResultCode, TaskHandler,
};
use crate::error::{HandlerError, StoreError, TimelineError};
use crate::external::ExternalFault;
use crate::models::{ClaimedRecord, TimelineAction};
use crate::relay::ForeignProduct;
use crate::timeline::{ForecastStatus, IntakeOption, Timeline, TimelineStatus};

/// `intake_sync`, `intake_poll` and `intake_pdl`.
pub struct IntakeHandler;

#[async_trait]
impl TaskHandler for IntakeHandler {
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
            // A sync names one event explicitly, so an existing timeline is
            // worth a log line; polls find the same events over and over.
            Payload::IntakeSync(request) => {
                intake(ctx, claimed, request, ResultCode::AlreadyExists).await
            }
            Payload::IntakePoll(request) => {
                intake(ctx, claimed, request, ResultCode::DeleteNoop).await
            }
            Payload::IntakePdl(notice) => foreign_product(ctx, claimed, notice).await,
            other => Err(unexpected(&other)),
        }
    }
}

async fn intake(
    ctx: &HandlerContext,
    claimed: &mut ClaimedRecord,
    request: IntakeRequest,
    existing: ResultCode,
) -> Result<ResultCode, HandlerError> {
    let config = ctx.config.get();
    let now = ctx.clock.now();
    let requested_id = claimed.task.event_id.clone();

    if ctx.timelines.open(&requested_id).await?.is_some() {
        debug!("Event already has a timeline");
        return Ok(existing);
    }

    let mainshock = match catalog_call(&config, ctx.services.catalog.get_mainshock(&requested_id)).await
    {
        Ok(mainshock) => mainshock,
        Err(ExternalFault::NotFound(_)) => {
            info!("Event not in catalog, dropping intake");
            return Ok(ResultCode::DeleteFiltered);
        }
        Err(fault) => {
            warn!(error = %fault, "Catalog lookup failed during intake");
            if fault.is_transient() {
                let base = claimed.task.submit_time;
                if let Some(code) = catalog_retry(&config, claimed, base, now) {
                    return Ok(code);
                }
            }
            return Ok(ResultCode::SkippedCatalog);
        }
    };

    let intake_option = request
        .analyst_options
        .as_ref()
        .map(|o| o.intake_option)
        .unwrap_or_default();
    let accepted = match intake_option {
        IntakeOption::Block => false,
        IntakeOption::Allow => true,
        IntakeOption::Normal => passes_intake_filter(&mainshock, &config.intake),
    };
    if !accepted {
        debug!(magnitude = mainshock.magnitude, ?intake_option, "Event rejected by intake filter");
        return Ok(ResultCode::DeleteFiltered);
    }
    if now - mainshock.origin_time > config.forecast.max_age_ms {
        debug!(origin_time = mainshock.origin_time, "Event too old for intake");
        return Ok(ResultCode::DeleteFiltered);
    }

    // The catalog may know the event under a different authoritative id;
    // the requested id then becomes an alias.
    let event_id = mainshock.event_id.clone();
    if event_id != requested_id {
        if let Some(timeline) = ctx.timelines.open(&event_id).await? {
            return add_alias(ctx, timeline, &requested_id).await;
        }
    }

    let mut status = TimelineStatus::empty(event_id.clone());
    status.forecast_status = ForecastStatus::Intake;
    status.next_forecast_lag = next_live_lag(&config, mainshock.origin_time, 0, now);
    status.analyst_options = request.analyst_options;
    if event_id != requested_id {
        status.aliases.push(requested_id.clone());
    }
    status.mainshock = Some(mainshock);

    let timeline = match ctx.timelines.create(status, TimelineAction::Intake).await {
        Ok(timeline) => timeline,
        Err(TimelineError::Store(StoreError::VersionConflict { .. })) => {
            debug!(%event_id, "Timeline created concurrently");
            return Ok(existing);
        }
        Err(e) => return Err(e.into()),
    };
    info!(
        %event_id,
        next_lag = timeline.status.next_forecast_lag,
        "Timeline created"
    );
    ctx.timelines
        .resubmit_next(&ctx.dispatch, &timeline.status, &config, None)
        .await?;
    Ok(ResultCode::Success)
}

async fn add_alias(
    ctx: &HandlerContext,
    timeline: Timeline,
    alias: &str,
) -> Result<ResultCode, HandlerError> {
    if timeline.status.aliases.iter().any(|a| a == alias) {
        return Ok(ResultCode::AlreadyExists);
    }
    let mut status = timeline.status.clone();
    status.aliases.push(alias.to_string());
    ctx.timelines
        .append(&timeline, status, TimelineAction::Intake)
        .await?;
    info!(event_id = %timeline.status.event_id, alias, "Alias recorded");
    Ok(ResultCode::AlreadyExists)
}

/// Another source published for the event: record it for both servers and
/// make sure the event is tracked.
async fn foreign_product(
    ctx: &HandlerContext,
    claimed: &ClaimedRecord,
    notice: ForeignProductNotice,
) -> Result<ResultCode, HandlerError> {
    let event_id = claimed.task.event_id.clone();
    ctx.relay
        .record_foreign_product(
            &event_id,
            &ForeignProduct {
                source: notice.source.clone(),
                product_time: notice.product_time,
            },
        )
        .await?;
    info!(source = %notice.source, product_time = notice.product_time, "Foreign product recorded");

    if ctx.timelines.open(&event_id).await?.is_none() {
        ctx.dispatch
            .submit(
                &event_id,
                ctx.clock.now(),
                &Payload::IntakeSync(IntakeRequest::default()),
            )
            .await?;
    }
    Ok(ResultCode::Success)
}
