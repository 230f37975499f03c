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

//! Steps shared by the timeline handlers.

use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{AftercastConfig, IntakeConfig};
use crate::dispatcher::{HandlerContext, ResultCode};
use crate::error::HandlerError;
use crate::external::{call_with_timeout, ExternalFault, Mainshock};
use crate::models::{ClaimedRecord, TimelineAction};
use crate::timeline::{
    next_forecast_lag, retry_time, ForecastStatus, LastResult, Timeline, TimelineStatus,
};

pub(crate) fn millis(ms: i64) -> Duration {
    Duration::from_millis(ms.max(0) as u64)
}

pub(crate) async fn catalog_call<T, F>(config: &AftercastConfig, call: F) -> Result<T, ExternalFault>
where
    F: Future<Output = Result<T, ExternalFault>>,
{
    call_with_timeout("catalog", millis(config.catalog.timeout_ms), call).await
}

/// Restages the task on the catalog retry schedule measured from `base`.
///
/// Returns `None` when the schedule is exhausted.
pub(crate) fn catalog_retry(
    config: &AftercastConfig,
    claimed: &mut ClaimedRecord,
    base: i64,
    now: i64,
) -> Option<ResultCode> {
    let retry_at = retry_time(
        &config.catalog.retry_lags_ms,
        base,
        now,
        config.catalog.retry_min_gap_ms,
    )?;
    let stage = claimed.task.stage;
    claimed.task.restage(retry_at, stage);
    info!(retry_at, "Catalog unavailable, retrying later");
    Some(ResultCode::StageCatalogRetry)
}

/// Whether the event passes the geographic and magnitude gate.
pub(crate) fn passes_intake_filter(mainshock: &Mainshock, intake: &IntakeConfig) -> bool {
    mainshock.magnitude >= intake.min_magnitude
        && (intake.min_latitude..=intake.max_latitude).contains(&mainshock.latitude)
        && (intake.min_longitude..=intake.max_longitude).contains(&mainshock.longitude)
}

/// The first lag after `after` whose forecast would not already be stale.
pub(crate) fn next_live_lag(config: &AftercastConfig, origin: i64, after: i64, now: i64) -> i64 {
    let not_stale = now - origin - config.forecast.max_delay_ms;
    next_forecast_lag(&config.forecast.lags_ms, after.max(not_stale))
}

/// Answers a command whose expectation no longer matches the timeline:
/// the correct next action is scheduled in place of pending ones.
pub(crate) async fn stale_command(
    ctx: &HandlerContext,
    claimed: &ClaimedRecord,
    status: &TimelineStatus,
) -> Result<ResultCode, HandlerError> {
    info!(
        stamp = status.last_forecast_stamp,
        "Command does not match timeline, rescheduling"
    );
    let config = ctx.config.get();
    ctx.timelines
        .resubmit_next(&ctx.dispatch, status, &config, Some(claimed.task.id))
        .await?;
    Ok(ResultCode::TimelineMismatch)
}

/// Records a skipped forecast and moves on to the next lag.
pub(crate) async fn skip_forecast(
    ctx: &HandlerContext,
    claimed: &ClaimedRecord,
    timeline: &Timeline,
    lag: i64,
    last_result: LastResult,
    code: ResultCode,
) -> Result<ResultCode, HandlerError> {
    let config = ctx.config.get();
    let now = ctx.clock.now();
    let origin = timeline.status.origin_time().unwrap_or(now);

    let mut status = timeline.status.clone();
    status.forecast_status = ForecastStatus::Active;
    status.last_result = last_result;
    status.next_forecast_lag = next_live_lag(&config, origin, lag + 1, now);
    info!(lag, result = %code, next_lag = status.next_forecast_lag, "Forecast skipped");

    let updated = ctx
        .timelines
        .append(timeline, status, TimelineAction::Forecast)
        .await?;
    ctx.timelines
        .resubmit_next(&ctx.dispatch, &updated.status, &config, Some(claimed.task.id))
        .await?;
    Ok(code)
}

/// Moves the timeline to the terminal `withdrawn` state.
pub(crate) async fn withdraw(
    ctx: &HandlerContext,
    claimed: &ClaimedRecord,
    timeline: &Timeline,
    reason: &str,
) -> Result<ResultCode, HandlerError> {
    let mut status = timeline.status.clone();
    status.forecast_status = ForecastStatus::Withdrawn;
    let updated = ctx
        .timelines
        .append(timeline, status, TimelineAction::Withdraw)
        .await?;
    ctx.dispatch
        .delete_timeline_commands(updated.event_id(), Some(claimed.task.id))
        .await?;
    info!(reason, "Timeline withdrawn");
    delete_published(ctx, &updated.status, reason).await;
    Ok(ResultCode::Withdrawn)
}

/// Removes the event's products from the sink if this server published any.
///
/// Failures are logged and otherwise ignored.
pub(crate) async fn delete_published(ctx: &HandlerContext, status: &TimelineStatus, reason: &str) {
    let published = status
        .last_product
        .as_ref()
        .is_some_and(|p| p.product_code.is_some());
    if !published || !ctx.relay.is_primary() {
        return;
    }
    let config = ctx.config.get();
    let result = call_with_timeout(
        "publish",
        millis(config.publish.timeout_ms),
        ctx.services.publish.delete(&status.event_id, reason),
    )
    .await;
    if let Err(e) = result {
        warn!(error = %e, "Could not delete published products");
    }
}
