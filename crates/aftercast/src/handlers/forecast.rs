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

//! Forecast generation.
//!
//! A `gen_forecast` command runs its checks in a fixed order: cancellation,
//! timeline match, staleness, a fresh catalog lookup, the intake filter and
//! analyst block, then shadowing. Only a command that passes every check
//! computes a forecast, publishes it inline and appends the result.

use async_trait::async_trait;
use tracing::{info, warn};

use super::control::unexpected;
use super::publish::attempt_publish;
use super::support::{
    catalog_call, catalog_retry, millis, next_live_lag, passes_intake_filter, skip_forecast,
    stale_command, withdraw,
};
use crate::dispatcher::{ForecastCommand, HandlerContext, Payload, ResultCode, TaskHandler};
use crate::error::HandlerError;
use crate::external::{call_with_timeout, ExternalFault, ShadowSearch};
use crate::models::{ClaimedRecord, TimelineAction};
use crate::timeline::{
    is_stale, ForecastProduct, ForecastStatus, IntakeOption, LastResult, PublishStatus,
    ShadowOption, Timeline,
};

/// `gen_forecast`.
pub struct ForecastHandler;

#[async_trait]
impl TaskHandler for ForecastHandler {
    async fn execute(
        &self,
        ctx: &HandlerContext,
        claimed: &mut ClaimedRecord,
        payload: Payload,
    ) -> Result<ResultCode, HandlerError> {
        let Payload::GenForecast(ForecastCommand { expected, lag }) = payload else {
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
        if !matches!(
            timeline.status.forecast_status,
            ForecastStatus::Intake | ForecastStatus::Active
        ) {
            return Ok(ResultCode::DeleteNoop);
        }
        let Some(origin) = timeline.status.origin_time() else {
            return Err(HandlerError::Fault(format!(
                "timeline {} has no mainshock",
                timeline.status.event_id
            )));
        };

        let config = ctx.config.get();
        let now = ctx.clock.now();
        let due = origin + lag;

        if is_stale(origin, lag, now, config.forecast.max_delay_ms) {
            return skip_forecast(
                ctx,
                claimed,
                &timeline,
                lag,
                LastResult::SkippedStale,
                ResultCode::SkippedStale,
            )
            .await;
        }

        let event_id = timeline.status.event_id.clone();
        let mainshock = match catalog_call(&config, ctx.services.catalog.get_mainshock(&event_id)).await
        {
            Ok(mainshock) => mainshock,
            Err(ExternalFault::NotFound(_)) => {
                return withdraw(ctx, claimed, &timeline, "event deleted from catalog").await;
            }
            Err(fault) => return catalog_unavailable(ctx, claimed, &timeline, lag, due, fault).await,
        };

        match timeline.status.intake_option() {
            IntakeOption::Block => {
                return skip_forecast(
                    ctx,
                    claimed,
                    &timeline,
                    lag,
                    LastResult::SkippedAnalyst,
                    ResultCode::SkippedAnalyst,
                )
                .await;
            }
            IntakeOption::Normal if !passes_intake_filter(&mainshock, &config.intake) => {
                if lag >= config.forecast.withdraw_lag_ms {
                    return withdraw(ctx, claimed, &timeline, "event no longer passes intake").await;
                }
                return skip_forecast(
                    ctx,
                    claimed,
                    &timeline,
                    lag,
                    LastResult::SkippedIntake,
                    ResultCode::SkippedIntake,
                )
                .await;
            }
            _ => {}
        }

        if timeline.status.shadow_option() == ShadowOption::Normal {
            let search = ShadowSearch {
                radius_km: config.catalog.shadow_radius_km,
                lookback_ms: config.catalog.shadow_lookback_ms,
                end_time: now,
                min_magnitude_excess: config.catalog.shadow_min_magnitude_excess,
            };
            match catalog_call(&config, ctx.services.catalog.find_shadow(&mainshock, &search)).await {
                Ok(Some(shadow)) => {
                    let (last_result, code) = if shadow.is_foreshock_of(&mainshock) {
                        (LastResult::SkippedForeshock, ResultCode::SkippedForeshock)
                    } else {
                        (LastResult::SkippedShadowed, ResultCode::SkippedShadowed)
                    };
                    info!(shadow = %shadow.event_id, magnitude = shadow.magnitude, "Event is shadowed");
                    return skip_forecast(ctx, claimed, &timeline, lag, last_result, code).await;
                }
                Ok(None) => {}
                Err(fault) => {
                    return catalog_unavailable(ctx, claimed, &timeline, lag, due, fault).await
                }
            }
        }

        let waited = ctx
            .rate_limiter
            .acquire(
                millis(config.forecast.min_compute_gap_ms),
                millis(config.forecast.rate_limit_ceiling_ms),
            )
            .await;
        let params = timeline
            .status
            .analyst_options
            .as_ref()
            .and_then(|o| o.model_params.as_ref());
        let content = call_with_timeout(
            "forecast model",
            millis(config.forecast.model_timeout_ms),
            ctx.services.model.generate(&mainshock, lag, params),
        )
        .await?;
        let generated_time = ctx.clock.now();
        info!(lag, waited_ms = waited.as_millis() as u64, "Forecast generated");

        let mut status = timeline.status.clone();
        status.forecast_status = ForecastStatus::Active;
        status.last_result = LastResult::Forecast;
        status.last_forecast_lag = lag;
        status.next_forecast_lag = next_live_lag(&config, origin, lag + 1, generated_time);
        status.mainshock = Some(mainshock);
        status.last_product = Some(ForecastProduct {
            lag,
            generated_time,
            content,
            product_code: None,
        });
        status.publish_status = PublishStatus::Pending;
        status.publish_attempt_time = generated_time;
        attempt_publish(ctx, &mut status).await?;

        let updated = ctx
            .timelines
            .append(&timeline, status, TimelineAction::Forecast)
            .await?;
        ctx.timelines
            .resubmit_next(&ctx.dispatch, &updated.status, &config, Some(claimed.task.id))
            .await?;
        Ok(ResultCode::Success)
    }
}

/// Retries on the catalog schedule counted from the forecast's due time (or
/// its submission, if later), then gives up on this lag.
async fn catalog_unavailable(
    ctx: &HandlerContext,
    claimed: &mut ClaimedRecord,
    timeline: &Timeline,
    lag: i64,
    due: i64,
    fault: ExternalFault,
) -> Result<ResultCode, HandlerError> {
    warn!(error = %fault, lag, "Catalog call failed during forecast");
    let config = ctx.config.get();
    if fault.is_transient() {
        let base = due.max(claimed.task.submit_time);
        if let Some(code) = catalog_retry(&config, claimed, base, ctx.clock.now()) {
            return Ok(code);
        }
    }
    skip_forecast(
        ctx,
        claimed,
        timeline,
        lag,
        LastResult::SkippedCatalog,
        ResultCode::SkippedCatalog,
    )
    .await
}
