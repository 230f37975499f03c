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

//! Publishing forecasts to the product sink.
//!
//! Only the primary server sends. Before sending, the relay store is checked
//! for a `pdl_completion` showing the partner already sent this forecast or a
//! later one, and for a product from another source; after a successful send
//! the completion is recorded before the timeline is updated, so a replay of
//! the same task finds it and does not send twice.

use async_trait::async_trait;
use tracing::{error, info, warn};

use super::control::unexpected;
use super::support::{millis, stale_command};
use crate::dispatcher::{HandlerContext, Payload, ReportCommand, ResultCode, TaskHandler};
use crate::error::HandlerError;
use crate::external::{call_with_timeout, ExternalFault, ProductSubmission, SendOutcome};
use crate::metrics;
use crate::models::{ClaimedRecord, TimelineAction};
use crate::timeline::{retry_time, PublishStatus, TimelineStatus};

/// Tries to publish `status.last_product`, updating the publish status and
/// product code in place.
pub(crate) async fn attempt_publish(
    ctx: &HandlerContext,
    status: &mut TimelineStatus,
) -> Result<PublishStatus, HandlerError> {
    let Some(product) = status.last_product.clone() else {
        return Ok(status.publish_status);
    };
    let event_id = status.event_id.clone();
    let outcome = decide_publish(ctx, status, &event_id, product.lag).await?;
    let publish_status = match outcome {
        Some(held) => held,
        None => {
            let config = ctx.config.get();
            let submission = ProductSubmission {
                event_id: event_id.clone(),
                lag: product.lag,
                update_time: product.generated_time,
                content: product.content.clone(),
            };
            let sent = call_with_timeout(
                "publish",
                millis(config.publish.timeout_ms),
                ctx.services.publish.send(&submission),
            )
            .await;
            match sent {
                Ok(SendOutcome::Sent { product_code }) => {
                    // The product is out; a relay failure must not fault the task.
                    if let Err(e) = ctx
                        .relay
                        .record_pdl_completion(&event_id, product.lag, Some(product_code.clone()))
                        .await
                    {
                        error!(error = %e, lag = product.lag, "Could not record publish completion");
                    }
                    if let Some(last) = status.last_product.as_mut() {
                        last.product_code = Some(product_code.clone());
                    }
                    info!(lag = product.lag, %product_code, "Forecast published");
                    PublishStatus::Success
                }
                Ok(SendOutcome::Conflict) => {
                    info!(lag = product.lag, "Sink already holds this forecast");
                    PublishStatus::Confirmed
                }
                Err(ExternalFault::Transient(reason)) => {
                    warn!(%reason, "Publish failed, will retry");
                    PublishStatus::Pending
                }
                Err(fault) => {
                    warn!(error = %fault, "Publish rejected");
                    PublishStatus::Failure
                }
            }
        }
    };
    metrics::record_publish_attempt(publish_status.as_str());
    status.publish_status = publish_status;
    Ok(publish_status)
}

/// Returns the status to record without sending, or `None` to send.
async fn decide_publish(
    ctx: &HandlerContext,
    status: &TimelineStatus,
    event_id: &str,
    lag: i64,
) -> Result<Option<PublishStatus>, HandlerError> {
    if !ctx.relay.is_primary() {
        return Ok(Some(PublishStatus::Secondary));
    }
    if !ctx.services.publish.is_primary_sender() {
        return Ok(Some(PublishStatus::Bypassed));
    }
    if let Some(foreign) = ctx.relay.foreign_product(event_id).await? {
        if status.origin_time().is_some_and(|origin| foreign.product_time > origin) {
            info!(source = %foreign.source, "Another source published for this event");
            return Ok(Some(PublishStatus::Bypassed));
        }
    }
    if let Some(done) = ctx.relay.pdl_completion(event_id).await? {
        if done.covers(lag) {
            info!(
                lag,
                sent_lag = done.lag,
                sent_by = done.server_number,
                "Forecast already published"
            );
            return Ok(Some(PublishStatus::Confirmed));
        }
    }
    Ok(None)
}

/// `gen_report`: retries a publish left pending.
pub struct ReportHandler;

#[async_trait]
impl TaskHandler for ReportHandler {
    async fn execute(
        &self,
        ctx: &HandlerContext,
        claimed: &mut ClaimedRecord,
        payload: Payload,
    ) -> Result<ResultCode, HandlerError> {
        let Payload::GenReport(ReportCommand { expected, lag }) = payload else {
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
        if timeline.status.forecast_status.is_terminal()
            || timeline.status.last_product.as_ref().map(|p| p.lag) != Some(lag)
        {
            return Ok(ResultCode::DeleteNoop);
        }

        let config = ctx.config.get();
        let now = ctx.clock.now();
        let horizon = timeline.status.publish_attempt_time + config.publish.max_horizon_ms;

        let mut status = timeline.status.clone();
        let code = if now > horizon {
            warn!(lag, "Publish horizon passed, giving up");
            status.publish_status = PublishStatus::Failure;
            ResultCode::PublishFailure
        } else {
            match attempt_publish(ctx, &mut status).await? {
                PublishStatus::Pending => {
                    let retry_at = retry_time(
                        &config.publish.retry_lags_ms,
                        status.publish_attempt_time,
                        now,
                        config.publish.retry_min_gap_ms,
                    )
                    .filter(|&at| at <= horizon);
                    if let Some(retry_at) = retry_at {
                        // The timeline is unchanged, so the command still matches.
                        let stage = claimed.task.stage;
                        claimed.task.restage(retry_at, stage);
                        return Ok(ResultCode::StagePublishRetry);
                    }
                    warn!(lag, "Publish retries exhausted");
                    status.publish_status = PublishStatus::Failure;
                    ResultCode::PublishFailure
                }
                PublishStatus::Failure => ResultCode::PublishFailure,
                _ => ResultCode::Success,
            }
        };

        let updated = ctx
            .timelines
            .append(&timeline, status, TimelineAction::Publish)
            .await?;
        ctx.timelines
            .resubmit_next(&ctx.dispatch, &updated.status, &config, Some(claimed.task.id))
            .await?;
        Ok(code)
    }
}
