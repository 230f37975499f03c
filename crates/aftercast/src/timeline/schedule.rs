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

//! Forecast and retry schedules.
//!
//! Everything here is a pure function of a status, the configuration and the
//! current time, so the same timeline always produces the same next action.

use super::status::{ForecastStatus, PublishStatus, TimelineStatus};
use crate::config::AftercastConfig;
use crate::dispatcher::{ExpireCommand, ForecastCommand, Opcode, Payload, ReportCommand};

/// The first configured lag at or after `min_lag`, or `-1` if none remains.
pub fn next_forecast_lag(lags: &[i64], min_lag: i64) -> i64 {
    lags.iter().copied().find(|&lag| lag >= min_lag).unwrap_or(-1)
}

/// The next retry time in a lag sequence measured from `base`.
///
/// Picks the first lag whose time is at least `min_gap` after `now`;
/// `None` once the sequence is exhausted.
pub fn retry_time(lags: &[i64], base: i64, now: i64, min_gap: i64) -> Option<i64> {
    lags.iter()
        .map(|&lag| base + lag)
        .find(|&time| time >= now + min_gap)
}

/// A forecast is stale when it runs more than `max_delay` after it was due.
pub fn is_stale(origin_time: i64, lag: i64, now: i64, max_delay: i64) -> bool {
    now > origin_time + lag + max_delay
}

/// A command to submit for a timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledAction {
    pub opcode: Opcode,
    pub exec_time: i64,
    pub payload: Payload,
}

/// The command that should follow `status`, if any.
///
/// A publish left pending is retried first. Otherwise the next forecast is
/// due at `origin + next_forecast_lag`; with no lag left the timeline
/// expires at `origin + max_age`. Stopped and terminal timelines schedule
/// nothing.
pub fn next_scheduled_action(
    status: &TimelineStatus,
    config: &AftercastConfig,
    now: i64,
) -> Option<ScheduledAction> {
    if !matches!(
        status.forecast_status,
        ForecastStatus::Intake | ForecastStatus::Active
    ) {
        return None;
    }
    let origin = status.origin_time()?;
    let expected = status.expectation();

    if status.publish_status == PublishStatus::Pending {
        if let Some(product) = &status.last_product {
            let exec_time = retry_time(
                &config.publish.retry_lags_ms,
                status.publish_attempt_time,
                now,
                config.publish.retry_min_gap_ms,
            )
            .unwrap_or(now);
            return Some(ScheduledAction {
                opcode: Opcode::GenReport,
                exec_time,
                payload: Payload::GenReport(ReportCommand {
                    expected,
                    lag: product.lag,
                }),
            });
        }
    }

    if status.next_forecast_lag >= 0 {
        let lag = status.next_forecast_lag;
        return Some(ScheduledAction {
            opcode: Opcode::GenForecast,
            exec_time: origin + lag,
            payload: Payload::GenForecast(ForecastCommand { expected, lag }),
        });
    }

    Some(ScheduledAction {
        opcode: Opcode::GenExpire,
        exec_time: (origin + config.forecast.max_age_ms).max(now),
        payload: Payload::GenExpire(ExpireCommand { expected }),
    })
}

/// A publish report to run now for a forecast whose publish was held back,
/// used when this server becomes primary.
pub fn deferred_report(status: &TimelineStatus, now: i64) -> Option<ScheduledAction> {
    if status.forecast_status.is_terminal() || !status.publish_status.is_deferred() {
        return None;
    }
    let product = status.last_product.as_ref()?;
    Some(ScheduledAction {
        opcode: Opcode::GenReport,
        exec_time: now,
        payload: Payload::GenReport(ReportCommand {
            expected: status.expectation(),
            lag: product.lag,
        }),
    })
}
