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

//! # Timeline State Machine
//!
//! Each tracked event has an append-only timeline. Entries store the fields
//! an action changed; the current [`TimelineStatus`] is the fold of all
//! entries. Commands that mutate a timeline carry the
//! [`TimelineExpectation`] they were scheduled against and are rejected as
//! stale when it no longer matches.
//!
//! The forecast sub-machine runs `intake -> active -> expired`, may be
//! `withdrawn` when the event fails the intake filter late or leaves the
//! catalog, and `stopped`/revived by alias operations. Each forecast then
//! runs the publish sub-machine from `pending` to one of `confirmed`,
//! `success`, `failure`, `secondary` or `bypassed`.

pub mod delta;
pub mod manager;
pub mod rate_limiter;
pub mod schedule;
pub mod status;

pub use delta::{fold, TimelineDelta};
pub use manager::{Timeline, TimelineManager};
pub use rate_limiter::RateLimiter;
pub use schedule::{
    deferred_report, is_stale, next_forecast_lag, next_scheduled_action, retry_time,
    ScheduledAction,
};
pub use status::{
    AnalystOptions, ForecastProduct, ForecastStatus, IntakeOption, LastResult, PublishStatus,
    ShadowOption, TimelineExpectation, TimelineStatus,
};
