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

//! Timeline status: the folded state of one event.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::external::Mainshock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastStatus {
    Intake,
    Active,
    /// Suspended by an alias stop; may be revived.
    Stopped,
    Withdrawn,
    Expired,
}

impl ForecastStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ForecastStatus::Withdrawn | ForecastStatus::Expired)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ForecastStatus::Intake => "intake",
            ForecastStatus::Active => "active",
            ForecastStatus::Stopped => "stopped",
            ForecastStatus::Withdrawn => "withdrawn",
            ForecastStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for ForecastStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStatus {
    /// No forecast has been produced yet.
    None,
    /// Waiting for a publish retry.
    Pending,
    /// The partner already published this forecast or a later one.
    Confirmed,
    Success,
    Failure,
    /// Not published because this server is not primary.
    Secondary,
    /// Another sender is responsible for this event.
    Bypassed,
}

impl PublishStatus {
    /// Statuses that a newly promoted primary should try again.
    pub fn is_deferred(&self) -> bool {
        matches!(self, PublishStatus::Pending | PublishStatus::Secondary)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PublishStatus::None => "none",
            PublishStatus::Pending => "pending",
            PublishStatus::Confirmed => "confirmed",
            PublishStatus::Success => "success",
            PublishStatus::Failure => "failure",
            PublishStatus::Secondary => "secondary",
            PublishStatus::Bypassed => "bypassed",
        }
    }
}

impl fmt::Display for PublishStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LastResult {
    None,
    Forecast,
    SkippedStale,
    SkippedIntake,
    SkippedAnalyst,
    SkippedShadowed,
    SkippedForeshock,
    SkippedCatalog,
}

impl LastResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            LastResult::None => "none",
            LastResult::Forecast => "forecast",
            LastResult::SkippedStale => "skipped-stale",
            LastResult::SkippedIntake => "skipped-intake",
            LastResult::SkippedAnalyst => "skipped-analyst",
            LastResult::SkippedShadowed => "skipped-shadowed",
            LastResult::SkippedForeshock => "skipped-foreshock",
            LastResult::SkippedCatalog => "skipped-catalog",
        }
    }
}

/// Analyst override of the intake filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntakeOption {
    #[default]
    Normal,
    /// Track the event even if the filter rejects it.
    Allow,
    /// Do not forecast the event.
    Block,
}

/// Analyst override of the shadowing check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShadowOption {
    #[default]
    Normal,
    Ignore,
}

/// Options chosen by an analyst for one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalystOptions {
    pub analyst_id: String,
    #[serde(default)]
    pub remark: String,
    /// When the analyst made the selection; newer selections win.
    pub option_time: i64,
    #[serde(default)]
    pub intake_option: IntakeOption,
    #[serde(default)]
    pub shadow_option: ShadowOption,
    /// Model parameter overrides passed to the forecast model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_params: Option<serde_json::Value>,
}

/// The most recent forecast product, kept for publish retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastProduct {
    pub lag: i64,
    pub generated_time: i64,
    pub content: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_code: Option<String>,
}

/// The timeline state a timeline command was issued against.
///
/// A command may mutate the timeline only while all three values still
/// match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimelineExpectation {
    pub action_time: i64,
    pub next_forecast_lag: i64,
    pub last_forecast_stamp: i64,
}

/// Current status of an event's timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineStatus {
    pub event_id: String,
    pub forecast_status: ForecastStatus,
    pub publish_status: PublishStatus,
    pub last_result: LastResult,
    pub action_time: i64,
    /// Lag of the next scheduled forecast, or -1.
    pub next_forecast_lag: i64,
    /// Lag of the most recent forecast, or -1.
    pub last_forecast_lag: i64,
    /// Sequence number of the entry that produced this status.
    pub last_forecast_stamp: i64,
    pub analyst_options: Option<AnalystOptions>,
    pub mainshock: Option<Mainshock>,
    pub aliases: Vec<String>,
    pub last_product: Option<ForecastProduct>,
    /// Base time of the publish retry schedule.
    pub publish_attempt_time: i64,
}

impl TimelineStatus {
    /// The status of a timeline before its first entry.
    pub fn empty(event_id: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
            forecast_status: ForecastStatus::Intake,
            publish_status: PublishStatus::None,
            last_result: LastResult::None,
            action_time: 0,
            next_forecast_lag: -1,
            last_forecast_lag: -1,
            last_forecast_stamp: 0,
            analyst_options: None,
            mainshock: None,
            aliases: Vec::new(),
            last_product: None,
            publish_attempt_time: 0,
        }
    }

    pub fn expectation(&self) -> TimelineExpectation {
        TimelineExpectation {
            action_time: self.action_time,
            next_forecast_lag: self.next_forecast_lag,
            last_forecast_stamp: self.last_forecast_stamp,
        }
    }

    pub fn matches(&self, expected: &TimelineExpectation) -> bool {
        self.expectation() == *expected
    }

    pub fn origin_time(&self) -> Option<i64> {
        self.mainshock.as_ref().map(|m| m.origin_time)
    }

    pub fn intake_option(&self) -> IntakeOption {
        self.analyst_options
            .as_ref()
            .map(|o| o.intake_option)
            .unwrap_or_default()
    }

    pub fn shadow_option(&self) -> ShadowOption {
        self.analyst_options
            .as_ref()
            .map(|o| o.shadow_option)
            .unwrap_or_default()
    }
}
