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

//! Timeline deltas and the fold that rebuilds a status from them.
//!
//! Each stored entry carries only the fields its action changed. Folding
//! the entries of an event in sequence order reproduces the status written
//! by the latest append; `last_forecast_stamp` is never stored, it is the
//! sequence number of the last folded entry.

use serde::{Deserialize, Serialize};

use super::status::{
    AnalystOptions, ForecastProduct, ForecastStatus, LastResult, PublishStatus, TimelineStatus,
};
use crate::error::{CorruptRecord, TimelineError};
use crate::external::Mainshock;
use crate::models::{RecordKind, TimelineEntry};

/// The fields changed by one timeline action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimelineDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast_status: Option<ForecastStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_status: Option<PublishStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_result: Option<LastResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_forecast_lag: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_forecast_lag: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyst_options: Option<AnalystOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mainshock: Option<Mainshock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aliases: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_product: Option<ForecastProduct>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_attempt_time: Option<i64>,
}

fn changed<T: Clone + PartialEq>(old: &T, new: &T) -> Option<T> {
    (old != new).then(|| new.clone())
}

fn changed_opt<T: Clone + PartialEq>(old: &Option<T>, new: &Option<T>) -> Option<T> {
    match new {
        Some(value) if old.as_ref() != Some(value) => Some(value.clone()),
        _ => None,
    }
}

impl TimelineDelta {
    /// Fields of `new` that differ from `old`.
    ///
    /// Optional fields are never cleared once set, so a `None` in `new`
    /// produces no change.
    pub fn between(old: &TimelineStatus, new: &TimelineStatus) -> Self {
        Self {
            forecast_status: changed(&old.forecast_status, &new.forecast_status),
            publish_status: changed(&old.publish_status, &new.publish_status),
            last_result: changed(&old.last_result, &new.last_result),
            action_time: changed(&old.action_time, &new.action_time),
            next_forecast_lag: changed(&old.next_forecast_lag, &new.next_forecast_lag),
            last_forecast_lag: changed(&old.last_forecast_lag, &new.last_forecast_lag),
            analyst_options: changed_opt(&old.analyst_options, &new.analyst_options),
            mainshock: changed_opt(&old.mainshock, &new.mainshock),
            aliases: changed(&old.aliases, &new.aliases),
            last_product: changed_opt(&old.last_product, &new.last_product),
            publish_attempt_time: changed(&old.publish_attempt_time, &new.publish_attempt_time),
        }
    }

    /// A delta holding every field of `status`, used for rebuild snapshots.
    pub fn snapshot(status: &TimelineStatus) -> Self {
        Self::between(&TimelineStatus::empty(status.event_id.clone()), status).with_all(status)
    }

    fn with_all(mut self, status: &TimelineStatus) -> Self {
        self.forecast_status = Some(status.forecast_status);
        self.publish_status = Some(status.publish_status);
        self.last_result = Some(status.last_result);
        self.action_time = Some(status.action_time);
        self.next_forecast_lag = Some(status.next_forecast_lag);
        self.last_forecast_lag = Some(status.last_forecast_lag);
        self.aliases = Some(status.aliases.clone());
        self.publish_attempt_time = Some(status.publish_attempt_time);
        self
    }

    pub fn apply(&self, status: &mut TimelineStatus) {
        if let Some(v) = self.forecast_status {
            status.forecast_status = v;
        }
        if let Some(v) = self.publish_status {
            status.publish_status = v;
        }
        if let Some(v) = self.last_result {
            status.last_result = v;
        }
        if let Some(v) = self.action_time {
            status.action_time = v;
        }
        if let Some(v) = self.next_forecast_lag {
            status.next_forecast_lag = v;
        }
        if let Some(v) = self.last_forecast_lag {
            status.last_forecast_lag = v;
        }
        if let Some(v) = &self.analyst_options {
            status.analyst_options = Some(v.clone());
        }
        if let Some(v) = &self.mainshock {
            status.mainshock = Some(v.clone());
        }
        if let Some(v) = &self.aliases {
            status.aliases = v.clone();
        }
        if let Some(v) = &self.last_product {
            status.last_product = Some(v.clone());
        }
        if let Some(v) = self.publish_attempt_time {
            status.publish_attempt_time = v;
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(entry: &TimelineEntry) -> Result<Self, CorruptRecord> {
        serde_json::from_str(&entry.payload).map_err(|e| {
            CorruptRecord::new(
                RecordKind::TimelineEntry,
                format!("{}#{}", entry.event_id, entry.sequence_no),
                e,
            )
        })
    }
}

/// Folds the entries of one event into its status.
///
/// Entries must be in sequence order, numbered 1, 2, 3, ... without gaps.
pub fn fold(event_id: &str, entries: &[TimelineEntry]) -> Result<TimelineStatus, TimelineError> {
    let mut status = TimelineStatus::empty(event_id);
    for (entry, expected) in entries.iter().zip(1_i64..) {
        if entry.sequence_no != expected {
            return Err(TimelineError::SequenceGap {
                event_id: event_id.to_string(),
                expected,
                found: entry.sequence_no,
            });
        }
        TimelineDelta::decode(entry)?.apply(&mut status);
        status.last_forecast_stamp = entry.sequence_no;
    }
    Ok(status)
}
