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

use serde::{Deserialize, Serialize};

use crate::relay::RelayMode;

/// Complete server configuration.
///
/// Every section has defaults, so a TOML file only needs the values it
/// changes. All durations are milliseconds.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AftercastConfig {
    pub server: ServerConfig,
    pub dispatcher: DispatcherConfig,
    pub forecast: ForecastConfig,
    pub publish: PublishConfig,
    pub catalog: CatalogConfig,
    pub intake: IntakeConfig,
    pub relay: RelaySettings,
    pub poll: PollConfig,
    pub cleanup: CleanupConfig,
    pub health: HealthConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 1 or 2.
    pub server_number: i32,
    pub server_name: String,
    /// Local store for tasks, timelines and logs.
    pub db_url: String,
    /// Store shared with the partner server for relay items.
    pub relay_db_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Longest the dispatcher sleeps without checking the queue.
    pub idle_poll_ms: i64,
    /// Delay before a faulted task runs again.
    pub fault_delay_ms: i64,
    /// Faults (including crash restarts) tolerated before quarantine.
    pub max_faults: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Offsets from the mainshock origin at which forecasts are due.
    pub lags_ms: Vec<i64>,
    /// A forecast not run within this long after its due time is skipped.
    pub max_delay_ms: i64,
    /// Age after which the timeline expires.
    pub max_age_ms: i64,
    /// Intake filter failures at or past this lag withdraw the timeline.
    pub withdraw_lag_ms: i64,
    /// Minimum wall-clock gap between two forecast computations.
    pub min_compute_gap_ms: i64,
    /// Longest a forecast waits for the rate limiter.
    pub rate_limit_ceiling_ms: i64,
    pub model_timeout_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub retry_lags_ms: Vec<i64>,
    pub retry_min_gap_ms: i64,
    /// Publish attempts stop this long after the first one.
    pub max_horizon_ms: i64,
    pub timeout_ms: i64,
    /// Delete the event's products when the timeline is stopped.
    pub delete_on_stop: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub retry_lags_ms: Vec<i64>,
    pub retry_min_gap_ms: i64,
    pub timeout_ms: i64,
    pub shadow_radius_km: f64,
    pub shadow_lookback_ms: i64,
    pub shadow_min_magnitude_excess: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    pub min_magnitude: f64,
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    pub heartbeat_interval_ms: i64,
    /// Heartbeats older than this many intervals mean the partner is dead.
    pub staleness_intervals: i64,
    pub relay_mode: RelayMode,
    /// Server number that should be primary.
    pub configured_primary: i32,
    /// Stamp of the configured mode; later stamps win negotiation.
    pub mode_timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Submit a poll-start task when the server starts.
    pub start_on_launch: bool,
    pub interval_ms: i64,
    pub lookback_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    pub start_on_launch: bool,
    pub interval_ms: i64,
    pub log_retention_ms: i64,
    pub relay_retention_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub monitor_on_launch: bool,
    /// Faults within the window that mark the server unhealthy.
    pub fault_threshold: u64,
}
