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

use super::types::*;
use crate::clock::{DAY_MILLIS, HOUR_MILLIS, MINUTE_MILLIS, SECOND_MILLIS};
use crate::relay::RelayMode;

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_number: 1,
            server_name: "aftercast-1".to_string(),
            db_url: "sqlite:///var/lib/aftercast/aftercast.db".to_string(),
            relay_db_url: "sqlite:///var/lib/aftercast/relay.db".to_string(),
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            idle_poll_ms: MINUTE_MILLIS,
            fault_delay_ms: 30 * SECOND_MILLIS,
            max_faults: 5,
        }
    }
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            lags_ms: vec![
                30 * MINUTE_MILLIS,
                HOUR_MILLIS,
                3 * HOUR_MILLIS,
                6 * HOUR_MILLIS,
                12 * HOUR_MILLIS,
                DAY_MILLIS,
                2 * DAY_MILLIS,
                3 * DAY_MILLIS,
                7 * DAY_MILLIS,
                14 * DAY_MILLIS,
                30 * DAY_MILLIS,
            ],
            max_delay_ms: 2 * HOUR_MILLIS,
            max_age_ms: 31 * DAY_MILLIS,
            withdraw_lag_ms: DAY_MILLIS,
            min_compute_gap_ms: 5 * SECOND_MILLIS,
            rate_limit_ceiling_ms: MINUTE_MILLIS,
            model_timeout_ms: 5 * MINUTE_MILLIS,
        }
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            retry_lags_ms: vec![
                MINUTE_MILLIS,
                5 * MINUTE_MILLIS,
                15 * MINUTE_MILLIS,
                30 * MINUTE_MILLIS,
                HOUR_MILLIS,
                2 * HOUR_MILLIS,
            ],
            retry_min_gap_ms: 30 * SECOND_MILLIS,
            max_horizon_ms: 6 * HOUR_MILLIS,
            timeout_ms: MINUTE_MILLIS,
            delete_on_stop: true,
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            retry_lags_ms: vec![
                MINUTE_MILLIS,
                5 * MINUTE_MILLIS,
                15 * MINUTE_MILLIS,
                30 * MINUTE_MILLIS,
                HOUR_MILLIS,
            ],
            retry_min_gap_ms: 30 * SECOND_MILLIS,
            timeout_ms: 30 * SECOND_MILLIS,
            shadow_radius_km: 200.0,
            shadow_lookback_ms: 365 * DAY_MILLIS,
            shadow_min_magnitude_excess: 0.0,
        }
    }
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            min_magnitude: 3.5,
            min_latitude: -90.0,
            max_latitude: 90.0,
            min_longitude: -180.0,
            max_longitude: 180.0,
        }
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: 30 * SECOND_MILLIS,
            staleness_intervals: 3,
            relay_mode: RelayMode::Dual,
            configured_primary: 1,
            mode_timestamp: 0,
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            start_on_launch: false,
            interval_ms: 5 * MINUTE_MILLIS,
            lookback_ms: 7 * DAY_MILLIS,
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            start_on_launch: true,
            interval_ms: DAY_MILLIS,
            log_retention_ms: 90 * DAY_MILLIS,
            relay_retention_ms: 60 * DAY_MILLIS,
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            monitor_on_launch: true,
            fault_threshold: 10,
        }
    }
}
