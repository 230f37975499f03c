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

//! Builder for [`AftercastConfig`].
//!
//! ```rust,ignore
//! let config = AftercastConfig::builder()
//!     .server_number(2)
//!     .db_url("memory:")
//!     .relay_db_url("sqlite:///var/lib/aftercast/relay.db")
//!     .forecast_lags(vec![HOUR_MILLIS, DAY_MILLIS])
//!     .build()?;
//! ```

use super::types::*;
use super::validation::Validate;
use crate::error::ConfigError;
use crate::relay::RelayMode;

#[derive(Debug, Clone, Default)]
pub struct AftercastConfigBuilder {
    config: AftercastConfig,
}

impl AftercastConfig {
    pub fn builder() -> AftercastConfigBuilder {
        AftercastConfigBuilder::default()
    }
}

impl AftercastConfigBuilder {
    /// Sets the server number and, unless already changed, a matching name.
    pub fn server_number(mut self, value: i32) -> Self {
        if self.config.server.server_name == ServerConfig::default().server_name {
            self.config.server.server_name = format!("aftercast-{}", value);
        }
        self.config.server.server_number = value;
        self
    }

    pub fn server_name(mut self, value: impl Into<String>) -> Self {
        self.config.server.server_name = value.into();
        self
    }

    pub fn db_url(mut self, value: impl Into<String>) -> Self {
        self.config.server.db_url = value.into();
        self
    }

    pub fn relay_db_url(mut self, value: impl Into<String>) -> Self {
        self.config.server.relay_db_url = value.into();
        self
    }

    pub fn idle_poll_ms(mut self, value: i64) -> Self {
        self.config.dispatcher.idle_poll_ms = value;
        self
    }

    pub fn fault_delay_ms(mut self, value: i64) -> Self {
        self.config.dispatcher.fault_delay_ms = value;
        self
    }

    pub fn max_faults(mut self, value: i32) -> Self {
        self.config.dispatcher.max_faults = value;
        self
    }

    /// Sets the forecast lags and stretches the expiry age to cover them.
    pub fn forecast_lags(mut self, lags: Vec<i64>) -> Self {
        if let Some(last) = lags.last() {
            self.config.forecast.max_age_ms = self.config.forecast.max_age_ms.max(*last);
        }
        self.config.forecast.lags_ms = lags;
        self
    }

    pub fn max_delay_ms(mut self, value: i64) -> Self {
        self.config.forecast.max_delay_ms = value;
        self
    }

    pub fn max_age_ms(mut self, value: i64) -> Self {
        self.config.forecast.max_age_ms = value;
        self
    }

    pub fn withdraw_lag_ms(mut self, value: i64) -> Self {
        self.config.forecast.withdraw_lag_ms = value;
        self
    }

    pub fn min_compute_gap_ms(mut self, value: i64) -> Self {
        self.config.forecast.min_compute_gap_ms = value;
        self
    }

    pub fn publish_retry_lags(mut self, lags: Vec<i64>) -> Self {
        self.config.publish.retry_lags_ms = lags;
        self
    }

    pub fn publish_retry_min_gap_ms(mut self, value: i64) -> Self {
        self.config.publish.retry_min_gap_ms = value;
        self
    }

    pub fn publish_max_horizon_ms(mut self, value: i64) -> Self {
        self.config.publish.max_horizon_ms = value;
        self
    }

    pub fn catalog_retry_lags(mut self, lags: Vec<i64>) -> Self {
        self.config.catalog.retry_lags_ms = lags;
        self
    }

    pub fn catalog_retry_min_gap_ms(mut self, value: i64) -> Self {
        self.config.catalog.retry_min_gap_ms = value;
        self
    }

    pub fn min_magnitude(mut self, value: f64) -> Self {
        self.config.intake.min_magnitude = value;
        self
    }

    pub fn heartbeat_interval_ms(mut self, value: i64) -> Self {
        self.config.relay.heartbeat_interval_ms = value;
        self
    }

    pub fn staleness_intervals(mut self, value: i64) -> Self {
        self.config.relay.staleness_intervals = value;
        self
    }

    pub fn relay_mode(mut self, mode: RelayMode, configured_primary: i32) -> Self {
        self.config.relay.relay_mode = mode;
        self.config.relay.configured_primary = configured_primary;
        self
    }

    pub fn poll_on_launch(mut self, value: bool) -> Self {
        self.config.poll.start_on_launch = value;
        self
    }

    pub fn cleanup_on_launch(mut self, value: bool) -> Self {
        self.config.cleanup.start_on_launch = value;
        self
    }

    pub fn health_monitor(mut self, enabled: bool, fault_threshold: u64) -> Self {
        self.config.health.monitor_on_launch = enabled;
        self.config.health.fault_threshold = fault_threshold;
        self
    }

    /// Validates and returns the configuration.
    pub fn build(self) -> Result<AftercastConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
