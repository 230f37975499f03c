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
use crate::error::ConfigError;

pub trait Validate {
    fn validate(&self) -> Result<(), ConfigError>;
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(message.into())
}

fn check_lags(name: &str, lags: &[i64]) -> Result<(), ConfigError> {
    if lags.is_empty() {
        return Err(invalid(format!("{} must not be empty", name)));
    }
    if lags.iter().any(|lag| *lag < 0) {
        return Err(invalid(format!("{} must not contain negative lags", name)));
    }
    if lags.windows(2).any(|w| w[0] >= w[1]) {
        return Err(invalid(format!("{} must be strictly increasing", name)));
    }
    Ok(())
}

fn check_positive(name: &str, value: i64) -> Result<(), ConfigError> {
    if value <= 0 {
        return Err(invalid(format!("{} must be positive, got {}", name, value)));
    }
    Ok(())
}

impl Validate for AftercastConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let errors: Vec<String> = [
            self.server.validate(),
            self.dispatcher.validate(),
            self.forecast.validate(),
            self.publish.validate(),
            self.catalog.validate(),
            self.intake.validate(),
            self.relay.validate(),
            self.poll.validate(),
            self.cleanup.validate(),
        ]
        .into_iter()
        .filter_map(|result| result.err())
        .map(|e| match e {
            ConfigError::Invalid(message) => message,
            other => other.to_string(),
        })
        .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors.join("; ")))
        }
    }
}

impl Validate for ServerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=2).contains(&self.server_number) {
            return Err(invalid(format!(
                "server_number must be 1 or 2, got {}",
                self.server_number
            )));
        }
        if self.server_name.trim().is_empty() {
            return Err(invalid("server_name must not be empty"));
        }
        if self.db_url == self.relay_db_url {
            return Err(invalid("db_url and relay_db_url must name different stores"));
        }
        Ok(())
    }
}

impl Validate for DispatcherConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        check_positive("dispatcher.idle_poll_ms", self.idle_poll_ms)?;
        check_positive("dispatcher.fault_delay_ms", self.fault_delay_ms)?;
        if self.max_faults < 0 {
            return Err(invalid("dispatcher.max_faults must not be negative"));
        }
        Ok(())
    }
}

impl Validate for ForecastConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        check_lags("forecast.lags_ms", &self.lags_ms)?;
        check_positive("forecast.max_delay_ms", self.max_delay_ms)?;
        check_positive("forecast.model_timeout_ms", self.model_timeout_ms)?;
        if let Some(last) = self.lags_ms.last() {
            if self.max_age_ms < *last {
                return Err(invalid("forecast.max_age_ms must not be less than the last lag"));
            }
        }
        if self.min_compute_gap_ms < 0 || self.rate_limit_ceiling_ms < 0 {
            return Err(invalid("forecast rate limit settings must not be negative"));
        }
        Ok(())
    }
}

impl Validate for PublishConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        check_lags("publish.retry_lags_ms", &self.retry_lags_ms)?;
        check_positive("publish.max_horizon_ms", self.max_horizon_ms)?;
        check_positive("publish.timeout_ms", self.timeout_ms)
    }
}

impl Validate for CatalogConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        check_lags("catalog.retry_lags_ms", &self.retry_lags_ms)?;
        check_positive("catalog.timeout_ms", self.timeout_ms)?;
        if self.shadow_radius_km < 0.0 {
            return Err(invalid("catalog.shadow_radius_km must not be negative"));
        }
        Ok(())
    }
}

impl Validate for IntakeConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.min_latitude > self.max_latitude || self.min_longitude > self.max_longitude {
            return Err(invalid("intake region bounds are inverted"));
        }
        Ok(())
    }
}

impl Validate for RelaySettings {
    fn validate(&self) -> Result<(), ConfigError> {
        check_positive("relay.heartbeat_interval_ms", self.heartbeat_interval_ms)?;
        check_positive("relay.staleness_intervals", self.staleness_intervals)?;
        if !(1..=2).contains(&self.configured_primary) {
            return Err(invalid("relay.configured_primary must be 1 or 2"));
        }
        Ok(())
    }
}

impl Validate for PollConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        check_positive("poll.interval_ms", self.interval_ms)?;
        check_positive("poll.lookback_ms", self.lookback_ms)
    }
}

impl Validate for CleanupConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        check_positive("cleanup.interval_ms", self.interval_ms)?;
        check_positive("cleanup.log_retention_ms", self.log_retention_ms)?;
        check_positive("cleanup.relay_retention_ms", self.relay_retention_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(AftercastConfig::default().validate().is_ok());
    }

    #[test]
    fn test_unsorted_lags_rejected() {
        let mut config = AftercastConfig::default();
        config.forecast.lags_ms = vec![3_600_000, 1_800_000];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("strictly increasing"));
    }

    #[test]
    fn test_errors_are_collected() {
        let mut config = AftercastConfig::default();
        config.server.server_number = 3;
        config.relay.staleness_intervals = 0;
        let message = config.validate().unwrap_err().to_string();
        assert!(message.contains("server_number"));
        assert!(message.contains("staleness_intervals"));
    }
}
