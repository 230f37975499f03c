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

use regex::Regex;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::types::AftercastConfig;
use super::validation::Validate;
use crate::error::ConfigError;
use crate::relay::RelayMode;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV_VAR: &str = "AFTERCAST_CONFIG";

pub struct ConfigLoader {
    search_paths: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader with default search paths
    pub fn new() -> Self {
        Self {
            search_paths: vec![
                PathBuf::from("./aftercast.toml"),
                PathBuf::from("/etc/aftercast/aftercast.toml"),
            ],
        }
    }

    pub fn with_search_paths(search_paths: Vec<PathBuf>) -> Self {
        Self { search_paths }
    }

    /// Loads, overrides and validates the configuration.
    ///
    /// The file is `config_file` if given, else `$AFTERCAST_CONFIG`, else the
    /// first existing search path. With no file at all the defaults are used.
    pub fn load(&self, config_file: Option<&Path>) -> Result<AftercastConfig, ConfigError> {
        let path = config_file
            .map(Path::to_path_buf)
            .or_else(|| env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from))
            .or_else(|| self.find_config_file());

        let mut config = match &path {
            Some(path) => self.load_from_file(path)?,
            None => {
                info!("No configuration file found, using defaults");
                AftercastConfig::default()
            }
        };
        apply_env_overrides(&mut config, |key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parses one TOML file, substituting `${VAR}` references first.
    pub fn load_from_file(&self, path: &Path) -> Result<AftercastConfig, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let substituted = substitute_env_vars(&content, |key| env::var(key).ok())?;
        let config = toml::from_str::<AftercastConfig>(&substituted)?;
        debug!(path = %path.display(), "Configuration file loaded");
        Ok(config)
    }

    pub fn find_config_file(&self) -> Option<PathBuf> {
        self.search_paths
            .iter()
            .find(|path| path.is_file())
            .cloned()
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Replaces `${VAR}`, `${VAR:-default}` and `${VAR:?message}` in `content`.
pub fn substitute_env_vars<F>(content: &str, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ConfigError::Invalid(e.to_string()))?;
    let mut result = content.to_string();
    for cap in re.captures_iter(content) {
        let replacement = expand(&cap[1], &lookup)?;
        result = result.replace(&cap[0], &replacement);
    }
    Ok(result)
}

fn expand<F>(expr: &str, lookup: &F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some((var, default)) = expr.split_once(":-") {
        Ok(lookup(var).unwrap_or_else(|| default.to_string()))
    } else if let Some((var, message)) = expr.split_once(":?") {
        lookup(var).ok_or_else(|| ConfigError::Env {
            var: var.to_string(),
            value: format!("required but not set: {}", message),
        })
    } else {
        lookup(expr).ok_or_else(|| ConfigError::Env {
            var: expr.to_string(),
            value: "required but not set".to_string(),
        })
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Env {
            var: key.to_string(),
            value,
        })
}

/// Applies `AFTERCAST_*` overrides on top of the parsed configuration.
pub fn apply_env_overrides<F>(config: &mut AftercastConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("AFTERCAST_SERVER_NUMBER") {
        config.server.server_number = parse_var("AFTERCAST_SERVER_NUMBER", v)?;
    }
    if let Some(v) = lookup("AFTERCAST_SERVER_NAME") {
        config.server.server_name = v;
    }
    if let Some(v) = lookup("AFTERCAST_DB_URL") {
        config.server.db_url = v;
    }
    if let Some(v) = lookup("AFTERCAST_RELAY_DB_URL") {
        config.server.relay_db_url = v;
    }
    if let Some(v) = lookup("AFTERCAST_RELAY_MODE") {
        config.relay.relay_mode = match v.trim() {
            "solo" => RelayMode::Solo,
            "dual" => RelayMode::Dual,
            _ => {
                return Err(ConfigError::Env {
                    var: "AFTERCAST_RELAY_MODE".to_string(),
                    value: v,
                })
            }
        };
    }
    if let Some(v) = lookup("AFTERCAST_CONFIGURED_PRIMARY") {
        config.relay.configured_primary = parse_var("AFTERCAST_CONFIGURED_PRIMARY", v)?;
    }
    Ok(())
}
