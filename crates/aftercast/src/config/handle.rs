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

use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use super::loader::ConfigLoader;
use super::types::AftercastConfig;
use super::validation::Validate;
use crate::error::ConfigError;

/// Shared, swappable configuration snapshot.
///
/// Readers take an `Arc` snapshot with [`get`](Self::get) and keep using it
/// for the rest of their operation; [`reload`](Self::reload) swaps in a new
/// snapshot without disturbing them.
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    current: Arc<RwLock<Arc<AftercastConfig>>>,
    source: Option<PathBuf>,
}

impl ConfigHandle {
    pub fn new(config: AftercastConfig) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(config))),
            source: None,
        }
    }

    /// A handle that reloads from `path`.
    pub fn with_source(config: AftercastConfig, path: impl Into<PathBuf>) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(config))),
            source: Some(path.into()),
        }
    }

    pub fn get(&self) -> Arc<AftercastConfig> {
        self.current.read().clone()
    }

    /// Re-reads the source file (or the default search path) and swaps the
    /// snapshot. The old snapshot stays in place if loading fails.
    pub fn reload(&self) -> Result<Arc<AftercastConfig>, ConfigError> {
        let config = ConfigLoader::new().load(self.source.as_deref())?;
        Ok(self.swap(config))
    }

    /// Validates and installs `config`.
    pub fn replace(&self, config: AftercastConfig) -> Result<Arc<AftercastConfig>, ConfigError> {
        config.validate()?;
        Ok(self.swap(config))
    }

    fn swap(&self, config: AftercastConfig) -> Arc<AftercastConfig> {
        let snapshot = Arc::new(config);
        *self.current.write() = snapshot.clone();
        info!("Configuration snapshot replaced");
        snapshot
    }
}

impl Default for ConfigHandle {
    fn default() -> Self {
        Self::new(AftercastConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_snapshots_survive_replace() {
        let handle = ConfigHandle::default();
        let before = handle.get();
        let mut changed = AftercastConfig::default();
        changed.dispatcher.max_faults = 9;
        handle.replace(changed).unwrap();
        assert_eq!(before.dispatcher.max_faults, 5);
        assert_eq!(handle.get().dispatcher.max_faults, 9);
    }

    #[test]
    fn test_invalid_replace_keeps_old_snapshot() {
        let handle = ConfigHandle::default();
        let mut broken = AftercastConfig::default();
        broken.forecast.lags_ms.clear();
        assert!(handle.replace(broken).is_err());
        assert!(!handle.get().forecast.lags_ms.is_empty());
    }

    #[test]
    fn test_reload_from_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[dispatcher]\nmax_faults = 2").unwrap();
        let handle = ConfigHandle::with_source(AftercastConfig::default(), file.path());
        let reloaded = handle.reload().unwrap();
        assert_eq!(reloaded.dispatcher.max_faults, 2);
        assert_eq!(handle.get().dispatcher.max_faults, 2);
    }
}
