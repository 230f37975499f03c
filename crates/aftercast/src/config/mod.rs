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

//! Server configuration.
//!
//! [`AftercastConfig`] is read from TOML by the [`ConfigLoader`], with
//! `${VAR}` substitution in the file and `AFTERCAST_*` environment
//! overrides applied afterwards. Components receive a [`ConfigHandle`] at
//! construction and read immutable snapshots from it.
//!
//! ```rust,ignore
//! use aftercast::config::{ConfigHandle, ConfigLoader};
//!
//! let config = ConfigLoader::new().load(None)?;
//! let handle = ConfigHandle::new(config);
//! let lags = &handle.get().forecast.lags_ms;
//! ```

pub mod builder;
pub mod defaults;
pub mod handle;
pub mod loader;
pub mod types;
pub mod validation;

pub use builder::AftercastConfigBuilder;
pub use handle::ConfigHandle;
pub use loader::{apply_env_overrides, substitute_env_vars, ConfigLoader, CONFIG_ENV_VAR};
pub use types::*;
pub use validation::Validate;
