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

//! Relay mode configuration shared by both servers.

use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::fmt;
use std::str::FromStr;

/// Whether the servers negotiate with each other.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RelayMode {
    /// Each server decides alone from its configured primary.
    Solo,
    #[default]
    Dual,
}

impl RelayMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayMode::Solo => "solo",
            RelayMode::Dual => "dual",
        }
    }
}

impl fmt::Display for RelayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "solo" => Ok(RelayMode::Solo),
            "dual" => Ok(RelayMode::Dual),
            other => Err(format!("unknown relay mode '{}'", other)),
        }
    }
}

/// An immutable relay configuration.
///
/// Configurations are totally ordered by
/// `(mode_timestamp, relay_mode, lower configured_primary first)`; a server
/// that sees a greater configuration in its partner's status adopts it, so
/// both converge on the latest one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelayConfig {
    pub mode_timestamp: i64,
    pub relay_mode: RelayMode,
    /// Server number (1 or 2) that should be primary.
    pub configured_primary: i32,
}

impl RelayConfig {
    pub fn new(mode_timestamp: i64, relay_mode: RelayMode, configured_primary: i32) -> Self {
        Self {
            mode_timestamp,
            relay_mode,
            configured_primary,
        }
    }

    fn sort_key(&self) -> (i64, RelayMode, Reverse<i32>) {
        (
            self.mode_timestamp,
            self.relay_mode,
            Reverse(self.configured_primary),
        )
    }

    pub fn is_configured_primary(&self, server_number: i32) -> bool {
        self.configured_primary == server_number
    }
}

impl Ord for RelayConfig {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for RelayConfig {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
