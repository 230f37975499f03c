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

//! Server status records exchanged through the relay store.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::config::RelayConfig;
use super::items::{decode_item, encode_item};
use crate::error::CorruptRecord;
use crate::health::HealthState;
use crate::models::{RelayItem, RelayTopic};

/// Bumped whenever the status layout changes incompatibly. Servers with
/// different versions never connect.
pub const PROTOCOL_VERSION: i32 = 1;

macro_rules! state_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

state_enum! {
    /// This server's view of the link to its partner.
    LinkState {
        Shutdown => "shutdown",
        Solo => "solo",
        Connecting => "connecting",
        Connected => "connected",
    }
}

state_enum! {
    PrimaryState {
        Shutdown => "shutdown",
        Secondary => "secondary",
        Primary => "primary",
        /// Partner looks dead; promoted on the next cycle if it stays dead.
        Contending => "contending",
    }
}

state_enum! {
    /// What this server infers about its partner.
    InferredState {
        None => "none",
        Alive => "alive",
        Dead => "dead",
        Primary => "primary",
        Secondary => "secondary",
    }
}

/// One server's self-reported status. Only its owner writes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerStatus {
    pub protocol_version: i32,
    pub server_number: i32,
    pub server_name: String,
    pub heartbeat_time: i64,
    pub link_state: LinkState,
    pub relay_config: RelayConfig,
    pub primary_state: PrimaryState,
    pub start_time: i64,
    pub inferred_state: InferredState,
    pub health_status: HealthState,
}

impl ServerStatus {
    pub fn relay_id(server_number: i32) -> String {
        server_number.to_string()
    }

    /// Alive means a heartbeat within `staleness_ms` and not shut down.
    pub fn is_alive(&self, now: i64, staleness_ms: i64) -> bool {
        self.link_state != LinkState::Shutdown && now - self.heartbeat_time <= staleness_ms
    }

    pub fn to_item(&self) -> Result<RelayItem, serde_json::Error> {
        encode_item(
            RelayTopic::ServerStatus,
            &Self::relay_id(self.server_number),
            self.heartbeat_time,
            self,
        )
    }

    pub fn from_item(item: &RelayItem) -> Result<Self, CorruptRecord> {
        decode_item(item)
    }
}
