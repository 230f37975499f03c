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

//! Relay Item Model
//!
//! Relay items are the only channel between the two servers. There is one
//! item per `(topic, relay_id)`, versioned by `relay_time`: a write carrying
//! an older `relay_time` than the stored item is rejected.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RelayTopic {
    /// Heartbeat; `relay_id` is the server number.
    ServerStatus,
    /// A forecast for the event reached the publish sink; `relay_id` is the event.
    PdlCompletion,
    /// Another source published a product for the event.
    ForeignProduct,
    /// Analyst options chosen on one server, to be applied on both.
    AnalystSelection,
}

impl RelayTopic {
    pub fn code(&self) -> i32 {
        match self {
            RelayTopic::ServerStatus => 1,
            RelayTopic::PdlCompletion => 2,
            RelayTopic::ForeignProduct => 3,
            RelayTopic::AnalystSelection => 4,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(RelayTopic::ServerStatus),
            2 => Some(RelayTopic::PdlCompletion),
            3 => Some(RelayTopic::ForeignProduct),
            4 => Some(RelayTopic::AnalystSelection),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelayTopic::ServerStatus => "server_status",
            RelayTopic::PdlCompletion => "pdl_completion",
            RelayTopic::ForeignProduct => "foreign_product",
            RelayTopic::AnalystSelection => "analyst_selection",
        }
    }
}

impl fmt::Display for RelayTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A relay record (domain type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayItem {
    pub topic: RelayTopic,
    pub relay_id: String,
    pub relay_time: i64,
    /// JSON-encoded, topic-specific content.
    pub payload: String,
}

/// Result of a conditional relay write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayWrite {
    Stored,
    /// The stored item is newer; nothing was written.
    Superseded { stored_time: i64 },
}

impl RelayWrite {
    pub fn is_stored(&self) -> bool {
        matches!(self, RelayWrite::Stored)
    }
}
