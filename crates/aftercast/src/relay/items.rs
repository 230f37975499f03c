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

//! Payloads of the per-event relay topics.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::CorruptRecord;
use crate::models::{RecordKind, RelayItem, RelayTopic};
use crate::timeline::AnalystOptions;

/// A forecast for the event reached the product sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdlCompletion {
    /// Lag of the forecast that was sent.
    pub lag: i64,
    #[serde(default)]
    pub product_code: Option<String>,
    /// The server that sent it.
    pub server_number: i32,
}

impl PdlCompletion {
    /// True when the recorded send already covers the forecast at `lag`.
    pub fn covers(&self, lag: i64) -> bool {
        self.lag >= lag
    }
}

/// Another source published a product for the event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignProduct {
    pub source: String,
    pub product_time: i64,
}

/// Analyst options chosen on one server, to be applied on both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalystSelection {
    pub options: AnalystOptions,
    pub server_number: i32,
}

pub fn encode_item<T: Serialize>(
    topic: RelayTopic,
    relay_id: &str,
    relay_time: i64,
    content: &T,
) -> Result<RelayItem, serde_json::Error> {
    Ok(RelayItem {
        topic,
        relay_id: relay_id.to_string(),
        relay_time,
        payload: serde_json::to_string(content)?,
    })
}

pub fn decode_item<T: DeserializeOwned>(item: &RelayItem) -> Result<T, CorruptRecord> {
    serde_json::from_str(&item.payload).map_err(|e| {
        CorruptRecord::new(
            RecordKind::RelayItem,
            format!("{}/{}", item.topic, item.relay_id),
            e,
        )
    })
}
