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

//! Earthquake catalog interface.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::ExternalFault;

/// Catalog snapshot of a mainshock, as kept in the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mainshock {
    pub event_id: String,
    /// Origin time, epoch millis.
    pub origin_time: i64,
    pub magnitude: f64,
    pub latitude: f64,
    pub longitude: f64,
    /// Depth in km.
    pub depth: f64,
}

/// Parameters for the shadowing search around a mainshock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowSearch {
    pub radius_km: f64,
    /// How far before the mainshock to look for a larger event.
    pub lookback_ms: i64,
    /// Search up to this time (normally now).
    pub end_time: i64,
    /// Minimum magnitude excess of a shadowing event.
    pub min_magnitude_excess: f64,
}

/// A larger nearby event that makes a forecast for the mainshock obsolete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowInfo {
    pub event_id: String,
    pub origin_time: i64,
    pub magnitude: f64,
}

impl ShadowInfo {
    /// True when the shadowing event came after the mainshock, making the
    /// mainshock a foreshock.
    pub fn is_foreshock_of(&self, mainshock: &Mainshock) -> bool {
        self.origin_time > mainshock.origin_time
    }
}

#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Current catalog parameters of the event, or `NotFound` if it was deleted.
    async fn get_mainshock(&self, event_id: &str) -> Result<Mainshock, ExternalFault>;

    /// The largest event shadowing `mainshock`, if any.
    async fn find_shadow(
        &self,
        mainshock: &Mainshock,
        search: &ShadowSearch,
    ) -> Result<Option<ShadowInfo>, ExternalFault>;

    /// Events with origin in `[start_time, end_time]` and magnitude at least
    /// `min_magnitude`.
    async fn poll_recent(
        &self,
        start_time: i64,
        end_time: i64,
        min_magnitude: f64,
    ) -> Result<Vec<Mainshock>, ExternalFault>;
}
