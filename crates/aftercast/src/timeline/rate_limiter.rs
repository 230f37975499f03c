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

//! Process-wide spacing between forecast computations.

use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

/// Keeps at least `min_gap` of wall-clock time between the starts of two
/// forecast computations.
///
/// A caller never waits longer than `ceiling`; if the gap cannot be honoured
/// within it the computation proceeds anyway.
#[derive(Debug, Default)]
pub struct RateLimiter {
    last_start: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for the next slot and claims it. Returns the time waited.
    pub async fn acquire(&self, min_gap: Duration, ceiling: Duration) -> Duration {
        let mut last_start = self.last_start.lock().await;
        let wait = match *last_start {
            Some(last) => min_gap.saturating_sub(last.elapsed()).min(ceiling),
            None => Duration::ZERO,
        };
        if !wait.is_zero() {
            debug!(wait_ms = wait.as_millis() as u64, "Rate limiting forecast computation");
            tokio::time::sleep(wait).await;
        }
        *last_start = Some(Instant::now());
        wait
    }
}
