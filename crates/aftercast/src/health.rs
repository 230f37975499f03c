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

//! Dispatcher health monitoring.
//!
//! Counters are plain atomics updated by the dispatcher after every task.
//! The derived [`HealthState`] is published in this server's relay status so
//! the partner and operators can see it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Unmonitored,
    Normal,
    /// Consecutive faults reached the configured threshold.
    Impaired,
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HealthState::Unmonitored => "unmonitored",
            HealthState::Normal => "normal",
            HealthState::Impaired => "impaired",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub state: HealthState,
    pub successes: u64,
    pub faults: u64,
    pub consecutive_faults: u64,
    pub quarantined: u64,
    /// Zero when no fault was recorded since the last reset.
    pub last_fault_time: i64,
}

#[derive(Debug)]
pub struct HealthMonitor {
    enabled: AtomicBool,
    fault_threshold: AtomicU64,
    successes: AtomicU64,
    faults: AtomicU64,
    consecutive_faults: AtomicU64,
    quarantined: AtomicU64,
    last_fault_time: AtomicI64,
}

impl HealthMonitor {
    pub fn new(enabled: bool, fault_threshold: u64) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            fault_threshold: AtomicU64::new(fault_threshold.max(1)),
            successes: AtomicU64::new(0),
            faults: AtomicU64::new(0),
            consecutive_faults: AtomicU64::new(0),
            quarantined: AtomicU64::new(0),
            last_fault_time: AtomicI64::new(0),
        }
    }

    pub fn start(&self) {
        if !self.enabled.swap(true, Ordering::SeqCst) {
            info!("Health monitoring started");
        }
    }

    pub fn stop(&self) {
        if self.enabled.swap(false, Ordering::SeqCst) {
            info!("Health monitoring stopped");
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_fault_threshold(&self, threshold: u64) {
        self.fault_threshold.store(threshold.max(1), Ordering::SeqCst);
    }

    /// Clears every counter.
    pub fn reset(&self) {
        self.successes.store(0, Ordering::SeqCst);
        self.faults.store(0, Ordering::SeqCst);
        self.consecutive_faults.store(0, Ordering::SeqCst);
        self.quarantined.store(0, Ordering::SeqCst);
        self.last_fault_time.store(0, Ordering::SeqCst);
        info!("Health counters reset");
    }

    pub fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
        self.consecutive_faults.store(0, Ordering::Relaxed);
    }

    pub fn record_fault(&self, now: i64) {
        self.faults.fetch_add(1, Ordering::Relaxed);
        let consecutive = self.consecutive_faults.fetch_add(1, Ordering::Relaxed) + 1;
        self.last_fault_time.store(now, Ordering::Relaxed);
        if self.is_enabled() && consecutive == self.fault_threshold.load(Ordering::Relaxed) {
            warn!(consecutive_faults = consecutive, "Dispatcher health impaired");
        }
    }

    pub fn record_quarantine(&self) {
        self.quarantined.fetch_add(1, Ordering::Relaxed);
    }

    pub fn state(&self) -> HealthState {
        if !self.is_enabled() {
            HealthState::Unmonitored
        } else if self.consecutive_faults.load(Ordering::Relaxed)
            >= self.fault_threshold.load(Ordering::Relaxed)
        {
            HealthState::Impaired
        } else {
            HealthState::Normal
        }
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            state: self.state(),
            successes: self.successes.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
            consecutive_faults: self.consecutive_faults.load(Ordering::Relaxed),
            quarantined: self.quarantined.load(Ordering::Relaxed),
            last_fault_time: self.last_fault_time.load(Ordering::Relaxed),
        }
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new(true, 10)
    }
}
