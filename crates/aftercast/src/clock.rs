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

//! Time source for the server.
//!
//! All persisted times are epoch milliseconds (`i64`). The clock can be
//! frozen and advanced so that tests drive the dispatcher, the timeline and
//! the relay engine deterministically. Clones share the same override, so a
//! test freezes the clock once and every component sees it.

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::RwLock;
use std::sync::Arc;

pub const SECOND_MILLIS: i64 = 1_000;
pub const MINUTE_MILLIS: i64 = 60 * SECOND_MILLIS;
pub const HOUR_MILLIS: i64 = 60 * MINUTE_MILLIS;
pub const DAY_MILLIS: i64 = 24 * HOUR_MILLIS;

/// Shared time source with an optional frozen override.
#[derive(Debug, Clone, Default)]
pub struct Clock {
    frozen: Arc<RwLock<Option<i64>>>,
}

impl Clock {
    /// A clock that follows the system time.
    pub fn system() -> Self {
        Self::default()
    }

    /// A clock frozen at `time` (epoch millis).
    pub fn frozen_at(time: i64) -> Self {
        let clock = Self::default();
        clock.freeze(time);
        clock
    }

    /// Current time in epoch milliseconds.
    pub fn now(&self) -> i64 {
        match *self.frozen.read() {
            Some(time) => time,
            None => Utc::now().timestamp_millis(),
        }
    }

    pub fn now_utc(&self) -> DateTime<Utc> {
        to_utc(self.now())
    }

    /// Freezes the clock at `time`.
    pub fn freeze(&self, time: i64) {
        *self.frozen.write() = Some(time);
    }

    /// Moves the clock forward by `millis`.
    ///
    /// A running clock is frozen at `now + millis`.
    pub fn advance(&self, millis: i64) {
        let mut frozen = self.frozen.write();
        let base = frozen.unwrap_or_else(|| Utc::now().timestamp_millis());
        *frozen = Some(base + millis);
    }

    /// Returns the clock to system time.
    pub fn unfreeze(&self) {
        *self.frozen.write() = None;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.read().is_some()
    }
}

/// Converts epoch millis into a UTC timestamp, clamping out-of-range values.
pub fn to_utc(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Human-readable rendering used in logs and the CLI.
pub fn format_millis(millis: i64) -> String {
    if millis == 0 {
        return "active".to_string();
    }
    to_utc(millis).to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Renders a duration in millis as `[-]DdHHhMMmSS.sss`.
pub fn format_duration(millis: i64) -> String {
    let sign = if millis < 0 { "-" } else { "" };
    let mut rest = millis.unsigned_abs();
    let days = rest / DAY_MILLIS as u64;
    rest %= DAY_MILLIS as u64;
    let hours = rest / HOUR_MILLIS as u64;
    rest %= HOUR_MILLIS as u64;
    let minutes = rest / MINUTE_MILLIS as u64;
    rest %= MINUTE_MILLIS as u64;
    let seconds = rest / SECOND_MILLIS as u64;
    let ms = rest % SECOND_MILLIS as u64;
    format!("{sign}{days}d{hours:02}h{minutes:02}m{seconds:02}.{ms:03}s")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frozen_clock_is_shared_between_clones() {
        let clock = Clock::frozen_at(1_000);
        let other = clock.clone();

        clock.advance(500);
        assert_eq!(other.now(), 1_500);

        other.freeze(42);
        assert_eq!(clock.now(), 42);
    }

    #[test]
    fn test_unfreeze_returns_to_system_time() {
        let clock = Clock::frozen_at(5);
        assert!(clock.is_frozen());
        clock.unfreeze();
        assert!(!clock.is_frozen());
        assert!(clock.now() > 1_600_000_000_000);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(DAY_MILLIS + 2 * HOUR_MILLIS + 1), "1d02h00m00.001s");
        assert_eq!(format_duration(-MINUTE_MILLIS), "-0d00h01m00.000s");
    }
}
