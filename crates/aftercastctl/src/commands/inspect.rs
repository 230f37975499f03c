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

//! Read-only views of a server's stores.

use anyhow::{anyhow, bail, Context, Result};

use aftercast::clock::{
    format_millis, Clock, DAY_MILLIS, HOUR_MILLIS, MINUTE_MILLIS, SECOND_MILLIS,
};
use aftercast::config::AftercastConfig;
use aftercast::database::{AccessLevel, LogFilter, TaskFilter};
use aftercast::models::RelayTopic;
use aftercast::relay::ServerStatus;
use aftercast::timeline::TimelineManager;

use super::open_store;

/// Parses a look-back window such as "90d", "24h" or "1h30m" into
/// milliseconds. Units are `d`, `h`, `m` and `s`.
pub fn parse_window(text: &str) -> Result<i64> {
    let text = text.trim().to_ascii_lowercase();
    let mut millis = 0i64;
    for segment in text.split_inclusive(|c: char| c.is_ascii_alphabetic()) {
        let Some((split, _)) = segment.char_indices().last() else {
            continue;
        };
        let (digits, unit) = segment.split_at(split);
        let scale = match unit {
            "d" => DAY_MILLIS,
            "h" => HOUR_MILLIS,
            "m" => MINUTE_MILLIS,
            "s" => SECOND_MILLIS,
            _ => bail!("window '{}' needs a unit after each number (d, h, m or s)", text),
        };
        if digits.is_empty() {
            bail!("window '{}' has a unit with no number", text);
        }
        let count: i64 = digits
            .parse()
            .with_context(|| format!("bad number '{}' in window '{}'", digits, text))?;
        millis += count * scale;
    }
    if millis <= 0 {
        bail!("window '{}' must be longer than zero", text);
    }
    Ok(millis)
}

pub async fn tasks(config: &AftercastConfig, event: Option<String>) -> Result<()> {
    let store = open_store(&config.server.db_url, AccessLevel::ReadOnly).await?;
    let filter = match event {
        Some(event_id) => TaskFilter::for_event(event_id),
        None => TaskFilter::all(),
    };
    let tasks = store
        .find_tasks(&filter)
        .await
        .context("Failed to list tasks")?;

    if tasks.is_empty() {
        println!("No queued tasks");
        return Ok(());
    }
    for task in tasks {
        println!(
            "{}  {:<24} {:<20} stage={:<3} exec={} faults={} by={}",
            task.id,
            task.opcode.as_str(),
            task.event_id,
            task.stage,
            format_millis(task.exec_time),
            task.fault_count,
            task.submit_id,
        );
    }
    Ok(())
}

pub async fn timeline(config: &AftercastConfig, event_id: &str, entries: bool) -> Result<()> {
    let store = open_store(&config.server.db_url, AccessLevel::ReadOnly).await?;
    let manager = TimelineManager::new(store.clone(), Clock::system());
    let timeline = manager
        .open(event_id)
        .await
        .with_context(|| format!("Failed to read timeline for {}", event_id))?
        .ok_or_else(|| anyhow!("No timeline for event {}", event_id))?;

    println!("{}", serde_json::to_string_pretty(&timeline.status)?);

    if entries {
        for entry in store.timeline_entries(event_id).await? {
            let action = entry
                .action()
                .map(|action| action.as_str().to_string())
                .unwrap_or_else(|| format!("unknown({})", entry.action_code));
            println!(
                "#{:<4} {:<18} {}",
                entry.sequence_no,
                action,
                format_millis(entry.action_time)
            );
        }
    }
    Ok(())
}

pub async fn relay(config: &AftercastConfig) -> Result<()> {
    let store = open_store(&config.server.relay_db_url, AccessLevel::ReadOnly).await?;
    let now = Clock::system().now();
    let staleness = config.relay.heartbeat_interval_ms * config.relay.staleness_intervals;

    for server_number in 1..=2 {
        let item = store
            .get_relay_item(RelayTopic::ServerStatus, &ServerStatus::relay_id(server_number))
            .await
            .context("Failed to read relay store")?;
        let Some(item) = item else {
            println!("server {}: no status", server_number);
            continue;
        };
        match ServerStatus::from_item(&item) {
            Ok(status) => {
                let alive = if status.is_alive(now, staleness) {
                    "alive"
                } else {
                    "dead"
                };
                println!("server {} ({}):", server_number, alive);
                println!("{}", serde_json::to_string_pretty(&status)?);
            }
            Err(e) => println!("server {}: unreadable status: {}", server_number, e),
        }
    }
    Ok(())
}

pub async fn logs(
    config: &AftercastConfig,
    event: Option<String>,
    since: &str,
    limit: usize,
) -> Result<()> {
    let window = parse_window(since)?;
    let store = open_store(&config.server.db_url, AccessLevel::ReadOnly).await?;
    let now = Clock::system().now();
    let filter = LogFilter {
        event_id: event,
        min_time: now - window,
        max_time: now,
        limit: Some(limit),
    };
    let entries = store
        .query_log_entries(&filter)
        .await
        .context("Failed to read log entries")?;

    if entries.is_empty() {
        println!("No log entries in the last {}", since);
        return Ok(());
    }
    for entry in entries {
        println!(
            "{}  {:<24} {:<20} stage={:<3} {}",
            format_millis(entry.log_time),
            entry.opcode.as_str(),
            entry.event_id,
            entry.stage,
            entry.result_code,
        );
        if !entry.details.is_empty() {
            println!("    {}", entry.details);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_units_add_up() {
        assert_eq!(parse_window("2d").unwrap(), 2 * DAY_MILLIS);
        assert_eq!(parse_window("1h30m").unwrap(), HOUR_MILLIS + 30 * MINUTE_MILLIS);
        assert_eq!(parse_window(" 45S ").unwrap(), 45 * SECOND_MILLIS);
    }

    #[test]
    fn test_window_rejects_malformed_text() {
        for bad in ["", "10", "h", "5w", "0d", "1h5"] {
            assert!(parse_window(bad).is_err(), "{:?} should not parse", bad);
        }
    }
}
