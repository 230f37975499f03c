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

//! Implementation of the `rebuild` command.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use aftercast::clock::Clock;
use aftercast::config::AftercastConfig;
use aftercast::database::AccessLevel;
use aftercast::dispatcher::{DispatchHandle, LocalDistributor};
use aftercast::timeline::TimelineManager;

use super::open_store;

/// Collapses the event's timeline into one snapshot entry, then replaces its
/// queued commands with one scheduled against the rebuilt timeline.
pub async fn run(config: &AftercastConfig, event_id: &str) -> Result<()> {
    let store = open_store(&config.server.db_url, AccessLevel::ReadWrite).await?;
    let clock = Clock::system();
    let manager = TimelineManager::new(store.clone(), clock.clone());
    let dispatch = DispatchHandle::new(
        store,
        clock,
        Arc::new(LocalDistributor::new()),
        "aftercastctl",
    );

    let timeline = manager
        .rebuild(event_id)
        .await
        .with_context(|| format!("Failed to rebuild timeline for {}", event_id))?;
    let next = manager
        .resubmit_next(&dispatch, &timeline.status, config, None)
        .await
        .context("Failed to reschedule timeline")?;

    info!(event_id, "Timeline rebuilt");
    match next {
        Some(task_id) => println!("Rebuilt {}; next task {}", event_id, task_id),
        None => println!("Rebuilt {}; no further action scheduled", event_id),
    }
    Ok(())
}
