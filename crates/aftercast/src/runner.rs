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

//! Server assembly.
//!
//! A [`Server`] wires one dispatcher, its handler context and the relay
//! engine together. The dispatcher loop runs on the caller's task; the relay
//! heartbeat runs on its own tokio interval until the dispatcher stops.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::config::ConfigHandle;
use crate::database::{AccessLevel, Database, RecordStore};
use crate::dispatcher::{
    DispatchHandle, Dispatcher, HandlerContext, HandlerTable, LocalDistributor, Payload,
    WorkDistributor,
};
use crate::error::{DispatchError, StoreError};
use crate::external::Services;
use crate::handlers::default_handler_table;
use crate::health::HealthMonitor;
use crate::metrics;
use crate::relay::{PromotionListener, RelayEngine};
use crate::timeline::{deferred_report, RateLimiter, TimelineManager};

pub struct Server {
    dispatcher: Arc<Dispatcher>,
    ctx: Arc<HandlerContext>,
}

impl Server {
    /// Opens the local and relay stores named in the configuration.
    pub async fn open(config: ConfigHandle, services: Services) -> Result<Self, StoreError> {
        let snapshot = config.get();
        let local = Database::open(&snapshot.server.db_url, AccessLevel::ReadWrite).await?;
        let relay = Database::open(&snapshot.server.relay_db_url, AccessLevel::ReadWrite).await?;
        Ok(Self::with_stores(
            config,
            Clock::system(),
            local.store(),
            relay.store(),
            services,
            default_handler_table(),
        ))
    }

    pub fn with_stores(
        config: ConfigHandle,
        clock: Clock,
        store: Arc<dyn RecordStore>,
        relay_store: Arc<dyn RecordStore>,
        services: Services,
        handlers: HandlerTable,
    ) -> Self {
        let snapshot = config.get();
        let distributor: Arc<dyn WorkDistributor> = Arc::new(LocalDistributor::new());
        let dispatch = DispatchHandle::new(
            store.clone(),
            clock.clone(),
            distributor.clone(),
            snapshot.server.server_name.clone(),
        );
        let health = Arc::new(HealthMonitor::new(
            snapshot.health.monitor_on_launch,
            snapshot.health.fault_threshold,
        ));
        let relay = Arc::new(RelayEngine::new(
            relay_store,
            config.clone(),
            clock.clone(),
            health.clone(),
        ));
        let timelines = TimelineManager::new(store.clone(), clock.clone());
        relay.add_listener(Arc::new(PromotionResubmitter {
            store: store.clone(),
            timelines: timelines.clone(),
            dispatch: dispatch.clone(),
        }));

        let ctx = Arc::new(HandlerContext {
            config,
            clock,
            store,
            dispatch,
            timelines,
            relay,
            services,
            health,
            rate_limiter: Arc::new(RateLimiter::new()),
        });
        let dispatcher = Arc::new(Dispatcher::new(ctx.clone(), handlers, distributor));
        Self { dispatcher, ctx }
    }

    pub fn context(&self) -> &Arc<HandlerContext> {
        &self.ctx
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn handle(&self) -> DispatchHandle {
        self.ctx.dispatch.clone()
    }

    pub fn relay(&self) -> &Arc<RelayEngine> {
        &self.ctx.relay
    }

    /// Queues the periodic jobs the configuration asks to start.
    pub async fn submit_startup_tasks(&self) -> Result<(), DispatchError> {
        let config = self.ctx.config.get();
        if config.poll.start_on_launch {
            self.ctx.dispatch.submit_control(&Payload::PollStart).await?;
        }
        if config.cleanup.start_on_launch {
            self.ctx.dispatch.submit_control(&Payload::CleanupStart).await?;
        }
        Ok(())
    }

    /// Runs until a shutdown task completes.
    pub async fn run(&self) -> Result<(), DispatchError> {
        metrics::register_metrics();
        let config = self.ctx.config.get();
        info!(
            server_number = config.server.server_number,
            server_name = %config.server.server_name,
            "Server starting"
        );

        // Decide the primary state before the first task runs.
        if let Err(e) = self.ctx.relay.cycle().await {
            warn!(error = %e, "Initial relay cycle failed");
        }
        self.submit_startup_tasks().await?;

        let (stop_tx, stop_rx) = watch::channel(false);
        let relay_task = tokio::spawn(run_relay_loop(
            self.ctx.relay.clone(),
            self.ctx.dispatch.clone(),
            Duration::from_millis(config.relay.heartbeat_interval_ms.max(1) as u64),
            stop_rx,
        ));

        let result = self.dispatcher.run_loop().await;

        let _ = stop_tx.send(true);
        if let Err(e) = relay_task.await {
            error!(error = %e, "Relay loop panicked");
        }
        if let Err(e) = self.ctx.relay.shutdown().await {
            warn!(error = %e, "Could not write final relay status");
        }
        info!("Server stopped");
        result
    }
}

async fn run_relay_loop(
    relay: Arc<RelayEngine>,
    dispatch: DispatchHandle,
    interval: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let mut timer = tokio::time::interval(interval);
    timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately; the startup cycle already ran.
    timer.tick().await;
    loop {
        tokio::select! {
            _ = timer.tick() => {}
            _ = stop.changed() => break,
        }
        if let Err(e) = relay.cycle().await {
            error!(error = %e, "Relay cycle failed");
            continue;
        }
        if let Err(e) = relay.import_analyst_selections(&dispatch).await {
            warn!(error = %e, "Could not import analyst selections");
        }
    }
    info!("Relay loop stopped");
}

/// On promotion, reschedules publishing for every timeline whose publish
/// was held back while this server was secondary.
struct PromotionResubmitter {
    store: Arc<dyn RecordStore>,
    timelines: TimelineManager,
    dispatch: DispatchHandle,
}

impl PromotionResubmitter {
    async fn resubmit_all(&self, now: i64) -> Result<usize, DispatchError> {
        let mut resubmitted = 0;
        for event_id in self.store.timeline_event_ids().await? {
            let timeline = match self.timelines.open(&event_id).await {
                Ok(Some(timeline)) => timeline,
                Ok(None) => continue,
                Err(e) => {
                    warn!(%event_id, error = %e, "Skipping unreadable timeline");
                    continue;
                }
            };
            if let Some(action) = deferred_report(&timeline.status, now) {
                self.dispatch.delete_timeline_commands(&event_id, None).await?;
                self.timelines.submit(&self.dispatch, &event_id, action).await?;
                resubmitted += 1;
            }
        }
        Ok(resubmitted)
    }
}

#[async_trait]
impl PromotionListener for PromotionResubmitter {
    async fn on_promotion(&self, now: i64) {
        match self.resubmit_all(now).await {
            Ok(resubmitted) => info!(resubmitted, "Rescheduled held publishes after promotion"),
            Err(e) => error!(error = %e, "Could not reschedule held publishes"),
        }
    }
}
