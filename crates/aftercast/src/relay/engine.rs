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

//! The relay protocol engine.
//!
//! Each server owns one `server_status` relay item and reads its partner's.
//! A cycle reads the partner, adopts a newer relay configuration, decides
//! this server's primary state and writes a fresh heartbeat. There is no
//! direct channel between the servers; everything goes through the shared
//! relay store, whose writes reject older versions.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::config::{RelayConfig, RelayMode};
use super::items::{decode_item, encode_item, AnalystSelection, ForeignProduct, PdlCompletion};
use super::status::{InferredState, LinkState, PrimaryState, ServerStatus, PROTOCOL_VERSION};
use crate::clock::Clock;
use crate::config::ConfigHandle;
use crate::database::RecordStore;
use crate::dispatcher::{AnalystRequest, DispatchHandle, Payload};
use crate::error::RelayError;
use crate::health::HealthMonitor;
use crate::metrics;
use crate::models::{RelayTopic, RelayWrite};
use crate::timeline::AnalystOptions;

/// Notified when this server becomes primary.
#[async_trait]
pub trait PromotionListener: Send + Sync {
    async fn on_promotion(&self, now: i64);
}

/// Point-in-time view of the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct RelaySnapshot {
    pub server_number: i32,
    pub relay_config: RelayConfig,
    pub link_state: LinkState,
    pub primary_state: PrimaryState,
    pub inferred_state: InferredState,
    pub partner: Option<ServerStatus>,
    pub last_cycle_time: i64,
}

impl RelaySnapshot {
    pub fn is_primary(&self) -> bool {
        self.primary_state == PrimaryState::Primary
    }
}

struct EngineState {
    relay_config: RelayConfig,
    link_state: LinkState,
    primary_state: PrimaryState,
    inferred_state: InferredState,
    partner: Option<ServerStatus>,
    last_cycle_time: i64,
    shut_down: bool,
    selection_watermark: i64,
    selections_at_watermark: HashSet<String>,
}

pub struct RelayEngine {
    relay_store: Arc<dyn RecordStore>,
    config: ConfigHandle,
    clock: Clock,
    health: Arc<HealthMonitor>,
    server_number: i32,
    server_name: String,
    start_time: i64,
    state: RwLock<EngineState>,
    listeners: Mutex<Vec<Arc<dyn PromotionListener>>>,
}

/// Outcome of the primary decision for one cycle.
struct Decision {
    link_state: LinkState,
    primary_state: PrimaryState,
    inferred_state: InferredState,
}

impl RelayEngine {
    pub fn new(
        relay_store: Arc<dyn RecordStore>,
        config: ConfigHandle,
        clock: Clock,
        health: Arc<HealthMonitor>,
    ) -> Self {
        let snapshot = config.get();
        let relay_config = RelayConfig::new(
            snapshot.relay.mode_timestamp,
            snapshot.relay.relay_mode,
            snapshot.relay.configured_primary,
        );
        let start_time = clock.now();
        Self {
            relay_store,
            server_number: snapshot.server.server_number,
            server_name: snapshot.server.server_name.clone(),
            config,
            clock,
            health,
            start_time,
            state: RwLock::new(EngineState {
                relay_config,
                link_state: LinkState::Connecting,
                primary_state: PrimaryState::Secondary,
                inferred_state: InferredState::None,
                partner: None,
                last_cycle_time: 0,
                shut_down: false,
                selection_watermark: 0,
                selections_at_watermark: HashSet::new(),
            }),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn server_number(&self) -> i32 {
        self.server_number
    }

    pub fn partner_number(&self) -> i32 {
        3 - self.server_number
    }

    pub fn add_listener(&self, listener: Arc<dyn PromotionListener>) {
        self.listeners.lock().push(listener);
    }

    /// Whether this server may publish. False before the first cycle.
    pub fn is_primary(&self) -> bool {
        self.state.read().primary_state == PrimaryState::Primary
    }

    pub fn relay_config(&self) -> RelayConfig {
        self.state.read().relay_config
    }

    pub fn snapshot(&self) -> RelaySnapshot {
        let state = self.state.read();
        RelaySnapshot {
            server_number: self.server_number,
            relay_config: state.relay_config,
            link_state: state.link_state,
            primary_state: state.primary_state,
            inferred_state: state.inferred_state,
            partner: state.partner.clone(),
            last_cycle_time: state.last_cycle_time,
        }
    }

    /// This server's status as it would be written now.
    pub fn own_status(&self, now: i64) -> ServerStatus {
        let state = self.state.read();
        ServerStatus {
            protocol_version: PROTOCOL_VERSION,
            server_number: self.server_number,
            server_name: self.server_name.clone(),
            heartbeat_time: now,
            link_state: state.link_state,
            relay_config: state.relay_config,
            primary_state: state.primary_state,
            start_time: self.start_time,
            inferred_state: state.inferred_state,
            health_status: self.health.state(),
        }
    }

    /// Installs a new relay configuration stamped `now`.
    ///
    /// The stamp is bumped past the current configuration's so the new one
    /// always wins the comparison, on this server and on the partner.
    pub fn set_relay_mode(&self, relay_mode: RelayMode, configured_primary: i32, now: i64) -> RelayConfig {
        let mut state = self.state.write();
        let mode_timestamp = now.max(state.relay_config.mode_timestamp + 1);
        let relay_config = RelayConfig::new(mode_timestamp, relay_mode, configured_primary);
        info!(
            relay_mode = %relay_mode,
            configured_primary,
            mode_timestamp,
            "Relay configuration changed"
        );
        state.relay_config = relay_config;
        relay_config
    }

    pub async fn read_server_status(
        &self,
        server_number: i32,
    ) -> Result<Option<ServerStatus>, RelayError> {
        let item = self
            .relay_store
            .get_relay_item(RelayTopic::ServerStatus, &ServerStatus::relay_id(server_number))
            .await?;
        match item {
            Some(item) => Ok(Some(ServerStatus::from_item(&item)?)),
            None => Ok(None),
        }
    }

    /// Runs one heartbeat cycle and returns the resulting view.
    pub async fn cycle(&self) -> Result<RelaySnapshot, RelayError> {
        let now = self.clock.now();
        let shut_down = self.state.read().shut_down;
        if shut_down {
            return Ok(self.snapshot());
        }

        let partner = match self.read_server_status(self.partner_number()).await {
            Ok(partner) => partner,
            Err(RelayError::Corrupt(e)) => {
                warn!(error = %e, "Ignoring undecodable partner status");
                None
            }
            Err(e) => return Err(e),
        };

        let settings = self.config.get().relay.clone();
        let staleness_ms = settings.staleness_intervals * settings.heartbeat_interval_ms;

        let promoted = {
            let mut state = self.state.write();
            if let Some(partner) = &partner {
                if partner.relay_config > state.relay_config {
                    info!(
                        relay_mode = %partner.relay_config.relay_mode,
                        configured_primary = partner.relay_config.configured_primary,
                        mode_timestamp = partner.relay_config.mode_timestamp,
                        "Adopting partner relay configuration"
                    );
                    state.relay_config = partner.relay_config;
                }
            }

            let decision = self.decide(&state, partner.as_ref(), now, staleness_ms);
            let was_primary = state.primary_state == PrimaryState::Primary;
            if decision.primary_state != state.primary_state {
                info!(
                    from = %state.primary_state,
                    to = %decision.primary_state,
                    partner = %decision.inferred_state,
                    "Primary state changed"
                );
            }
            state.link_state = decision.link_state;
            state.primary_state = decision.primary_state;
            state.inferred_state = decision.inferred_state;
            state.partner = partner;
            state.last_cycle_time = now;
            !was_primary && decision.primary_state == PrimaryState::Primary
        };

        self.write_status(now).await?;
        let snapshot = self.snapshot();
        metrics::record_relay_cycle(snapshot.is_primary());
        debug!(
            link_state = %snapshot.link_state,
            primary_state = %snapshot.primary_state,
            inferred_state = %snapshot.inferred_state,
            "Relay cycle complete"
        );

        if promoted {
            let listeners = self.listeners.lock().clone();
            for listener in listeners {
                listener.on_promotion(now).await;
            }
        }
        Ok(snapshot)
    }

    fn decide(
        &self,
        state: &EngineState,
        partner: Option<&ServerStatus>,
        now: i64,
        staleness_ms: i64,
    ) -> Decision {
        let config = state.relay_config;
        let configured = config.is_configured_primary(self.server_number);
        let by_configuration = if configured {
            PrimaryState::Primary
        } else {
            PrimaryState::Secondary
        };

        let alive = partner.filter(|p| p.is_alive(now, staleness_ms));
        let inferred_state = match (partner, alive) {
            (None, _) => InferredState::None,
            (Some(_), None) => InferredState::Dead,
            (Some(_), Some(p)) => match p.primary_state {
                PrimaryState::Primary => InferredState::Primary,
                PrimaryState::Secondary => InferredState::Secondary,
                _ => InferredState::Alive,
            },
        };

        if config.relay_mode == RelayMode::Solo {
            return Decision {
                link_state: LinkState::Solo,
                primary_state: by_configuration,
                inferred_state,
            };
        }

        match alive {
            Some(partner) => {
                let connectable = partner.protocol_version == PROTOCOL_VERSION
                    && partner.link_state != LinkState::Solo
                    && partner.relay_config.relay_mode == RelayMode::Dual;
                Decision {
                    link_state: if connectable {
                        LinkState::Connected
                    } else {
                        LinkState::Connecting
                    },
                    primary_state: by_configuration,
                    inferred_state,
                }
            }
            None => {
                let primary_state = if configured {
                    PrimaryState::Primary
                } else {
                    match state.primary_state {
                        PrimaryState::Contending | PrimaryState::Primary => PrimaryState::Primary,
                        _ => PrimaryState::Contending,
                    }
                };
                Decision {
                    link_state: LinkState::Connecting,
                    primary_state,
                    inferred_state,
                }
            }
        }
    }

    async fn write_status(&self, now: i64) -> Result<(), RelayError> {
        let item = self.own_status(now).to_item()?;
        if let RelayWrite::Superseded { stored_time } = self.relay_store.put_relay_item(item).await? {
            warn!(stored_time, now, "Own relay status is newer than this heartbeat");
        }
        Ok(())
    }

    /// Stops negotiating and writes a final status so the partner sees the
    /// shutdown without waiting for the heartbeat to go stale.
    pub async fn shutdown(&self) -> Result<(), RelayError> {
        let now = self.clock.now();
        {
            let mut state = self.state.write();
            if state.shut_down {
                return Ok(());
            }
            state.shut_down = true;
            state.link_state = LinkState::Shutdown;
            state.primary_state = PrimaryState::Shutdown;
        }
        self.write_status(now).await?;
        info!("Relay shut down");
        Ok(())
    }

    // ------------------------------------------------------- event topics

    pub async fn pdl_completion(&self, event_id: &str) -> Result<Option<PdlCompletion>, RelayError> {
        let item = self
            .relay_store
            .get_relay_item(RelayTopic::PdlCompletion, event_id)
            .await?;
        Ok(match item {
            Some(item) => Some(decode_item(&item)?),
            None => None,
        })
    }

    /// Records that this server sent the forecast at `lag`. An existing
    /// record for a later lag is left in place.
    pub async fn record_pdl_completion(
        &self,
        event_id: &str,
        lag: i64,
        product_code: Option<String>,
    ) -> Result<(), RelayError> {
        if let Some(existing) = self.pdl_completion(event_id).await? {
            if existing.lag > lag {
                return Ok(());
            }
        }
        let completion = PdlCompletion {
            lag,
            product_code,
            server_number: self.server_number,
        };
        self.put_event_item(RelayTopic::PdlCompletion, event_id, self.clock.now(), &completion)
            .await
    }

    pub async fn foreign_product(&self, event_id: &str) -> Result<Option<ForeignProduct>, RelayError> {
        let item = self
            .relay_store
            .get_relay_item(RelayTopic::ForeignProduct, event_id)
            .await?;
        Ok(match item {
            Some(item) => Some(decode_item(&item)?),
            None => None,
        })
    }

    pub async fn record_foreign_product(
        &self,
        event_id: &str,
        product: &ForeignProduct,
    ) -> Result<(), RelayError> {
        self.put_event_item(RelayTopic::ForeignProduct, event_id, product.product_time, product)
            .await
    }

    /// Shares analyst options with the partner.
    pub async fn publish_analyst_selection(
        &self,
        event_id: &str,
        options: &AnalystOptions,
    ) -> Result<(), RelayError> {
        let selection = AnalystSelection {
            options: options.clone(),
            server_number: self.server_number,
        };
        self.put_event_item(RelayTopic::AnalystSelection, event_id, options.option_time, &selection)
            .await
    }

    async fn put_event_item<T: serde::Serialize + Sync>(
        &self,
        topic: RelayTopic,
        event_id: &str,
        relay_time: i64,
        content: &T,
    ) -> Result<(), RelayError> {
        let item = encode_item(topic, event_id, relay_time, content)?;
        if let RelayWrite::Superseded { stored_time } = self.relay_store.put_relay_item(item).await? {
            debug!(%topic, event_id, stored_time, relay_time, "Relay item superseded");
        }
        Ok(())
    }

    pub async fn delete_items_before(&self, topic: RelayTopic, time: i64) -> Result<usize, RelayError> {
        Ok(self.relay_store.delete_relay_items_before(topic, time).await?)
    }

    /// Submits a local analyst-selection task for every partner-authored
    /// selection not yet imported. Returns the number submitted.
    pub async fn import_analyst_selections(
        &self,
        dispatch: &DispatchHandle,
    ) -> Result<usize, RelayError> {
        let watermark = self.state.read().selection_watermark;
        let items = self
            .relay_store
            .query_relay_items(RelayTopic::AnalystSelection, watermark, i64::MAX)
            .await?;

        let mut submitted = 0;
        for item in items {
            let already_seen = item.relay_time == watermark
                && self.state.read().selections_at_watermark.contains(&item.relay_id);
            if already_seen {
                continue;
            }
            self.advance_watermark(item.relay_time, &item.relay_id);

            let selection: AnalystSelection = match decode_item(&item) {
                Ok(selection) => selection,
                Err(e) => {
                    warn!(error = %e, "Skipping undecodable analyst selection");
                    continue;
                }
            };
            if selection.server_number == self.server_number {
                continue;
            }
            let payload = Payload::AnalystSelection(AnalystRequest {
                options: selection.options,
            });
            match dispatch.submit(&item.relay_id, self.clock.now(), &payload).await {
                Ok(_) => submitted += 1,
                Err(e) => {
                    warn!(event_id = %item.relay_id, error = %e, "Could not submit analyst selection");
                }
            }
        }
        if submitted > 0 {
            info!(submitted, "Imported partner analyst selections");
        }
        Ok(submitted)
    }

    fn advance_watermark(&self, relay_time: i64, relay_id: &str) {
        let mut state = self.state.write();
        if relay_time > state.selection_watermark {
            state.selection_watermark = relay_time;
            state.selections_at_watermark.clear();
        }
        if relay_time == state.selection_watermark {
            state.selections_at_watermark.insert(relay_id.to_string());
        }
    }
}
