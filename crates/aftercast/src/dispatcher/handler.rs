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

//! Handler registration and the context handlers run in.

use async_trait::async_trait;
use std::sync::Arc;

use super::dispatcher::DispatchHandle;
use super::opcode::Opcode;
use super::payload::Payload;
use super::result_code::ResultCode;
use crate::clock::Clock;
use crate::config::ConfigHandle;
use crate::database::RecordStore;
use crate::error::HandlerError;
use crate::external::Services;
use crate::health::HealthMonitor;
use crate::models::ClaimedRecord;
use crate::relay::RelayEngine;
use crate::timeline::{RateLimiter, TimelineManager};

/// Everything a handler may touch.
#[derive(Clone)]
pub struct HandlerContext {
    pub config: ConfigHandle,
    pub clock: Clock,
    /// Local store holding tasks, timelines and logs.
    pub store: Arc<dyn RecordStore>,
    pub dispatch: DispatchHandle,
    pub timelines: TimelineManager,
    pub relay: Arc<RelayEngine>,
    pub services: Services,
    pub health: Arc<HealthMonitor>,
    pub rate_limiter: Arc<RateLimiter>,
}

/// Executes the tasks of one opcode.
///
/// The handler receives the claimed task, with `restarted` set when a
/// previous execution was interrupted, and the decoded payload. To restage
/// the task it modifies `claimed.task` and returns a stage-family code.
/// Errors are faults: the dispatcher keeps the task and retries it later.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn execute(
        &self,
        ctx: &HandlerContext,
        claimed: &mut ClaimedRecord,
        payload: Payload,
    ) -> Result<ResultCode, HandlerError>;
}

/// Handlers indexed by opcode.
#[derive(Clone)]
pub struct HandlerTable {
    handlers: Vec<Option<Arc<dyn TaskHandler>>>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self {
            handlers: vec![None; Opcode::COUNT],
        }
    }

    pub fn register(&mut self, opcode: Opcode, handler: Arc<dyn TaskHandler>) -> &mut Self {
        self.handlers[opcode.index()] = Some(handler);
        self
    }

    pub fn get(&self, opcode: Opcode) -> Option<&Arc<dyn TaskHandler>> {
        self.handlers
            .get(opcode.index())
            .and_then(|slot| slot.as_ref())
    }

    /// Opcodes without a handler.
    pub fn missing(&self) -> Vec<Opcode> {
        Opcode::ALL
            .iter()
            .copied()
            .filter(|op| self.get(*op).is_none())
            .collect()
    }
}

impl Default for HandlerTable {
    fn default() -> Self {
        Self::new()
    }
}
