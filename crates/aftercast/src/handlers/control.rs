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

//! Handlers for control opcodes that do not act on an event.

use async_trait::async_trait;
use tracing::{error, info};

use crate::dispatcher::{HandlerContext, Payload, RelayModeRequest, ResultCode, TaskHandler};
use crate::error::HandlerError;
use crate::models::ClaimedRecord;

/// `no_op`, `shutdown` and `console_message`.
pub struct GeneralHandler;

#[async_trait]
impl TaskHandler for GeneralHandler {
    async fn execute(
        &self,
        _ctx: &HandlerContext,
        _claimed: &mut ClaimedRecord,
        payload: Payload,
    ) -> Result<ResultCode, HandlerError> {
        match payload {
            Payload::NoOp => Ok(ResultCode::Success),
            Payload::Shutdown => {
                info!("Shutdown requested");
                Ok(ResultCode::Shutdown)
            }
            Payload::ConsoleMessage(msg) => {
                info!(message = %msg.message, "Console message");
                Ok(ResultCode::Success)
            }
            other => Err(unexpected(&other)),
        }
    }
}

/// `set_relay_mode`.
pub struct RelayModeHandler;

#[async_trait]
impl TaskHandler for RelayModeHandler {
    async fn execute(
        &self,
        ctx: &HandlerContext,
        _claimed: &mut ClaimedRecord,
        payload: Payload,
    ) -> Result<ResultCode, HandlerError> {
        let Payload::SetRelayMode(RelayModeRequest {
            relay_mode,
            configured_primary,
        }) = payload
        else {
            return Err(unexpected(&payload));
        };
        if !(1..=2).contains(&configured_primary) {
            error!(configured_primary, "Configured primary must be server 1 or 2");
            return Ok(ResultCode::Fatal);
        }
        ctx.relay
            .set_relay_mode(relay_mode, configured_primary, ctx.clock.now());
        Ok(ResultCode::Success)
    }
}

/// `health_monitor_reset`, `health_monitor_start` and `health_monitor_stop`.
pub struct HealthHandler;

#[async_trait]
impl TaskHandler for HealthHandler {
    async fn execute(
        &self,
        ctx: &HandlerContext,
        _claimed: &mut ClaimedRecord,
        payload: Payload,
    ) -> Result<ResultCode, HandlerError> {
        match payload {
            Payload::HealthMonitorReset => ctx.health.reset(),
            Payload::HealthMonitorStart => ctx.health.start(),
            Payload::HealthMonitorStop => ctx.health.stop(),
            other => return Err(unexpected(&other)),
        }
        Ok(ResultCode::Success)
    }
}

/// A payload routed to a handler that does not serve its opcode.
pub(crate) fn unexpected(payload: &Payload) -> HandlerError {
    HandlerError::Fault(format!(
        "handler registered for the wrong opcode: {}",
        payload.opcode()
    ))
}
