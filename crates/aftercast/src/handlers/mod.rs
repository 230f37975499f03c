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

//! Task handlers for every opcode.

pub mod alias;
pub mod analyst;
pub mod control;
pub mod expire;
pub mod forecast;
pub mod intake;
pub mod jobs;
pub mod publish;
mod support;

use std::sync::Arc;

use crate::dispatcher::{HandlerTable, Opcode};

pub use alias::AliasHandler;
pub use analyst::AnalystHandler;
pub use control::{GeneralHandler, HealthHandler, RelayModeHandler};
pub use expire::ExpireHandler;
pub use forecast::ForecastHandler;
pub use intake::IntakeHandler;
pub use jobs::{CleanupHandler, PollHandler};
pub use publish::ReportHandler;

/// A handler table with every opcode registered.
pub fn default_handler_table() -> HandlerTable {
    let general = Arc::new(GeneralHandler);
    let intake = Arc::new(IntakeHandler);
    let analyst = Arc::new(AnalystHandler);
    let alias = Arc::new(AliasHandler);
    let poll = Arc::new(PollHandler);
    let cleanup = Arc::new(CleanupHandler);
    let health = Arc::new(HealthHandler);

    let mut table = HandlerTable::new();
    table
        .register(Opcode::NoOp, general.clone())
        .register(Opcode::Shutdown, general.clone())
        .register(Opcode::ConsoleMessage, general)
        .register(Opcode::GenForecast, Arc::new(ForecastHandler))
        .register(Opcode::GenReport, Arc::new(ReportHandler))
        .register(Opcode::GenExpire, Arc::new(ExpireHandler))
        .register(Opcode::IntakeSync, intake.clone())
        .register(Opcode::IntakePoll, intake.clone())
        .register(Opcode::IntakePdl, intake)
        .register(Opcode::AnalystIntervene, analyst.clone())
        .register(Opcode::AnalystSelection, analyst)
        .register(Opcode::AliasSplit, alias.clone())
        .register(Opcode::AliasStop, alias.clone())
        .register(Opcode::AliasRevive, alias)
        .register(Opcode::PollStart, poll.clone())
        .register(Opcode::PollStop, poll.clone())
        .register(Opcode::PollRun, poll)
        .register(Opcode::CleanupStart, cleanup.clone())
        .register(Opcode::CleanupStop, cleanup.clone())
        .register(Opcode::CleanupRun, cleanup)
        .register(Opcode::SetRelayMode, Arc::new(RelayModeHandler))
        .register(Opcode::HealthMonitorReset, health.clone())
        .register(Opcode::HealthMonitorStart, health.clone())
        .register(Opcode::HealthMonitorStop, health);
    table
}
