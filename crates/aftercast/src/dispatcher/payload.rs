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

//! Opcode payloads.
//!
//! Every task stores its payload as JSON tagged with the opcode name, so a
//! payload can always be checked against the opcode of the row it came from.

use serde::{Deserialize, Serialize};

use super::opcode::Opcode;
use crate::error::CorruptRecord;
use crate::models::RecordKind;
use crate::relay::RelayMode;
use crate::timeline::{AnalystOptions, TimelineExpectation};

pub const CONSOLE_EVENT_ID: &str = "==console==";
pub const SHUTDOWN_EVENT_ID: &str = "==shutdown==";
pub const POLL_EVENT_ID: &str = "==poll==";
pub const CLEANUP_EVENT_ID: &str = "==cleanup==";
pub const RELAY_EVENT_ID: &str = "==relay==";
pub const HEALTH_EVENT_ID: &str = "==health==";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleMessage {
    pub message: String,
}

/// Generate the forecast due at `lag`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastCommand {
    pub expected: TimelineExpectation,
    pub lag: i64,
}

/// Retry publishing the forecast generated at `lag`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportCommand {
    pub expected: TimelineExpectation,
    pub lag: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpireCommand {
    pub expected: TimelineExpectation,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntakeRequest {
    /// Options to apply when an analyst forced the intake.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyst_options: Option<AnalystOptions>,
}

/// Notice that another source published a product for the event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignProductNotice {
    pub source: String,
    pub product_time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalystRequest {
    pub options: AnalystOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AliasSplitRequest {
    pub new_event_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AliasStopRequest {
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayModeRequest {
    pub relay_mode: RelayMode,
    pub configured_primary: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    NoOp,
    Shutdown,
    ConsoleMessage(ConsoleMessage),
    GenForecast(ForecastCommand),
    GenReport(ReportCommand),
    GenExpire(ExpireCommand),
    IntakeSync(IntakeRequest),
    IntakePoll(IntakeRequest),
    IntakePdl(ForeignProductNotice),
    AnalystIntervene(AnalystRequest),
    AliasSplit(AliasSplitRequest),
    AliasStop(AliasStopRequest),
    AliasRevive,
    PollStart,
    PollStop,
    PollRun,
    CleanupStart,
    CleanupStop,
    CleanupRun,
    SetRelayMode(RelayModeRequest),
    AnalystSelection(AnalystRequest),
    HealthMonitorReset,
    HealthMonitorStart,
    HealthMonitorStop,
}

impl Payload {
    pub fn opcode(&self) -> Opcode {
        match self {
            Payload::NoOp => Opcode::NoOp,
            Payload::Shutdown => Opcode::Shutdown,
            Payload::ConsoleMessage(_) => Opcode::ConsoleMessage,
            Payload::GenForecast(_) => Opcode::GenForecast,
            Payload::GenReport(_) => Opcode::GenReport,
            Payload::GenExpire(_) => Opcode::GenExpire,
            Payload::IntakeSync(_) => Opcode::IntakeSync,
            Payload::IntakePoll(_) => Opcode::IntakePoll,
            Payload::IntakePdl(_) => Opcode::IntakePdl,
            Payload::AnalystIntervene(_) => Opcode::AnalystIntervene,
            Payload::AliasSplit(_) => Opcode::AliasSplit,
            Payload::AliasStop(_) => Opcode::AliasStop,
            Payload::AliasRevive => Opcode::AliasRevive,
            Payload::PollStart => Opcode::PollStart,
            Payload::PollStop => Opcode::PollStop,
            Payload::PollRun => Opcode::PollRun,
            Payload::CleanupStart => Opcode::CleanupStart,
            Payload::CleanupStop => Opcode::CleanupStop,
            Payload::CleanupRun => Opcode::CleanupRun,
            Payload::SetRelayMode(_) => Opcode::SetRelayMode,
            Payload::AnalystSelection(_) => Opcode::AnalystSelection,
            Payload::HealthMonitorReset => Opcode::HealthMonitorReset,
            Payload::HealthMonitorStart => Opcode::HealthMonitorStart,
            Payload::HealthMonitorStop => Opcode::HealthMonitorStop,
        }
    }

    /// The timeline state a timeline command expects, if this is one.
    pub fn expectation(&self) -> Option<&TimelineExpectation> {
        match self {
            Payload::GenForecast(cmd) => Some(&cmd.expected),
            Payload::GenReport(cmd) => Some(&cmd.expected),
            Payload::GenExpire(cmd) => Some(&cmd.expected),
            _ => None,
        }
    }

    /// The placeholder event id used by opcodes that do not act on an event.
    pub fn control_event_id(&self) -> Option<&'static str> {
        match self.opcode() {
            Opcode::NoOp | Opcode::ConsoleMessage => Some(CONSOLE_EVENT_ID),
            Opcode::Shutdown => Some(SHUTDOWN_EVENT_ID),
            Opcode::PollStart | Opcode::PollStop | Opcode::PollRun => Some(POLL_EVENT_ID),
            Opcode::CleanupStart | Opcode::CleanupStop | Opcode::CleanupRun => {
                Some(CLEANUP_EVENT_ID)
            }
            Opcode::SetRelayMode => Some(RELAY_EVENT_ID),
            Opcode::HealthMonitorReset | Opcode::HealthMonitorStart | Opcode::HealthMonitorStop => {
                Some(HEALTH_EVENT_ID)
            }
            _ => None,
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decodes a stored payload and checks that its tag matches `opcode`.
    pub fn decode(opcode: Opcode, key: &str, json: &str) -> Result<Self, CorruptRecord> {
        let payload: Payload = serde_json::from_str(json)
            .map_err(|e| CorruptRecord::new(RecordKind::Task, key, e))?;
        if payload.opcode() != opcode {
            return Err(CorruptRecord::new(
                RecordKind::Task,
                key,
                format!("payload for {} stored under opcode {}", payload.opcode(), opcode),
            ));
        }
        Ok(payload)
    }
}
