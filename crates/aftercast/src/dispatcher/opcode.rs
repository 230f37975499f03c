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

//! Task opcodes.
//!
//! The opcode selects the handler a task invokes. Codes are persisted, so
//! they are explicit and must never be renumbered. They are also dense,
//! which lets the handler table index by code directly.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(i32)]
pub enum Opcode {
    NoOp = 0,
    Shutdown = 1,
    ConsoleMessage = 2,
    GenForecast = 3,
    GenReport = 4,
    GenExpire = 5,
    IntakeSync = 6,
    IntakePoll = 7,
    IntakePdl = 8,
    AnalystIntervene = 9,
    AliasSplit = 10,
    AliasStop = 11,
    AliasRevive = 12,
    PollStart = 13,
    PollStop = 14,
    PollRun = 15,
    CleanupStart = 16,
    CleanupStop = 17,
    CleanupRun = 18,
    SetRelayMode = 19,
    AnalystSelection = 20,
    HealthMonitorReset = 21,
    HealthMonitorStart = 22,
    HealthMonitorStop = 23,
}

impl Opcode {
    pub const COUNT: usize = 24;

    pub const ALL: [Opcode; Opcode::COUNT] = [
        Opcode::NoOp,
        Opcode::Shutdown,
        Opcode::ConsoleMessage,
        Opcode::GenForecast,
        Opcode::GenReport,
        Opcode::GenExpire,
        Opcode::IntakeSync,
        Opcode::IntakePoll,
        Opcode::IntakePdl,
        Opcode::AnalystIntervene,
        Opcode::AliasSplit,
        Opcode::AliasStop,
        Opcode::AliasRevive,
        Opcode::PollStart,
        Opcode::PollStop,
        Opcode::PollRun,
        Opcode::CleanupStart,
        Opcode::CleanupStop,
        Opcode::CleanupRun,
        Opcode::SetRelayMode,
        Opcode::AnalystSelection,
        Opcode::HealthMonitorReset,
        Opcode::HealthMonitorStart,
        Opcode::HealthMonitorStop,
    ];

    pub fn code(self) -> i32 {
        self as i32
    }

    /// Position in the handler table.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_code(code: i32) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
    }

    /// Opcodes that carry an expected timeline state and must be checked
    /// against the current timeline before mutating it.
    pub fn is_timeline_command(self) -> bool {
        matches!(
            self,
            Opcode::GenForecast | Opcode::GenReport | Opcode::GenExpire
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Opcode::NoOp => "no_op",
            Opcode::Shutdown => "shutdown",
            Opcode::ConsoleMessage => "console_message",
            Opcode::GenForecast => "gen_forecast",
            Opcode::GenReport => "gen_report",
            Opcode::GenExpire => "gen_expire",
            Opcode::IntakeSync => "intake_sync",
            Opcode::IntakePoll => "intake_poll",
            Opcode::IntakePdl => "intake_pdl",
            Opcode::AnalystIntervene => "analyst_intervene",
            Opcode::AliasSplit => "alias_split",
            Opcode::AliasStop => "alias_stop",
            Opcode::AliasRevive => "alias_revive",
            Opcode::PollStart => "poll_start",
            Opcode::PollStop => "poll_stop",
            Opcode::PollRun => "poll_run",
            Opcode::CleanupStart => "cleanup_start",
            Opcode::CleanupStop => "cleanup_stop",
            Opcode::CleanupRun => "cleanup_run",
            Opcode::SetRelayMode => "set_relay_mode",
            Opcode::AnalystSelection => "analyst_selection",
            Opcode::HealthMonitorReset => "health_monitor_reset",
            Opcode::HealthMonitorStart => "health_monitor_start",
            Opcode::HealthMonitorStop => "health_monitor_stop",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Opcode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.replace('-', "_");
        Opcode::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == wanted)
            .ok_or_else(|| format!("unknown opcode '{}'", s))
    }
}
