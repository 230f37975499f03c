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

//! Timeline Entry Model
//!
//! Timeline entries are append-only records. Each one carries the delta
//! produced by one action on the event; folding all entries of an event in
//! `sequence_no` order yields its current status.

use serde::{Deserialize, Serialize};

/// Append-only timeline record (domain type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub event_id: String,
    /// 1-based, contiguous per event.
    pub sequence_no: i64,
    /// Raw [`TimelineAction`] code.
    pub action_code: i32,
    pub action_time: i64,
    /// JSON-encoded delta.
    pub payload: String,
}

impl TimelineEntry {
    pub fn action(&self) -> Option<TimelineAction> {
        TimelineAction::from_code(self.action_code)
    }
}

/// Structure for appending a timeline entry (domain type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTimelineEntry {
    pub event_id: String,
    pub action_code: i32,
    pub action_time: i64,
    pub payload: String,
}

/// The action that produced a timeline entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimelineAction {
    Intake,
    Forecast,
    Publish,
    Expire,
    Withdraw,
    AnalystIntervene,
    AnalystSelection,
    AliasStop,
    AliasRevive,
    AliasSplit,
    /// Snapshot written by an administrative rebuild.
    Rebuild,
}

impl TimelineAction {
    pub fn code(&self) -> i32 {
        match self {
            TimelineAction::Intake => 1,
            TimelineAction::Forecast => 2,
            TimelineAction::Publish => 3,
            TimelineAction::Expire => 4,
            TimelineAction::Withdraw => 5,
            TimelineAction::AnalystIntervene => 6,
            TimelineAction::AnalystSelection => 7,
            TimelineAction::AliasStop => 8,
            TimelineAction::AliasRevive => 9,
            TimelineAction::AliasSplit => 10,
            TimelineAction::Rebuild => 99,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            1 => TimelineAction::Intake,
            2 => TimelineAction::Forecast,
            3 => TimelineAction::Publish,
            4 => TimelineAction::Expire,
            5 => TimelineAction::Withdraw,
            6 => TimelineAction::AnalystIntervene,
            7 => TimelineAction::AnalystSelection,
            8 => TimelineAction::AliasStop,
            9 => TimelineAction::AliasRevive,
            10 => TimelineAction::AliasSplit,
            99 => TimelineAction::Rebuild,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimelineAction::Intake => "intake",
            TimelineAction::Forecast => "forecast",
            TimelineAction::Publish => "publish",
            TimelineAction::Expire => "expire",
            TimelineAction::Withdraw => "withdraw",
            TimelineAction::AnalystIntervene => "analyst_intervene",
            TimelineAction::AnalystSelection => "analyst_selection",
            TimelineAction::AliasStop => "alias_stop",
            TimelineAction::AliasRevive => "alias_revive",
            TimelineAction::AliasSplit => "alias_split",
            TimelineAction::Rebuild => "rebuild",
        }
    }
}
