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

//! Handler result codes.
//!
//! The three families are the whole contract between a handler and the
//! dispatcher:
//!
//! - **normal**: the task is deleted and a log entry is written
//! - **delete**: the task is deleted silently
//! - **stage**: the handler restaged the task; it is persisted as modified

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultFamily {
    Normal,
    Delete,
    Stage,
}

impl ResultFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultFamily::Normal => "normal",
            ResultFamily::Delete => "delete",
            ResultFamily::Stage => "stage",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultCode {
    // Normal family
    Success,
    SkippedStale,
    SkippedIntake,
    SkippedAnalyst,
    SkippedShadowed,
    SkippedForeshock,
    SkippedCatalog,
    Withdrawn,
    Expired,
    Stopped,
    /// The command's expected timeline state no longer matches.
    TimelineMismatch,
    NoTimeline,
    AlreadyExists,
    Corrupt,
    PublishFailure,
    Quarantined,
    /// Unretryable failure such as a configuration violation.
    Fatal,
    Shutdown,

    // Delete family
    Delete,
    DeleteFiltered,
    DeleteNoop,
    DeleteCancelled,

    // Stage family
    Stage,
    StageCatalogRetry,
    StagePublishRetry,
    StageRepeat,
}

impl ResultCode {
    pub fn family(&self) -> ResultFamily {
        match self {
            ResultCode::Delete
            | ResultCode::DeleteFiltered
            | ResultCode::DeleteNoop
            | ResultCode::DeleteCancelled => ResultFamily::Delete,
            ResultCode::Stage
            | ResultCode::StageCatalogRetry
            | ResultCode::StagePublishRetry
            | ResultCode::StageRepeat => ResultFamily::Stage,
            _ => ResultFamily::Normal,
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            ResultCode::Success => 1,
            ResultCode::SkippedStale => 2,
            ResultCode::SkippedIntake => 3,
            ResultCode::SkippedAnalyst => 4,
            ResultCode::SkippedShadowed => 5,
            ResultCode::SkippedForeshock => 6,
            ResultCode::SkippedCatalog => 7,
            ResultCode::Withdrawn => 8,
            ResultCode::Expired => 9,
            ResultCode::Stopped => 10,
            ResultCode::TimelineMismatch => 11,
            ResultCode::NoTimeline => 12,
            ResultCode::AlreadyExists => 13,
            ResultCode::Corrupt => 14,
            ResultCode::PublishFailure => 15,
            ResultCode::Quarantined => 16,
            ResultCode::Fatal => 17,
            ResultCode::Shutdown => 18,
            ResultCode::Delete => 101,
            ResultCode::DeleteFiltered => 102,
            ResultCode::DeleteNoop => 103,
            ResultCode::DeleteCancelled => 104,
            ResultCode::Stage => 201,
            ResultCode::StageCatalogRetry => 202,
            ResultCode::StagePublishRetry => 203,
            ResultCode::StageRepeat => 204,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            1 => ResultCode::Success,
            2 => ResultCode::SkippedStale,
            3 => ResultCode::SkippedIntake,
            4 => ResultCode::SkippedAnalyst,
            5 => ResultCode::SkippedShadowed,
            6 => ResultCode::SkippedForeshock,
            7 => ResultCode::SkippedCatalog,
            8 => ResultCode::Withdrawn,
            9 => ResultCode::Expired,
            10 => ResultCode::Stopped,
            11 => ResultCode::TimelineMismatch,
            12 => ResultCode::NoTimeline,
            13 => ResultCode::AlreadyExists,
            14 => ResultCode::Corrupt,
            15 => ResultCode::PublishFailure,
            16 => ResultCode::Quarantined,
            17 => ResultCode::Fatal,
            18 => ResultCode::Shutdown,
            101 => ResultCode::Delete,
            102 => ResultCode::DeleteFiltered,
            103 => ResultCode::DeleteNoop,
            104 => ResultCode::DeleteCancelled,
            201 => ResultCode::Stage,
            202 => ResultCode::StageCatalogRetry,
            203 => ResultCode::StagePublishRetry,
            204 => ResultCode::StageRepeat,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResultCode::Success => "success",
            ResultCode::SkippedStale => "skipped_stale",
            ResultCode::SkippedIntake => "skipped_intake",
            ResultCode::SkippedAnalyst => "skipped_analyst",
            ResultCode::SkippedShadowed => "skipped_shadowed",
            ResultCode::SkippedForeshock => "skipped_foreshock",
            ResultCode::SkippedCatalog => "skipped_catalog",
            ResultCode::Withdrawn => "withdrawn",
            ResultCode::Expired => "expired",
            ResultCode::Stopped => "stopped",
            ResultCode::TimelineMismatch => "timeline_mismatch",
            ResultCode::NoTimeline => "no_timeline",
            ResultCode::AlreadyExists => "already_exists",
            ResultCode::Corrupt => "corrupt",
            ResultCode::PublishFailure => "publish_failure",
            ResultCode::Quarantined => "quarantined",
            ResultCode::Fatal => "fatal",
            ResultCode::Shutdown => "shutdown",
            ResultCode::Delete => "delete",
            ResultCode::DeleteFiltered => "delete_filtered",
            ResultCode::DeleteNoop => "delete_noop",
            ResultCode::DeleteCancelled => "delete_cancelled",
            ResultCode::Stage => "stage",
            ResultCode::StageCatalogRetry => "stage_catalog_retry",
            ResultCode::StagePublishRetry => "stage_publish_retry",
            ResultCode::StageRepeat => "stage_repeat",
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
