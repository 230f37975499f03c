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

//! Reading and appending event timelines.

use std::sync::Arc;
use tracing::{debug, info};

use super::delta::{fold, TimelineDelta};
use super::schedule::{next_scheduled_action, ScheduledAction};
use super::status::TimelineStatus;
use crate::clock::Clock;
use crate::config::AftercastConfig;
use crate::database::RecordStore;
use crate::dispatcher::DispatchHandle;
use crate::error::{DispatchError, TimelineError};
use crate::metrics;
use crate::models::{NewTimelineEntry, TaskId, TimelineAction};

/// A timeline as last read: its folded status and the sequence number of
/// its latest entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    pub status: TimelineStatus,
    pub sequence_no: i64,
}

impl Timeline {
    pub fn event_id(&self) -> &str {
        &self.status.event_id
    }
}

#[derive(Clone)]
pub struct TimelineManager {
    store: Arc<dyn RecordStore>,
    clock: Clock,
}

impl TimelineManager {
    pub fn new(store: Arc<dyn RecordStore>, clock: Clock) -> Self {
        Self { store, clock }
    }

    /// Folds the stored entries, or `None` when the event has no timeline.
    pub async fn open(&self, event_id: &str) -> Result<Option<Timeline>, TimelineError> {
        let entries = self.store.timeline_entries(event_id).await?;
        if entries.is_empty() {
            return Ok(None);
        }
        let status = fold(event_id, &entries)?;
        Ok(Some(Timeline {
            sequence_no: status.last_forecast_stamp,
            status,
        }))
    }

    /// Writes the first entry of a new timeline.
    ///
    /// Fails with a version conflict if the event already has one.
    pub async fn create(
        &self,
        status: TimelineStatus,
        action: TimelineAction,
    ) -> Result<Timeline, TimelineError> {
        let empty = Timeline {
            status: TimelineStatus::empty(status.event_id.clone()),
            sequence_no: 0,
        };
        self.append(&empty, status, action).await
    }

    /// Appends the change from `timeline.status` to `new_status`.
    ///
    /// The append only succeeds if no entry was written since `timeline` was
    /// read. The returned status has `action_time` set to now and
    /// `last_forecast_stamp` set to the new entry's sequence number.
    pub async fn append(
        &self,
        timeline: &Timeline,
        mut new_status: TimelineStatus,
        action: TimelineAction,
    ) -> Result<Timeline, TimelineError> {
        let now = self.clock.now();
        new_status.event_id = timeline.status.event_id.clone();
        new_status.action_time = now;
        let delta = TimelineDelta::between(&timeline.status, &new_status);
        let entry = self
            .store
            .append_timeline_entry(
                NewTimelineEntry {
                    event_id: new_status.event_id.clone(),
                    action_code: action.code(),
                    action_time: now,
                    payload: delta.encode()?,
                },
                timeline.sequence_no,
            )
            .await?;
        new_status.last_forecast_stamp = entry.sequence_no;
        metrics::record_timeline_append(action.as_str());
        debug!(
            event_id = %new_status.event_id,
            sequence_no = entry.sequence_no,
            action = action.as_str(),
            forecast_status = %new_status.forecast_status,
            publish_status = %new_status.publish_status,
            "Timeline entry appended"
        );
        Ok(Timeline {
            status: new_status,
            sequence_no: entry.sequence_no,
        })
    }

    /// Refolds the event and rewrites it as one snapshot entry.
    ///
    /// The rebuilt status equals the folded one except that the stamp
    /// becomes 1, so pending commands for the event become stale.
    pub async fn rebuild(&self, event_id: &str) -> Result<Timeline, TimelineError> {
        let entries = self.store.timeline_entries(event_id).await?;
        if entries.is_empty() {
            return Err(TimelineError::Missing(event_id.to_string()));
        }
        let mut status = fold(event_id, &entries)?;
        let delta = TimelineDelta::snapshot(&status);
        let payload = delta.encode()?;
        let written = self
            .store
            .replace_timeline(
                event_id,
                vec![NewTimelineEntry {
                    event_id: event_id.to_string(),
                    action_code: TimelineAction::Rebuild.code(),
                    action_time: status.action_time,
                    payload,
                }],
            )
            .await?;
        let sequence_no = written.last().map(|e| e.sequence_no).unwrap_or(1);
        status.last_forecast_stamp = sequence_no;
        metrics::record_timeline_append(TimelineAction::Rebuild.as_str());
        info!(event_id, compacted = entries.len(), "Timeline rebuilt");
        Ok(Timeline {
            status,
            sequence_no,
        })
    }

    /// Replaces the event's pending timeline commands with the next
    /// scheduled one. `keep` is the task currently running, if any.
    pub async fn resubmit_next(
        &self,
        dispatch: &DispatchHandle,
        status: &TimelineStatus,
        config: &AftercastConfig,
        keep: Option<TaskId>,
    ) -> Result<Option<TaskId>, DispatchError> {
        dispatch
            .delete_timeline_commands(&status.event_id, keep)
            .await?;
        match next_scheduled_action(status, config, self.clock.now()) {
            Some(action) => self.submit(dispatch, &status.event_id, action).await.map(Some),
            None => {
                debug!(event_id = %status.event_id, "Timeline has no further action");
                Ok(None)
            }
        }
    }

    pub async fn submit(
        &self,
        dispatch: &DispatchHandle,
        event_id: &str,
        action: ScheduledAction,
    ) -> Result<TaskId, DispatchError> {
        debug!(
            event_id,
            opcode = %action.opcode,
            exec_time = action.exec_time,
            "Scheduling next timeline action"
        );
        dispatch.submit(event_id, action.exec_time, &action.payload).await
    }
}
