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

//! Timeline storage: guarded appends, rebuilds and alias changes.

use aftercast::clock::{HOUR_MILLIS, MINUTE_MILLIS};
use aftercast::database::RecordStore;
use aftercast::dispatcher::{
    AliasSplitRequest, AliasStopRequest, DispatchOutcome, Opcode, Payload, ResultCode,
};
use aftercast::error::{StoreError, TimelineError};
use aftercast::models::TimelineAction;
use aftercast::timeline::ForecastStatus;

use crate::fixtures::{mainshock, Harness, EVENT_ID, ORIGIN};

fn codes(outcomes: &[DispatchOutcome]) -> Vec<ResultCode> {
    outcomes.iter().filter_map(|o| o.result_code()).collect()
}

#[tokio::test]
async fn test_concurrent_append_loses() {
    let harness = Harness::new();
    let server = harness.solo().await;
    server.submit_intake(EVENT_ID).await;
    server.run_due().await;

    let timelines = &server.ctx().timelines;
    let first = timelines.open(EVENT_ID).await.unwrap().unwrap();
    let second = timelines.open(EVENT_ID).await.unwrap().unwrap();

    let mut status = first.status.clone();
    status.aliases.push("ci0001".to_string());
    let written = timelines
        .append(&first, status, TimelineAction::Intake)
        .await
        .unwrap();
    assert_eq!(written.sequence_no, 2);
    assert_eq!(written.status.last_forecast_stamp, 2);

    let mut status = second.status.clone();
    status.aliases.push("ci0002".to_string());
    let err = timelines
        .append(&second, status, TimelineAction::Intake)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TimelineError::Store(StoreError::VersionConflict { .. })
    ));

    let reopened = timelines.open(EVENT_ID).await.unwrap().unwrap();
    assert_eq!(reopened.status.aliases, vec!["ci0001".to_string()]);
}

#[tokio::test]
async fn test_rebuild_compacts_and_invalidates_pending_commands() {
    let harness = Harness::new();
    let server = harness.solo().await;
    server.submit_intake(EVENT_ID).await;
    server.run_due().await;
    harness.at(HOUR_MILLIS);
    server.run_due().await;

    let before = server.timeline(EVENT_ID).await.unwrap();
    assert_eq!(before.sequence_no, 2);

    let rebuilt = server.ctx().timelines.rebuild(EVENT_ID).await.unwrap();
    assert_eq!(rebuilt.sequence_no, 1);
    assert_eq!(server.store.timeline_entries(EVENT_ID).await.unwrap().len(), 1);

    let after = server.timeline(EVENT_ID).await.unwrap();
    assert_eq!(after.status.last_forecast_stamp, 1);
    assert_eq!(after.status.last_forecast_lag, before.status.last_forecast_lag);
    assert_eq!(after.status.next_forecast_lag, before.status.next_forecast_lag);
    assert_eq!(after.status.last_product, before.status.last_product);
    assert_eq!(after.status.forecast_status, before.status.forecast_status);

    // The queued 2h command was built against the old stamp.
    harness.at(2 * HOUR_MILLIS);
    assert_eq!(
        codes(&server.run_due().await),
        vec![ResultCode::TimelineMismatch, ResultCode::Success]
    );
    let lags: Vec<i64> = server.model.runs().into_iter().map(|(_, lag)| lag).collect();
    assert_eq!(lags, vec![HOUR_MILLIS, 2 * HOUR_MILLIS]);
}

#[tokio::test]
async fn test_rebuild_of_unknown_event_fails() {
    let harness = Harness::new();
    let server = harness.solo().await;
    let err = server.ctx().timelines.rebuild("nope").await.unwrap_err();
    assert!(matches!(err, TimelineError::Missing(id) if id == "nope"));
}

#[tokio::test]
async fn test_alias_stop_and_revive() {
    let harness = Harness::new();
    let server = harness.solo().await;
    server.submit_intake(EVENT_ID).await;
    server.run_due().await;

    let handle = server.server.handle();
    handle
        .submit(
            EVENT_ID,
            harness.clock.now(),
            &Payload::AliasStop(AliasStopRequest {
                reason: "merged into another event".to_string(),
            }),
        )
        .await
        .unwrap();
    assert_eq!(codes(&server.run_due().await), vec![ResultCode::Stopped]);
    let timeline = server.timeline(EVENT_ID).await.unwrap();
    assert_eq!(timeline.status.forecast_status, ForecastStatus::Stopped);
    assert!(server.event_tasks(EVENT_ID).await.is_empty());

    // Stopping twice changes nothing.
    handle
        .submit(
            EVENT_ID,
            harness.clock.now(),
            &Payload::AliasStop(AliasStopRequest {
                reason: String::new(),
            }),
        )
        .await
        .unwrap();
    assert_eq!(codes(&server.run_due().await), vec![ResultCode::DeleteNoop]);

    harness.at(40 * MINUTE_MILLIS);
    handle
        .submit(EVENT_ID, harness.clock.now(), &Payload::AliasRevive)
        .await
        .unwrap();
    assert_eq!(codes(&server.run_due().await), vec![ResultCode::Success]);
    let timeline = server.timeline(EVENT_ID).await.unwrap();
    assert_eq!(timeline.status.forecast_status, ForecastStatus::Active);
    assert_eq!(timeline.status.next_forecast_lag, HOUR_MILLIS);

    let tasks = server.event_tasks(EVENT_ID).await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].opcode, Opcode::GenForecast);
    assert_eq!(tasks[0].exec_time, ORIGIN + HOUR_MILLIS);
}

#[tokio::test]
async fn test_alias_split_starts_separate_timeline() {
    let harness = Harness::new();
    let server = harness.solo().await;
    server.submit_intake(EVENT_ID).await;
    server.run_due().await;

    harness
        .catalog
        .add_alias("ci38457511", mainshock(EVENT_ID, ORIGIN, 6.4));
    server.submit_intake("ci38457511").await;
    server.run_due().await;

    // The catalog now reports the alias as an event of its own.
    harness
        .catalog
        .add_event(mainshock("ci38457511", ORIGIN + 5 * MINUTE_MILLIS, 5.1));
    server
        .server
        .handle()
        .submit(
            EVENT_ID,
            harness.clock.now(),
            &Payload::AliasSplit(AliasSplitRequest {
                new_event_id: "ci38457511".to_string(),
            }),
        )
        .await
        .unwrap();
    assert_eq!(
        codes(&server.run_due().await),
        vec![ResultCode::Success, ResultCode::Success]
    );

    let original = server.timeline(EVENT_ID).await.unwrap();
    assert!(original.status.aliases.is_empty());
    let split = server.timeline("ci38457511").await.unwrap();
    assert_eq!(split.status.forecast_status, ForecastStatus::Intake);
    assert_eq!(server.event_tasks(EVENT_ID).await.len(), 1);
    assert_eq!(server.event_tasks("ci38457511").await.len(), 1);
}
