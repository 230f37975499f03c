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

//! Catalog polling and cleanup jobs.

use aftercast::clock::{DAY_MILLIS, MINUTE_MILLIS};
use aftercast::database::{LogFilter, RecordStore};
use aftercast::dispatcher::{
    ConsoleMessage, DispatchOutcome, Opcode, Payload, ResultCode, POLL_EVENT_ID,
};
use aftercast::models::RelayTopic;

use crate::fixtures::{mainshock, Harness, EVENT_ID, ORIGIN};

fn code_for(outcomes: &[DispatchOutcome], opcode: Opcode) -> Vec<ResultCode> {
    outcomes
        .iter()
        .filter(|o| o.opcode == opcode)
        .filter_map(|o| o.result_code())
        .collect()
}

#[tokio::test]
async fn test_poll_takes_in_new_catalog_events() {
    let harness = Harness::new();
    let server = harness.solo().await;
    harness
        .catalog
        .add_event(mainshock("ci0002", ORIGIN + 5 * MINUTE_MILLIS, 4.8));
    let handle = server.server.handle();

    handle.submit_control(&Payload::PollStart).await.unwrap();
    let outcomes = server.run_due().await;
    assert_eq!(code_for(&outcomes, Opcode::PollStart), vec![ResultCode::Success]);
    assert_eq!(code_for(&outcomes, Opcode::PollRun), vec![ResultCode::StageRepeat]);
    assert_eq!(
        code_for(&outcomes, Opcode::IntakePoll),
        vec![ResultCode::Success, ResultCode::Success]
    );
    assert!(server.timeline(EVENT_ID).await.is_some());
    assert!(server.timeline("ci0002").await.is_some());

    let waiting = server.event_tasks(POLL_EVENT_ID).await;
    assert_eq!(waiting.len(), 1);
    assert_eq!(waiting[0].opcode, Opcode::PollRun);
    assert_eq!(waiting[0].exec_time, harness.clock.now() + 5 * MINUTE_MILLIS);

    // A second start finds the run already scheduled.
    handle.submit_control(&Payload::PollStart).await.unwrap();
    let outcomes = server.run_due().await;
    assert_eq!(code_for(&outcomes, Opcode::PollStart), vec![ResultCode::DeleteNoop]);

    // Known events are not submitted again.
    harness.clock.advance(5 * MINUTE_MILLIS);
    let outcomes = server.run_due().await;
    assert_eq!(code_for(&outcomes, Opcode::PollRun), vec![ResultCode::StageRepeat]);
    assert!(code_for(&outcomes, Opcode::IntakePoll).is_empty());
}

#[tokio::test]
async fn test_poll_stop_cancels_waiting_run() {
    let harness = Harness::new();
    let server = harness.solo().await;
    let handle = server.server.handle();
    handle.submit_control(&Payload::PollStart).await.unwrap();
    server.run_due().await;

    handle.submit_control(&Payload::PollStop).await.unwrap();
    let outcomes = server.run_due().await;
    assert_eq!(code_for(&outcomes, Opcode::PollStop), vec![ResultCode::Success]);
    assert_eq!(
        code_for(&outcomes, Opcode::PollRun),
        vec![ResultCode::DeleteCancelled]
    );
    assert!(server.event_tasks(POLL_EVENT_ID).await.is_empty());
}

#[tokio::test]
async fn test_cleanup_removes_old_logs_and_relay_items() {
    let harness = Harness::new();
    let server = harness.solo().await;
    let handle = server.server.handle();

    handle
        .submit_control(&Payload::ConsoleMessage(ConsoleMessage {
            message: "old".to_string(),
        }))
        .await
        .unwrap();
    server.run_due().await;
    server
        .ctx()
        .relay
        .record_pdl_completion(EVENT_ID, 0, None)
        .await
        .unwrap();

    harness.clock.advance(100 * DAY_MILLIS);
    handle
        .submit_control(&Payload::ConsoleMessage(ConsoleMessage {
            message: "recent".to_string(),
        }))
        .await
        .unwrap();
    server.run_due().await;

    handle.submit_control(&Payload::CleanupStart).await.unwrap();
    let outcomes = server.run_due().await;
    assert_eq!(
        code_for(&outcomes, Opcode::CleanupRun),
        vec![ResultCode::StageRepeat]
    );

    let logs = server
        .store
        .query_log_entries(&LogFilter::default())
        .await
        .unwrap();
    // The recent console message and the cleanup start survive.
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().all(|l| l.log_time >= harness.clock.now() - DAY_MILLIS));
    assert!(server.ctx().relay.pdl_completion(EVENT_ID).await.unwrap().is_none());

    // Server status is never cleaned up.
    let status = harness
        .relay_store
        .get_relay_item(RelayTopic::ServerStatus, "1")
        .await
        .unwrap();
    assert!(status.is_some());
}
