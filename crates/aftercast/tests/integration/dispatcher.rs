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

use aftercast::clock::{HOUR_MILLIS, MINUTE_MILLIS};
use aftercast::database::{LogFilter, RecordStore};
use aftercast::dispatcher::{ConsoleMessage, Opcode, Payload, ResultCode, TaskOutcome};
use aftercast::external::ExternalFault;
use aftercast::health::HealthState;
use aftercast::models::{NewTask, NewTimelineEntry, TimelineAction, CANCEL_STAGE};

use crate::fixtures::{Harness, EVENT_ID, ORIGIN};

#[tokio::test]
async fn test_control_tasks_complete_and_log() {
    let harness = Harness::new();
    let server = harness.solo().await;
    let handle = server.server.handle();

    handle
        .submit_control(&Payload::ConsoleMessage(ConsoleMessage {
            message: "hello".to_string(),
        }))
        .await
        .unwrap();
    handle.submit_control(&Payload::NoOp).await.unwrap();

    let outcomes = server.run_due().await;
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes
        .iter()
        .all(|o| o.result_code() == Some(ResultCode::Success)));
    assert!(server.tasks().await.is_empty());

    let logs = server
        .store
        .query_log_entries(&LogFilter::default())
        .await
        .unwrap();
    assert_eq!(logs.len(), 2);
}

#[tokio::test]
async fn test_shutdown_stops_run_until_idle() {
    let harness = Harness::new();
    let server = harness.solo().await;
    let handle = server.server.handle();

    handle.request_shutdown().await.unwrap();
    harness.clock.advance(1);
    handle.submit_control(&Payload::NoOp).await.unwrap();

    let outcomes = server.run_due().await;
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].is_shutdown());
    // The no-op queued behind the shutdown is left for the next start.
    assert_eq!(server.tasks().await.len(), 1);
}

#[tokio::test]
async fn test_shutdown_ends_run_loop() {
    let harness = Harness::new();
    let server = harness.solo().await;
    server.server.handle().request_shutdown().await.unwrap();

    tokio::time::timeout(
        std::time::Duration::from_secs(5),
        server.server.dispatcher().run_loop(),
    )
    .await
    .expect("run loop did not stop")
    .unwrap();

    assert!(server.server.handle().is_shutdown());
    let refused = server.server.handle().submit_control(&Payload::NoOp).await;
    assert!(refused.is_err());
}

#[tokio::test]
async fn test_corrupt_payload_is_discarded_with_log_entry() {
    let harness = Harness::new();
    let server = harness.solo().await;
    let now = harness.clock.now();

    server
        .store
        .insert_task(
            NewTask {
                opcode: Opcode::GenForecast,
                event_id: EVENT_ID.to_string(),
                stage: 0,
                exec_time: now,
                submit_id: "test".to_string(),
                payload: r#"{"kind":"poll_run"}"#.to_string(),
            },
            now,
        )
        .await
        .unwrap();

    let outcomes = server.run_due().await;
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].result_code(), Some(ResultCode::Corrupt));
    assert!(server.tasks().await.is_empty());

    let logs = server
        .store
        .query_log_entries(&LogFilter::default())
        .await
        .unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].result_code, ResultCode::Corrupt);
}

#[tokio::test]
async fn test_faults_retry_then_quarantine() {
    let harness = Harness::new();
    let server = harness.solo().await;
    server.submit_intake(EVENT_ID).await;
    server.run_due().await;

    server
        .model
        .fail_next(10, ExternalFault::Transient("model busy".to_string()));
    harness.at(HOUR_MILLIS);

    for expected in 1..=3 {
        let outcomes = server.run_due().await;
        assert_eq!(outcomes.len(), 1);
        assert_eq!(
            outcomes[0].outcome,
            TaskOutcome::Faulted {
                fault_count: expected
            }
        );
        let tasks = server.event_tasks(EVENT_ID).await;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].exec_time, harness.clock.now() + MINUTE_MILLIS);
        harness.clock.advance(MINUTE_MILLIS);
    }

    let outcomes = server.run_due().await;
    assert_eq!(outcomes[0].outcome, TaskOutcome::Quarantined);
    assert!(server.event_tasks(EVENT_ID).await.is_empty());

    let logs = server
        .store
        .query_log_entries(&LogFilter {
            event_id: Some(EVENT_ID.to_string()),
            ..LogFilter::default()
        })
        .await
        .unwrap();
    let quarantined = logs
        .iter()
        .find(|e| e.result_code == ResultCode::Quarantined)
        .expect("quarantine log entry");
    assert!(quarantined.details.contains("gen_forecast"));
    assert_eq!(server.ctx().health.snapshot().quarantined, 1);
}

#[tokio::test]
async fn test_restart_after_crash_counts_as_fault() {
    let harness = Harness::new();
    let server = harness.solo().await;
    server.server.handle().submit_control(&Payload::NoOp).await.unwrap();

    // A claim that never completes, as if the process died mid-task.
    let abandoned = server
        .store
        .claim_next_task(harness.clock.now())
        .await
        .unwrap()
        .unwrap();
    assert!(!abandoned.restarted);

    let outcomes = server.run_due().await;
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].task_id, abandoned.task.id);
    assert_eq!(outcomes[0].result_code(), Some(ResultCode::Success));
}

#[tokio::test]
async fn test_cancel_restages_waiting_tasks() {
    let harness = Harness::new();
    let server = harness.solo().await;
    let handle = server.server.handle();
    let later = harness.clock.now() + HOUR_MILLIS;
    handle
        .submit(EVENT_ID, later, &Payload::PollRun)
        .await
        .unwrap();

    let cancelled = handle.cancel(Opcode::PollRun, EVENT_ID).await.unwrap();
    assert_eq!(cancelled, 1);
    let tasks = server.event_tasks(EVENT_ID).await;
    assert_eq!(tasks[0].stage, CANCEL_STAGE);
    assert_eq!(tasks[0].exec_time, harness.clock.now());

    let outcomes = server.run_due().await;
    assert_eq!(outcomes[0].result_code(), Some(ResultCode::DeleteCancelled));
    assert!(server.tasks().await.is_empty());
}

#[tokio::test]
async fn test_health_tracks_faults_and_control_tasks() {
    let harness = Harness::new();
    let server = harness.solo().await;
    let health = &server.ctx().health;
    health.set_fault_threshold(2);
    for _ in 0..2 {
        health.record_fault(harness.clock.now());
    }
    assert_eq!(health.state(), HealthState::Impaired);

    server
        .server
        .handle()
        .submit_control(&Payload::HealthMonitorReset)
        .await
        .unwrap();
    server.run_due().await;
    assert_eq!(health.state(), HealthState::Normal);

    server
        .server
        .handle()
        .submit_control(&Payload::HealthMonitorStop)
        .await
        .unwrap();
    server.run_due().await;
    assert_eq!(health.state(), HealthState::Unmonitored);
}

#[tokio::test]
async fn test_corrupt_timeline_entry_discards_command() {
    let harness = Harness::new();
    let server = harness.solo().await;
    server.submit_intake(EVENT_ID).await;
    server.run_due().await;

    server
        .store
        .append_timeline_entry(
            NewTimelineEntry {
                event_id: EVENT_ID.to_string(),
                action_code: TimelineAction::Forecast.code(),
                action_time: harness.clock.now(),
                payload: "not json".to_string(),
            },
            1,
        )
        .await
        .unwrap();

    harness.at(HOUR_MILLIS);
    let outcomes = server.run_due().await;
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].outcome, TaskOutcome::Completed(ResultCode::Corrupt));
    assert!(server.event_tasks(EVENT_ID).await.is_empty());

    let logs = server
        .store
        .query_log_entries(&LogFilter {
            event_id: Some(EVENT_ID.to_string()),
            ..LogFilter::default()
        })
        .await
        .unwrap();
    let corrupt = logs
        .iter()
        .find(|e| e.result_code == ResultCode::Corrupt)
        .expect("corrupt log entry");
    assert_eq!(corrupt.opcode, Opcode::GenForecast);
    assert!(corrupt.details.contains("us1000abc#2"));
}

#[tokio::test]
async fn test_delete_timeline_commands_spares_claimed_task() {
    let harness = Harness::new();
    let server = harness.solo().await;
    server.submit_intake(EVENT_ID).await;
    server.run_due().await;
    let handle = server.server.handle();

    harness.at(HOUR_MILLIS);
    let claimed = server
        .store
        .claim_next_task(harness.clock.now())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(claimed.task.opcode, Opcode::GenForecast);

    assert_eq!(handle.delete_timeline_commands(EVENT_ID, None).await.unwrap(), 0);
    assert!(server.store.get_task(claimed.task.id).await.unwrap().is_some());

    // Once the dispatcher puts it back in the queue it is deletable again.
    let mut task = claimed.task;
    task.restage(ORIGIN + 2 * HOUR_MILLIS, 0);
    server.store.update_task(&task).await.unwrap();
    assert_eq!(handle.delete_timeline_commands(EVENT_ID, None).await.unwrap(), 1);
    assert!(server.event_tasks(EVENT_ID).await.is_empty());
}
