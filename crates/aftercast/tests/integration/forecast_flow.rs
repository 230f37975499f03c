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

//! End-to-end timeline flows on a single primary server.

use aftercast::clock::{DAY_MILLIS, HOUR_MILLIS, MINUTE_MILLIS};
use aftercast::database::RecordStore;
use aftercast::dispatcher::DispatchOutcome;
use aftercast::dispatcher::{AnalystRequest, Opcode, Payload, ResultCode};
use aftercast::external::{ExternalFault, ShadowInfo};
use aftercast::timeline::{
    AnalystOptions, ForecastStatus, IntakeOption, LastResult, PublishStatus, ShadowOption,
};

use aftercast::relay::RelayMode;

use crate::fixtures::{mainshock, test_config, Harness, EVENT_ID, LAGS, ORIGIN};

fn codes(outcomes: &[DispatchOutcome]) -> Vec<ResultCode> {
    outcomes.iter().filter_map(|o| o.result_code()).collect()
}

#[tokio::test]
async fn test_intake_schedules_first_forecast() {
    let harness = Harness::new();
    let server = harness.solo().await;
    server.submit_intake(EVENT_ID).await;

    assert_eq!(codes(&server.run_due().await), vec![ResultCode::Success]);

    let timeline = server.timeline(EVENT_ID).await.unwrap();
    assert_eq!(timeline.status.forecast_status, ForecastStatus::Intake);
    assert_eq!(timeline.status.next_forecast_lag, HOUR_MILLIS);
    assert_eq!(timeline.sequence_no, 1);

    let tasks = server.event_tasks(EVENT_ID).await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].opcode, Opcode::GenForecast);
    assert_eq!(tasks[0].exec_time, ORIGIN + HOUR_MILLIS);
}

#[tokio::test]
async fn test_forecast_at_due_time_then_replayed_command_mismatches() {
    let harness = Harness::new();
    let server = harness.solo().await;
    server.submit_intake(EVENT_ID).await;
    server.run_due().await;

    let command = server.event_tasks(EVENT_ID).await.remove(0);
    let payload = Payload::decode(command.opcode, "replay", &command.payload).unwrap();

    harness.at(HOUR_MILLIS);
    assert_eq!(codes(&server.run_due().await), vec![ResultCode::Success]);

    let timeline = server.timeline(EVENT_ID).await.unwrap();
    assert_eq!(timeline.status.forecast_status, ForecastStatus::Active);
    assert_eq!(timeline.status.last_result, LastResult::Forecast);
    assert_eq!(timeline.status.last_forecast_lag, HOUR_MILLIS);
    assert_eq!(timeline.status.next_forecast_lag, 2 * HOUR_MILLIS);
    assert_eq!(timeline.status.publish_status, PublishStatus::Success);
    let product = timeline.status.last_product.as_ref().unwrap();
    assert!(product.product_code.is_some());

    let next = server.event_tasks(EVENT_ID).await;
    assert_eq!(next.len(), 1);
    assert_eq!(next[0].exec_time, ORIGIN + 2 * HOUR_MILLIS);

    // The same command again no longer matches the timeline.
    server
        .server
        .handle()
        .submit(EVENT_ID, harness.clock.now(), &payload)
        .await
        .unwrap();
    assert_eq!(
        codes(&server.run_due().await),
        vec![ResultCode::TimelineMismatch]
    );
    let after = server.timeline(EVENT_ID).await.unwrap();
    assert_eq!(after.sequence_no, timeline.sequence_no);
    assert_eq!(server.model.run_count(), 1);

    let rescheduled = server.event_tasks(EVENT_ID).await;
    assert_eq!(rescheduled.len(), 1);
    assert_eq!(rescheduled[0].exec_time, ORIGIN + 2 * HOUR_MILLIS);
}

#[tokio::test]
async fn test_every_lag_is_forecast_then_timeline_expires() {
    let harness = Harness::new();
    let server = harness.solo().await;
    server.submit_intake(EVENT_ID).await;
    server.run_due().await;

    for lag in LAGS {
        harness.at(lag);
        assert_eq!(codes(&server.run_due().await), vec![ResultCode::Success]);
    }
    let lags: Vec<i64> = server.model.runs().into_iter().map(|(_, lag)| lag).collect();
    assert_eq!(lags, LAGS.to_vec());
    assert_eq!(server.publisher.sent_lags(EVENT_ID), LAGS.to_vec());

    let tasks = server.event_tasks(EVENT_ID).await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].opcode, Opcode::GenExpire);
    assert_eq!(tasks[0].exec_time, ORIGIN + DAY_MILLIS);

    harness.at(DAY_MILLIS);
    assert_eq!(codes(&server.run_due().await), vec![ResultCode::Expired]);
    let timeline = server.timeline(EVENT_ID).await.unwrap();
    assert_eq!(timeline.status.forecast_status, ForecastStatus::Expired);
    assert!(server.event_tasks(EVENT_ID).await.is_empty());
}

#[tokio::test]
async fn test_late_forecast_is_skipped_and_next_lag_runs() {
    let harness = Harness::new();
    let server = harness.solo().await;
    server.submit_intake(EVENT_ID).await;
    server.run_due().await;

    // Past the one-hour forecast's two-hour grace period.
    harness.at(3 * HOUR_MILLIS + MINUTE_MILLIS);
    let outcomes = server.run_due().await;
    assert_eq!(
        codes(&outcomes),
        vec![
            ResultCode::SkippedStale,
            ResultCode::Success,
            ResultCode::Success
        ]
    );
    let lags: Vec<i64> = server.model.runs().into_iter().map(|(_, lag)| lag).collect();
    assert_eq!(lags, vec![2 * HOUR_MILLIS, 3 * HOUR_MILLIS]);
}

#[tokio::test]
async fn test_crash_replay_after_send_does_not_publish_twice() {
    let harness = Harness::new();
    let server = harness.solo().await;
    server.submit_intake(EVENT_ID).await;
    server.run_due().await;
    harness.at(HOUR_MILLIS);

    // A previous run sent the product and recorded the completion, then the
    // process died before the timeline was updated.
    server
        .ctx()
        .relay
        .record_pdl_completion(EVENT_ID, HOUR_MILLIS, Some("us1000abc-1".to_string()))
        .await
        .unwrap();
    let abandoned = server
        .store
        .claim_next_task(harness.clock.now())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(abandoned.task.opcode, Opcode::GenForecast);

    assert_eq!(codes(&server.run_due().await), vec![ResultCode::Success]);
    assert!(server.publisher.sent().is_empty());
    let timeline = server.timeline(EVENT_ID).await.unwrap();
    assert_eq!(timeline.status.publish_status, PublishStatus::Confirmed);
    assert_eq!(timeline.sequence_no, 2);
}

#[tokio::test]
async fn test_catalog_outage_retries_on_schedule() {
    let harness = Harness::new();
    let server = harness.solo().await;
    server.submit_intake(EVENT_ID).await;
    server.run_due().await;

    server
        .catalog
        .fail_next(1, ExternalFault::Transient("catalog down".to_string()));
    harness.at(HOUR_MILLIS);
    assert_eq!(
        codes(&server.run_due().await),
        vec![ResultCode::StageCatalogRetry]
    );
    let tasks = server.event_tasks(EVENT_ID).await;
    assert_eq!(tasks[0].exec_time, ORIGIN + HOUR_MILLIS + MINUTE_MILLIS);

    harness.at(HOUR_MILLIS + MINUTE_MILLIS);
    assert_eq!(codes(&server.run_due().await), vec![ResultCode::Success]);
}

#[tokio::test]
async fn test_event_deleted_from_catalog_is_withdrawn() {
    let harness = Harness::new();
    let server = harness.solo().await;
    server.submit_intake(EVENT_ID).await;
    server.run_due().await;
    harness.at(HOUR_MILLIS);
    server.run_due().await;

    harness.catalog.remove_event(EVENT_ID);
    harness.at(2 * HOUR_MILLIS);
    assert_eq!(codes(&server.run_due().await), vec![ResultCode::Withdrawn]);

    let timeline = server.timeline(EVENT_ID).await.unwrap();
    assert_eq!(timeline.status.forecast_status, ForecastStatus::Withdrawn);
    assert!(server.event_tasks(EVENT_ID).await.is_empty());
    assert_eq!(server.publisher.deleted(), vec![EVENT_ID.to_string()]);
}

#[tokio::test]
async fn test_foreshock_shadow_skips_forecast() {
    let harness = Harness::new();
    let server = harness.solo().await;
    server.submit_intake(EVENT_ID).await;
    server.run_due().await;

    harness.catalog.set_shadow(Some(ShadowInfo {
        event_id: "us1000big".to_string(),
        origin_time: ORIGIN + 30 * MINUTE_MILLIS,
        magnitude: 7.2,
    }));
    harness.at(HOUR_MILLIS);
    assert_eq!(
        codes(&server.run_due().await),
        vec![ResultCode::SkippedForeshock]
    );
    let timeline = server.timeline(EVENT_ID).await.unwrap();
    assert_eq!(timeline.status.last_result, LastResult::SkippedForeshock);
    assert_eq!(timeline.status.next_forecast_lag, 2 * HOUR_MILLIS);
    assert_eq!(server.model.run_count(), 0);
}

#[tokio::test]
async fn test_intake_rejects_small_events() {
    let harness = Harness::new();
    let server = harness.solo().await;
    harness
        .catalog
        .add_event(mainshock("ci0001", ORIGIN, 2.1));
    server.submit_intake("ci0001").await;

    assert_eq!(
        codes(&server.run_due().await),
        vec![ResultCode::DeleteFiltered]
    );
    assert!(server.timeline("ci0001").await.is_none());
}

#[tokio::test]
async fn test_intake_under_alias_joins_existing_timeline() {
    let harness = Harness::new();
    let server = harness.solo().await;
    server.submit_intake(EVENT_ID).await;
    server.run_due().await;

    harness
        .catalog
        .add_alias("ci38457511", mainshock(EVENT_ID, ORIGIN, 6.4));
    server.submit_intake("ci38457511").await;
    assert_eq!(
        codes(&server.run_due().await),
        vec![ResultCode::AlreadyExists]
    );

    let timeline = server.timeline(EVENT_ID).await.unwrap();
    assert_eq!(timeline.status.aliases, vec!["ci38457511".to_string()]);
    assert!(server.timeline("ci38457511").await.is_none());
}

#[tokio::test]
async fn test_analyst_block_then_allow() {
    let harness = Harness::new();
    let server = harness.solo().await;
    server.submit_intake(EVENT_ID).await;
    server.run_due().await;

    let options = |intake_option, option_time| AnalystOptions {
        analyst_id: "analyst".to_string(),
        remark: String::new(),
        option_time,
        intake_option,
        shadow_option: ShadowOption::Normal,
        model_params: None,
    };
    let handle = server.server.handle();
    handle
        .submit(
            EVENT_ID,
            harness.clock.now(),
            &Payload::AnalystIntervene(AnalystRequest {
                options: options(IntakeOption::Block, 0),
            }),
        )
        .await
        .unwrap();
    assert_eq!(
        codes(&server.run_due().await),
        vec![ResultCode::Success, ResultCode::Success]
    );
    let timeline = server.timeline(EVENT_ID).await.unwrap();
    assert_eq!(timeline.status.intake_option(), IntakeOption::Block);

    harness.at(HOUR_MILLIS);
    assert_eq!(
        codes(&server.run_due().await),
        vec![ResultCode::SkippedAnalyst]
    );

    // An older selection arriving late changes nothing.
    handle
        .submit(
            EVENT_ID,
            harness.clock.now(),
            &Payload::AnalystSelection(AnalystRequest {
                options: options(IntakeOption::Allow, ORIGIN),
            }),
        )
        .await
        .unwrap();
    assert_eq!(codes(&server.run_due().await), vec![ResultCode::DeleteNoop]);

    handle
        .submit(
            EVENT_ID,
            harness.clock.now(),
            &Payload::AnalystIntervene(AnalystRequest {
                options: options(IntakeOption::Allow, 0),
            }),
        )
        .await
        .unwrap();
    server.run_due().await;
    harness.at(2 * HOUR_MILLIS);
    assert_eq!(codes(&server.run_due().await), vec![ResultCode::Success]);
    assert_eq!(server.model.run_count(), 1);
}

#[tokio::test]
async fn test_event_failing_intake_late_is_withdrawn() {
    let harness = Harness::new();
    let mut config = test_config(1, RelayMode::Solo);
    config.forecast.withdraw_lag_ms = 2 * HOUR_MILLIS;
    let server = harness.server(config);
    server.cycle().await;
    server.submit_intake(EVENT_ID).await;
    server.run_due().await;

    // A magnitude revision drops the event below the intake threshold.
    harness.catalog.add_event(mainshock(EVENT_ID, ORIGIN, 3.0));

    harness.at(HOUR_MILLIS);
    assert_eq!(codes(&server.run_due().await), vec![ResultCode::SkippedIntake]);
    let timeline = server.timeline(EVENT_ID).await.unwrap();
    assert_eq!(timeline.status.forecast_status, ForecastStatus::Active);
    assert_eq!(timeline.status.last_result, LastResult::SkippedIntake);
    let tasks = server.event_tasks(EVENT_ID).await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].exec_time, ORIGIN + 2 * HOUR_MILLIS);

    harness.at(2 * HOUR_MILLIS);
    assert_eq!(codes(&server.run_due().await), vec![ResultCode::Withdrawn]);
    let timeline = server.timeline(EVENT_ID).await.unwrap();
    assert_eq!(timeline.status.forecast_status, ForecastStatus::Withdrawn);
    assert!(server.event_tasks(EVENT_ID).await.is_empty());
    assert_eq!(server.model.run_count(), 0);
}
