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

//! Publishing across a primary/secondary pair sharing one relay store.

use aftercast::clock::{HOUR_MILLIS, MINUTE_MILLIS};
use aftercast::dispatcher::{DispatchOutcome, Opcode, ResultCode};
use aftercast::external::ExternalFault;
use aftercast::models::{RelayItem, RelayTopic};
use aftercast::relay::{PrimaryState, RelayMode};
use aftercast::timeline::{ForecastStatus, PublishStatus};

use crate::fixtures::{test_config, Harness, EVENT_ID, ORIGIN};

fn codes(outcomes: &[DispatchOutcome]) -> Vec<ResultCode> {
    outcomes.iter().filter_map(|o| o.result_code()).collect()
}

#[tokio::test]
async fn test_only_primary_sends() {
    let harness = Harness::new();
    let (first, second) = harness.pair().await;
    assert!(first.server.relay().is_primary());
    assert!(!second.server.relay().is_primary());

    for server in [&first, &second] {
        server.submit_intake(EVENT_ID).await;
        server.run_due().await;
    }

    harness.at(HOUR_MILLIS);
    first.cycle().await;
    second.cycle().await;
    assert_eq!(codes(&first.run_due().await), vec![ResultCode::Success]);
    assert_eq!(codes(&second.run_due().await), vec![ResultCode::Success]);

    assert_eq!(harness.publisher.sent_lags(EVENT_ID), vec![HOUR_MILLIS]);
    let primary = first.timeline(EVENT_ID).await.unwrap();
    assert_eq!(primary.status.publish_status, PublishStatus::Success);
    let secondary = second.timeline(EVENT_ID).await.unwrap();
    assert_eq!(secondary.status.publish_status, PublishStatus::Secondary);
    // Both servers computed the forecast.
    assert_eq!(first.model.run_count(), 1);
    assert_eq!(second.model.run_count(), 1);
}

#[tokio::test]
async fn test_promoted_secondary_confirms_instead_of_resending() {
    let harness = Harness::new();
    let (first, second) = harness.pair().await;
    for server in [&first, &second] {
        server.submit_intake(EVENT_ID).await;
        server.run_due().await;
    }
    harness.at(HOUR_MILLIS);
    first.cycle().await;
    second.cycle().await;
    first.run_due().await;
    second.run_due().await;

    // The primary stops heartbeating.
    harness.at(HOUR_MILLIS + 2 * MINUTE_MILLIS);
    let snapshot = second.server.relay().cycle().await.unwrap();
    assert_eq!(snapshot.primary_state, PrimaryState::Contending);
    assert!(second
        .event_tasks(EVENT_ID)
        .await
        .iter()
        .all(|t| t.opcode == Opcode::GenForecast));

    let snapshot = second.server.relay().cycle().await.unwrap();
    assert_eq!(snapshot.primary_state, PrimaryState::Primary);
    let tasks = second.event_tasks(EVENT_ID).await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].opcode, Opcode::GenReport);

    assert_eq!(codes(&second.run_due().await), vec![ResultCode::Success]);
    let timeline = second.timeline(EVENT_ID).await.unwrap();
    assert_eq!(timeline.status.publish_status, PublishStatus::Confirmed);
    assert_eq!(harness.publisher.sent().len(), 1);

    let tasks = second.event_tasks(EVENT_ID).await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].opcode, Opcode::GenForecast);

    // The configured primary comes back and both converge.
    first.cycle().await;
    assert!(first.server.relay().is_primary());
    let snapshot = second.server.relay().cycle().await.unwrap();
    assert_eq!(snapshot.primary_state, PrimaryState::Secondary);
}

#[tokio::test]
async fn test_promoted_secondary_sends_unpublished_forecast() {
    let harness = Harness::new();
    let (first, second) = harness.pair().await;
    for server in [&first, &second] {
        server.submit_intake(EVENT_ID).await;
        server.run_due().await;
    }

    // The primary dies before its forecast window; only the secondary runs.
    harness.at(HOUR_MILLIS);
    second.cycle().await;
    second.run_due().await;
    assert!(harness.publisher.sent().is_empty());

    harness.at(HOUR_MILLIS + 10 * MINUTE_MILLIS);
    second.cycle().await;
    second.cycle().await;
    assert!(second.server.relay().is_primary());
    assert_eq!(codes(&second.run_due().await), vec![ResultCode::Success]);

    assert_eq!(harness.publisher.sent_lags(EVENT_ID), vec![HOUR_MILLIS]);
    let timeline = second.timeline(EVENT_ID).await.unwrap();
    assert_eq!(timeline.status.publish_status, PublishStatus::Success);
}

#[tokio::test]
async fn test_transient_publish_failure_retries_then_succeeds() {
    let harness = Harness::new();
    let server = harness.solo().await;
    server.submit_intake(EVENT_ID).await;
    server.run_due().await;

    harness
        .publisher
        .fail_next(1, ExternalFault::Transient("sink busy".to_string()));
    harness.at(HOUR_MILLIS);
    assert_eq!(codes(&server.run_due().await), vec![ResultCode::Success]);
    let timeline = server.timeline(EVENT_ID).await.unwrap();
    assert_eq!(timeline.status.publish_status, PublishStatus::Pending);

    let tasks = server.event_tasks(EVENT_ID).await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].opcode, Opcode::GenReport);
    assert_eq!(tasks[0].exec_time, ORIGIN + HOUR_MILLIS + MINUTE_MILLIS);

    harness.at(HOUR_MILLIS + MINUTE_MILLIS);
    assert_eq!(codes(&server.run_due().await), vec![ResultCode::Success]);
    let timeline = server.timeline(EVENT_ID).await.unwrap();
    assert_eq!(timeline.status.publish_status, PublishStatus::Success);
    assert_eq!(harness.publisher.sent_lags(EVENT_ID), vec![HOUR_MILLIS]);
}

#[tokio::test]
async fn test_foreign_product_bypasses_publish() {
    let harness = Harness::new();
    let server = harness.solo().await;
    server.submit_intake(EVENT_ID).await;
    server.run_due().await;

    server
        .ctx()
        .relay
        .record_foreign_product(
            EVENT_ID,
            &aftercast::relay::ForeignProduct {
                source: "other-center".to_string(),
                product_time: ORIGIN + 20 * MINUTE_MILLIS,
            },
        )
        .await
        .unwrap();
    harness.at(HOUR_MILLIS);
    assert_eq!(codes(&server.run_due().await), vec![ResultCode::Success]);
    let timeline = server.timeline(EVENT_ID).await.unwrap();
    assert_eq!(timeline.status.publish_status, PublishStatus::Bypassed);
    assert!(harness.publisher.sent().is_empty());
}

#[tokio::test]
async fn test_publish_gives_up_at_horizon_and_timeline_continues() {
    let harness = Harness::new();
    let mut config = test_config(1, RelayMode::Solo);
    config.publish.max_horizon_ms = 2 * MINUTE_MILLIS;
    let server = harness.server(config);
    server.cycle().await;
    server.submit_intake(EVENT_ID).await;
    server.run_due().await;

    harness
        .publisher
        .fail_next(2, ExternalFault::Transient("sink down".to_string()));
    harness.at(HOUR_MILLIS);
    assert_eq!(codes(&server.run_due().await), vec![ResultCode::Success]);
    let tasks = server.event_tasks(EVENT_ID).await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].opcode, Opcode::GenReport);

    // The next retry would land past the horizon.
    harness.at(HOUR_MILLIS + MINUTE_MILLIS);
    assert_eq!(codes(&server.run_due().await), vec![ResultCode::PublishFailure]);
    let timeline = server.timeline(EVENT_ID).await.unwrap();
    assert_eq!(timeline.status.publish_status, PublishStatus::Failure);
    assert_eq!(timeline.status.forecast_status, ForecastStatus::Active);
    let tasks = server.event_tasks(EVENT_ID).await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].opcode, Opcode::GenForecast);
    assert_eq!(tasks[0].exec_time, ORIGIN + 2 * HOUR_MILLIS);

    harness.at(2 * HOUR_MILLIS);
    assert_eq!(codes(&server.run_due().await), vec![ResultCode::Success]);
    assert_eq!(harness.publisher.sent_lags(EVENT_ID), vec![2 * HOUR_MILLIS]);
}

#[tokio::test]
async fn test_relay_failure_after_send_does_not_resend() {
    let harness = Harness::new();
    let server = harness.solo().await;
    server.submit_intake(EVENT_ID).await;
    server.run_due().await;

    // An unreadable completion makes recording the send fail.
    harness.publisher.write_after_send(
        harness.relay_store.clone(),
        RelayItem {
            topic: RelayTopic::PdlCompletion,
            relay_id: EVENT_ID.to_string(),
            relay_time: ORIGIN,
            payload: "not json".to_string(),
        },
    );
    harness.at(HOUR_MILLIS);
    let outcomes = server.run_due().await;
    assert_eq!(codes(&outcomes), vec![ResultCode::Success]);
    assert_eq!(harness.publisher.sent_lags(EVENT_ID), vec![HOUR_MILLIS]);

    let timeline = server.timeline(EVENT_ID).await.unwrap();
    assert_eq!(timeline.status.publish_status, PublishStatus::Success);
    let tasks = server.event_tasks(EVENT_ID).await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].opcode, Opcode::GenForecast);
}
