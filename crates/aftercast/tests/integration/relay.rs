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

//! Primary negotiation and relay item exchange between two servers.

use aftercast::clock::MINUTE_MILLIS;
use aftercast::dispatcher::{AnalystRequest, Payload, RelayModeRequest, ResultCode};
use aftercast::relay::{InferredState, LinkState, PrimaryState, RelayMode};
use aftercast::timeline::{AnalystOptions, IntakeOption, ShadowOption};

use crate::fixtures::{test_config, Harness, EVENT_ID, HEARTBEAT_MILLIS};

#[tokio::test]
async fn test_pair_connects_with_configured_primary() {
    let harness = Harness::new();
    let (first, second) = harness.pair().await;
    first.cycle().await;

    let one = first.server.relay().snapshot();
    let two = second.server.relay().snapshot();
    assert_eq!(one.primary_state, PrimaryState::Primary);
    assert_eq!(one.link_state, LinkState::Connected);
    assert_eq!(one.inferred_state, InferredState::Secondary);
    assert_eq!(two.primary_state, PrimaryState::Secondary);
    assert_eq!(two.inferred_state, InferredState::Primary);
}

#[tokio::test]
async fn test_solo_server_is_primary_without_partner() {
    let harness = Harness::new();
    let server = harness.solo().await;
    let snapshot = server.server.relay().snapshot();
    assert_eq!(snapshot.link_state, LinkState::Solo);
    assert!(snapshot.is_primary());
    assert_eq!(snapshot.inferred_state, InferredState::None);
}

#[tokio::test]
async fn test_secondary_with_no_partner_contends_then_promotes() {
    let harness = Harness::new();
    let second = harness.server(test_config(2, RelayMode::Dual));

    let snapshot = second.server.relay().cycle().await.unwrap();
    assert_eq!(snapshot.primary_state, PrimaryState::Contending);
    assert!(!second.server.relay().is_primary());

    let snapshot = second.server.relay().cycle().await.unwrap();
    assert_eq!(snapshot.primary_state, PrimaryState::Primary);
}

#[tokio::test]
async fn test_partner_is_dead_after_staleness_window() {
    let harness = Harness::new();
    let (first, second) = harness.pair().await;

    // Three missed heartbeats are still alive.
    harness.clock.advance(3 * HEARTBEAT_MILLIS);
    let status = second
        .server
        .relay()
        .read_server_status(1)
        .await
        .unwrap()
        .unwrap();
    assert!(status.is_alive(harness.clock.now(), 3 * HEARTBEAT_MILLIS));
    first.cycle().await;

    harness.clock.advance(4 * HEARTBEAT_MILLIS);
    let snapshot = second.server.relay().cycle().await.unwrap();
    assert_eq!(snapshot.inferred_state, InferredState::Dead);
    assert_eq!(snapshot.primary_state, PrimaryState::Contending);
}

#[tokio::test]
async fn test_relay_mode_change_is_adopted_by_partner() {
    let harness = Harness::new();
    let (first, second) = harness.pair().await;

    first
        .server
        .handle()
        .submit_control(&Payload::SetRelayMode(RelayModeRequest {
            relay_mode: RelayMode::Dual,
            configured_primary: 2,
        }))
        .await
        .unwrap();
    let outcomes = first.run_due().await;
    assert_eq!(outcomes[0].result_code(), Some(ResultCode::Success));

    harness.clock.advance(HEARTBEAT_MILLIS);
    first.cycle().await;
    second.cycle().await;

    let one = first.server.relay().snapshot();
    let two = second.server.relay().snapshot();
    assert_eq!(one.relay_config, two.relay_config);
    assert_eq!(two.relay_config.configured_primary, 2);
    assert_eq!(one.primary_state, PrimaryState::Secondary);
    assert_eq!(two.primary_state, PrimaryState::Primary);
}

#[tokio::test]
async fn test_invalid_configured_primary_is_fatal() {
    let harness = Harness::new();
    let server = harness.solo().await;
    server
        .server
        .handle()
        .submit_control(&Payload::SetRelayMode(RelayModeRequest {
            relay_mode: RelayMode::Dual,
            configured_primary: 3,
        }))
        .await
        .unwrap();
    let outcomes = server.run_due().await;
    assert_eq!(outcomes[0].result_code(), Some(ResultCode::Fatal));
    assert_eq!(
        server.server.relay().relay_config().relay_mode,
        RelayMode::Solo
    );
}

#[tokio::test]
async fn test_shutdown_is_seen_by_partner_immediately() {
    let harness = Harness::new();
    let (first, second) = harness.pair().await;

    first.server.relay().shutdown().await.unwrap();
    let status = second
        .server
        .relay()
        .read_server_status(1)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status.link_state, LinkState::Shutdown);
    assert_eq!(status.primary_state, PrimaryState::Shutdown);

    let snapshot = second.server.relay().cycle().await.unwrap();
    assert_eq!(snapshot.inferred_state, InferredState::Dead);

    // A shut-down engine no longer cycles.
    let snapshot = first.server.relay().cycle().await.unwrap();
    assert_eq!(snapshot.primary_state, PrimaryState::Shutdown);
}

#[tokio::test]
async fn test_analyst_selection_reaches_partner_once() {
    let harness = Harness::new();
    let (first, second) = harness.pair().await;
    for server in [&first, &second] {
        server.submit_intake(EVENT_ID).await;
        server.run_due().await;
    }

    first
        .server
        .handle()
        .submit(
            EVENT_ID,
            harness.clock.now(),
            &Payload::AnalystIntervene(AnalystRequest {
                options: AnalystOptions {
                    analyst_id: "analyst".to_string(),
                    remark: "swarm".to_string(),
                    option_time: 0,
                    intake_option: IntakeOption::Block,
                    shadow_option: ShadowOption::Normal,
                    model_params: None,
                },
            }),
        )
        .await
        .unwrap();
    first.run_due().await;

    let handle = second.server.handle();
    let relay = second.server.relay();
    assert_eq!(relay.import_analyst_selections(&handle).await.unwrap(), 1);
    assert_eq!(relay.import_analyst_selections(&handle).await.unwrap(), 0);
    assert_eq!(
        first
            .server
            .relay()
            .import_analyst_selections(&first.server.handle())
            .await
            .unwrap(),
        0
    );

    harness.clock.advance(MINUTE_MILLIS);
    let outcomes = second.run_due().await;
    assert_eq!(outcomes[0].result_code(), Some(ResultCode::Success));
    let local = first.timeline(EVENT_ID).await.unwrap();
    let remote = second.timeline(EVENT_ID).await.unwrap();
    assert_eq!(remote.status.intake_option(), IntakeOption::Block);
    assert_eq!(remote.status.analyst_options, local.status.analyst_options);
}
