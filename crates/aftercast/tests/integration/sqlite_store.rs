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

//! The timeline flow on SQLite files, including a server restart.

use serial_test::serial;
use std::sync::Arc;
use tempfile::TempDir;

use aftercast::clock::HOUR_MILLIS;
use aftercast::config::ConfigHandle;
use aftercast::database::{AccessLevel, Database, RecordStore, SqliteStore, TaskFilter};
use aftercast::dispatcher::{Opcode, ResultCode};
use aftercast::handlers::default_handler_table;
use aftercast::relay::RelayMode;
use aftercast::timeline::{ForecastStatus, PublishStatus};
use aftercast::{Server, Services};

use crate::fixtures::{test_config, FakeModel, Harness, EVENT_ID, ORIGIN};

struct Files {
    _dir: TempDir,
    local: String,
    relay: String,
}

fn files() -> Files {
    let dir = TempDir::new().unwrap();
    let local = format!("sqlite://{}", dir.path().join("local.db").display());
    let relay = format!("sqlite://{}", dir.path().join("relay.db").display());
    Files {
        _dir: dir,
        local,
        relay,
    }
}

async fn open_server(harness: &Harness, files: &Files) -> (Server, Arc<dyn RecordStore>) {
    let store: Arc<dyn RecordStore> = Arc::new(
        SqliteStore::open(&files.local, AccessLevel::ReadWrite)
            .await
            .unwrap(),
    );
    let relay: Arc<dyn RecordStore> = Arc::new(
        SqliteStore::open(&files.relay, AccessLevel::ReadWrite)
            .await
            .unwrap(),
    );
    let services = Services::new(
        harness.catalog.clone(),
        harness.publisher.clone(),
        Arc::new(FakeModel::default()),
    );
    let server = Server::with_stores(
        ConfigHandle::new(test_config(1, RelayMode::Solo)),
        harness.clock.clone(),
        store.clone(),
        relay,
        services,
        default_handler_table(),
    );
    server.relay().cycle().await.unwrap();
    (server, store)
}

fn result_codes(outcomes: &[aftercast::dispatcher::DispatchOutcome]) -> Vec<ResultCode> {
    outcomes.iter().filter_map(|o| o.result_code()).collect()
}

#[tokio::test]
#[serial]
async fn test_forecast_flow_survives_restart() {
    let harness = Harness::new();
    let files = files();

    {
        let (server, _) = open_server(&harness, &files).await;
        server
            .handle()
            .submit(
                EVENT_ID,
                harness.clock.now(),
                &aftercast::dispatcher::Payload::IntakeSync(Default::default()),
            )
            .await
            .unwrap();
        let outcomes = server.dispatcher().run_until_idle(10).await.unwrap();
        assert_eq!(result_codes(&outcomes), vec![ResultCode::Success]);
        server.relay().shutdown().await.unwrap();
    }

    harness.at(HOUR_MILLIS);
    let (server, store) = open_server(&harness, &files).await;
    let queued = store.find_tasks(&TaskFilter::for_event(EVENT_ID)).await.unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].opcode, Opcode::GenForecast);
    assert_eq!(queued[0].exec_time, ORIGIN + HOUR_MILLIS);

    let outcomes = server.dispatcher().run_until_idle(10).await.unwrap();
    assert_eq!(result_codes(&outcomes), vec![ResultCode::Success]);

    let timeline = server.context().timelines.open(EVENT_ID).await.unwrap().unwrap();
    assert_eq!(timeline.sequence_no, 2);
    assert_eq!(timeline.status.forecast_status, ForecastStatus::Active);
    assert_eq!(timeline.status.publish_status, PublishStatus::Success);
    assert_eq!(harness.publisher.sent_lags(EVENT_ID), vec![HOUR_MILLIS]);
}

#[tokio::test]
#[serial]
async fn test_interrupted_task_replays_without_second_send() {
    let harness = Harness::new();
    let files = files();

    {
        let (server, store) = open_server(&harness, &files).await;
        server
            .handle()
            .submit(
                EVENT_ID,
                harness.clock.now(),
                &aftercast::dispatcher::Payload::IntakeSync(Default::default()),
            )
            .await
            .unwrap();
        server.dispatcher().run_until_idle(10).await.unwrap();

        // The process claims the forecast, sends it and dies.
        harness.at(HOUR_MILLIS);
        store.claim_next_task(harness.clock.now()).await.unwrap().unwrap();
        server
            .context()
            .relay
            .record_pdl_completion(EVENT_ID, HOUR_MILLIS, Some("us1000abc-1".to_string()))
            .await
            .unwrap();
    }

    let (server, store) = open_server(&harness, &files).await;
    let queued = store.find_tasks(&TaskFilter::for_event(EVENT_ID)).await.unwrap();
    assert!(queued[0].is_active());

    let outcomes = server.dispatcher().run_until_idle(10).await.unwrap();
    assert_eq!(result_codes(&outcomes), vec![ResultCode::Success]);
    assert!(harness.publisher.sent().is_empty());
    let timeline = server.context().timelines.open(EVENT_ID).await.unwrap().unwrap();
    assert_eq!(timeline.status.publish_status, PublishStatus::Confirmed);
}

#[tokio::test]
#[serial]
async fn test_open_by_url_selects_backend() {
    let files = files();
    let db = Database::open(&files.local, AccessLevel::ReadWrite)
        .await
        .unwrap();
    assert_eq!(db.backend(), aftercast::database::BackendType::Sqlite);

    let read_only = Database::open(&files.local, AccessLevel::ReadOnly)
        .await
        .unwrap();
    assert!(read_only.store().claim_next_task(0).await.is_err());

    let memory = Database::open("memory:", AccessLevel::ReadWrite).await.unwrap();
    assert_eq!(memory.backend(), aftercast::database::BackendType::Memory);
}
