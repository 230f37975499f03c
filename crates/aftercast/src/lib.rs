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

//! # Aftercast
//!
//! Aftercast runs the scheduling side of an aftershock forecasting service.
//! A server keeps one durable task queue, drives an event-sourced timeline
//! per seismic event through intake, forecasting, publishing and expiry, and
//! negotiates with a partner server over a shared relay store so that only
//! one of the pair publishes.
//!
//! ## Building blocks
//!
//! - [`database`]: the [`RecordStore`](database::RecordStore) trait with
//!   in-memory and SQLite backends.
//! - [`dispatcher`]: tasks, opcodes, result codes and the dispatcher loop.
//! - [`timeline`]: timeline status, deltas, the fold and scheduling rules.
//! - [`relay`]: heartbeat exchange, primary negotiation and relay items.
//! - [`handlers`]: one handler per opcode.
//! - [`external`]: catalog, publish and model interfaces.
//! - [`runner`]: assembles a [`Server`](runner::Server) from configuration.
//!
//! ## Example
//!
//! ```rust,ignore
//! use aftercast::config::{ConfigHandle, ConfigLoader};
//! use aftercast::runner::Server;
//!
//! let config = ConfigHandle::new(ConfigLoader::new().load(None)?);
//! let server = Server::open(config, services).await?;
//! server.run().await?;
//! ```

pub mod clock;
pub mod config;
pub mod database;
pub mod dispatcher;
pub mod error;
pub mod external;
pub mod handlers;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod relay;
pub mod runner;
pub mod timeline;

pub use clock::Clock;
pub use config::{AftercastConfig, ConfigHandle, ConfigLoader};
pub use database::{AccessLevel, Database, RecordStore};
pub use dispatcher::{DispatchHandle, Dispatcher, Opcode, Payload, ResultCode};
pub use error::{
    ConfigError, DispatchError, HandlerError, RelayError, StoreError, TimelineError,
};
pub use external::{ExternalFault, Services};
pub use logging::init_logging;
pub use runner::Server;
