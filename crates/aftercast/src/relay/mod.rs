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

//! # Relay Protocol
//!
//! Two servers agree on which one is primary by exchanging small versioned
//! records through a shared relay store. The same store carries the
//! per-event items that make duplicate publishing harmless:
//! `pdl_completion` (a forecast was sent), `foreign_product` (another
//! source published) and `analyst_selection` (options to apply on both
//! servers).

pub mod config;
pub mod engine;
pub mod items;
pub mod status;

pub use config::{RelayConfig, RelayMode};
pub use engine::{PromotionListener, RelayEngine, RelaySnapshot};
pub use items::{AnalystSelection, ForeignProduct, PdlCompletion};
pub use status::{InferredState, LinkState, PrimaryState, ServerStatus, PROTOCOL_VERSION};
