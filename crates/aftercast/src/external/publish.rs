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

//! Product sink interface.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::ExternalFault;

/// A forecast product ready to be sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSubmission {
    pub event_id: String,
    /// Forecast lag the product was generated for.
    pub lag: i64,
    /// Time the product was generated, used as its update time.
    pub update_time: i64,
    pub content: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SendOutcome {
    Sent { product_code: String },
    /// The sink already holds this or a newer product for the event.
    Conflict,
}

#[async_trait]
pub trait PublishService: Send + Sync {
    /// False when this installation must not send products at all.
    fn is_primary_sender(&self) -> bool;

    async fn send(&self, product: &ProductSubmission) -> Result<SendOutcome, ExternalFault>;

    /// Removes the event's products from the sink.
    async fn delete(&self, event_id: &str, reason: &str) -> Result<(), ExternalFault>;
}
