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

//! Statistical forecast model interface.

use async_trait::async_trait;

use super::catalog::Mainshock;
use super::ExternalFault;

#[async_trait]
pub trait ForecastModel: Send + Sync {
    /// Produces the forecast content for `mainshock` at `lag` after origin.
    ///
    /// `params` carries analyst-supplied model overrides, if any.
    async fn generate(
        &self,
        mainshock: &Mainshock,
        lag: i64,
        params: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value, ExternalFault>;
}
