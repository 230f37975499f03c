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

//! External collaborators.
//!
//! The forecast model, the earthquake catalog and the product sink are
//! reached only through the traits in this module. Every call is wrapped in
//! a timeout by [`call_with_timeout`]; an elapsed timeout is a transient
//! fault like any other.

pub mod catalog;
pub mod forecast;
pub mod publish;

pub use catalog::{CatalogService, Mainshock, ShadowInfo, ShadowSearch};
pub use forecast::ForecastModel;
pub use publish::{ProductSubmission, PublishService, SendOutcome};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// A failed call to an external service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExternalFault {
    /// Worth retrying later: network trouble, overload, timeouts.
    #[error("transient fault: {0}")]
    Transient(String),

    /// The requested object does not exist (e.g. deleted from the catalog).
    #[error("not found: {0}")]
    NotFound(String),

    /// Retrying will not help.
    #[error("fatal fault: {0}")]
    Fatal(String),
}

impl ExternalFault {
    pub fn is_transient(&self) -> bool {
        matches!(self, ExternalFault::Transient(_))
    }
}

/// Runs `call`, converting an elapsed `timeout` into a transient fault.
pub async fn call_with_timeout<T, F>(
    service: &str,
    timeout: Duration,
    call: F,
) -> Result<T, ExternalFault>
where
    F: Future<Output = Result<T, ExternalFault>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(ExternalFault::Transient(format!(
            "{} call timed out after {} ms",
            service,
            timeout.as_millis()
        ))),
    }
}

/// The set of external services a server talks to.
#[derive(Clone)]
pub struct Services {
    pub catalog: Arc<dyn CatalogService>,
    pub publish: Arc<dyn PublishService>,
    pub model: Arc<dyn ForecastModel>,
}

impl Services {
    pub fn new(
        catalog: Arc<dyn CatalogService>,
        publish: Arc<dyn PublishService>,
        model: Arc<dyn ForecastModel>,
    ) -> Self {
        Self {
            catalog,
            publish,
            model,
        }
    }
}
