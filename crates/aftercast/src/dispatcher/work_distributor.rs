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

//! Work notification for the dispatcher loop.
//!
//! The dispatcher sleeps until the earliest queued `exec_time`, capped by the
//! idle poll interval. A [`WorkDistributor`] lets submitters cut that sleep
//! short when they queue something that may be due sooner.
//!
//! # Example
//!
//! ```rust,ignore
//! use aftercast::dispatcher::{LocalDistributor, WorkDistributor};
//!
//! let distributor = LocalDistributor::new();
//! loop {
//!     distributor.wait_for_work(Duration::from_secs(60)).await;
//!     if distributor.is_shutdown() {
//!         break;
//!     }
//!     dispatcher.run_once().await?;
//! }
//! ```

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::debug;

/// Trait for abstracting how the dispatcher waits for work.
#[async_trait]
pub trait WorkDistributor: Send + Sync {
    /// Wait until work might be available, or until `timeout` elapses.
    ///
    /// The caller should attempt a claim after this returns, handling the
    /// case where nothing is actually due.
    async fn wait_for_work(&self, timeout: Duration);

    /// Signals that new work was submitted.
    fn notify(&self);

    /// Signals that the distributor should stop waiting.
    ///
    /// After calling this, `wait_for_work` returns promptly.
    fn shutdown(&self);

    fn is_shutdown(&self) -> bool;
}

/// In-process distributor: submitters and the dispatcher share one
/// [`Notify`].
///
/// Wakes use `notify_one`, which stores a permit, so a submit that lands
/// between a claim attempt and the next wait is not lost.
pub struct LocalDistributor {
    notify: Arc<Notify>,
    shutdown: Arc<AtomicBool>,
}

impl LocalDistributor {
    pub fn new() -> Self {
        Self {
            notify: Arc::new(Notify::new()),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Default for LocalDistributor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkDistributor for LocalDistributor {
    async fn wait_for_work(&self, timeout: Duration) {
        if self.shutdown.load(Ordering::SeqCst) {
            return;
        }

        tokio::select! {
            _ = tokio::time::sleep(timeout) => {
                debug!(timeout_ms = timeout.as_millis() as u64, "Dispatcher wait elapsed");
            }
            _ = self.notify.notified() => {
                debug!("Dispatcher woken");
            }
        }
    }

    fn notify(&self) {
        self.notify.notify_one();
    }

    fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}
