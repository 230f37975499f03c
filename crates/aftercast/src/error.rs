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

//! Error types for every layer of the server.
//!
//! The layering mirrors the call graph: the record store raises
//! [`StoreError`], the timeline and relay layers wrap it, task handlers
//! return [`HandlerError`] for faults they cannot act on, and the dispatcher
//! surfaces [`DispatchError`]. Faults a handler *can* act on (stale commands,
//! transient external failures) never become errors; they are turned into
//! result codes instead.

use std::path::PathBuf;
use thiserror::Error;

use crate::external::ExternalFault;
use crate::models::RecordKind;

/// Errors raised by a [`RecordStore`](crate::database::RecordStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} record not found: {key}")]
    NotFound { kind: RecordKind, key: String },

    /// Optimistic append or update lost a race.
    #[error("Version conflict on {kind} {key}: expected {expected:?}, found {found:?}")]
    VersionConflict {
        kind: RecordKind,
        key: String,
        expected: Option<i64>,
        found: Option<i64>,
    },

    /// Access level or collection misuse. Never retried.
    #[error("Configuration violation: {0}")]
    ConfigurationViolation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection pool error: {0}")]
    ConnectionPool(String),

    #[error("Migration error: {0}")]
    Migration(String),
}

impl StoreError {
    pub fn is_configuration_violation(&self) -> bool {
        matches!(self, StoreError::ConfigurationViolation(_))
    }
}

#[cfg(feature = "sqlite")]
impl From<diesel::result::Error> for StoreError {
    fn from(err: diesel::result::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

/// A persisted payload that cannot be decoded.
#[derive(Debug, Error)]
#[error("Corrupt {kind} record {key}: {message}")]
pub struct CorruptRecord {
    pub kind: RecordKind,
    pub key: String,
    pub message: String,
}

impl CorruptRecord {
    pub fn new(kind: RecordKind, key: impl Into<String>, message: impl ToString) -> Self {
        Self {
            kind,
            key: key.into(),
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum TimelineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Corrupt(#[from] CorruptRecord),

    #[error("Timeline {event_id} has a sequence gap: expected {expected}, found {found}")]
    SequenceGap {
        event_id: String,
        expected: i64,
        found: i64,
    },

    #[error("Timeline {0} does not exist")]
    Missing(String),

    #[error("Timeline delta encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Corrupt(#[from] CorruptRecord),

    #[error("Relay item encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Faults a task handler could not turn into a result code.
///
/// The dispatcher logs these, keeps the task and retries it later, up to the
/// configured fault ceiling.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Timeline(#[from] TimelineError),

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error("External service fault: {0}")]
    External(#[from] ExternalFault),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Handler fault: {0}")]
    Fault(String),
}

impl HandlerError {
    /// Configuration violations are fatal to the operation and must not be
    /// retried.
    pub fn is_fatal(&self) -> bool {
        match self {
            HandlerError::Store(e) => e.is_configuration_violation(),
            HandlerError::Timeline(TimelineError::Store(e)) => e.is_configuration_violation(),
            HandlerError::Relay(RelayError::Store(e)) => e.is_configuration_violation(),
            HandlerError::Dispatch(DispatchError::Store(e)) => e.is_configuration_violation(),
            _ => false,
        }
    }

    /// A persisted timeline or relay record could not be read back. Retrying
    /// cannot help, so the task is discarded.
    pub fn is_corrupt_record(&self) -> bool {
        matches!(
            self,
            HandlerError::Timeline(TimelineError::Corrupt(_) | TimelineError::SequenceGap { .. })
                | HandlerError::Relay(RelayError::Corrupt(_))
        )
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Dispatcher is shutting down")]
    ShuttingDown,

    #[error("Payload encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse TOML configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for environment variable {var}: {value}")]
    Env { var: String, value: String },

    #[error("Configuration validation failed: {0}")]
    Invalid(String),
}
