// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Error types for the rollback engine

use accessapi_client::ClientError;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the rollback engine.
///
/// Expected per-target outcomes (drift, skips, per-action failures) are
/// modelled as values in the result types, not as errors; this enum covers
/// the terminal conditions that abort an engine call.
#[derive(Error, Debug)]
pub enum RollbackError {
    /// No operation with this id exists in the store
    #[error("operation not found: {0}")]
    OperationNotFound(Uuid),

    /// The operation has already been rolled back and may not be rolled
    /// back again
    #[error("operation {0} has already been rolled back")]
    AlreadyRolledBack(Uuid),

    /// Remote state no longer matches what the engine expected
    #[error("remote state mismatch: expected {expected}, found {actual}")]
    StateMismatch { expected: String, actual: String },

    /// The operation input was rejected at the recording boundary
    #[error("invalid operation input: {}", .reasons.join("; "))]
    Validation { reasons: Vec<String> },

    /// The operation store failed; callers must not assume partial
    /// writes succeeded
    #[error("operation store error: {0}")]
    Storage(String),

    /// AccessAPI call failed
    #[error(transparent)]
    Client(#[from] ClientError),
}

impl RollbackError {
    pub(crate) fn storage_io(context: &str, err: std::io::Error) -> Self {
        RollbackError::Storage(format!("{}: {}", context, err))
    }
}
