// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Engine configuration

use std::time::Duration;

/// Tunable knobs for the rollback engine.
///
/// Constructed by the caller and passed into the planner and executor;
/// there is no ambient global configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Records older than this are eligible for cleanup
    pub retention_days: u32,

    /// Batch size used when the caller does not supply one
    pub default_batch_size: usize,

    /// Attempts per action before a transient failure becomes terminal
    pub max_attempts: u32,

    /// First retry delay; doubles per attempt
    pub retry_base_delay: Duration,

    /// Ceiling for the retry delay
    pub retry_max_delay: Duration,

    /// Assumed latency per rollback action, used only for the
    /// operator-facing plan ETA
    pub action_latency: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retention_days: 90,
            default_batch_size: 10,
            max_attempts: 3,
            retry_base_delay: Duration::from_millis(150),
            retry_max_delay: Duration::from_secs(2),
            action_latency: Duration::from_secs(2),
        }
    }
}
