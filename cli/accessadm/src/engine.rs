// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Rollback engine wiring
//!
//! Builds the engine's service objects over the file-backed operation
//! store under the configured history directory. History-only commands
//! (list, status, cleanup) need just the recorder; apply needs the full
//! set and therefore an authenticated client.

use crate::config::paths;
use access_rollback::{
    EngineConfig, FileOperationStore, OperationRecorder, OperationStore, RollbackExecutor,
    RollbackPlanner, StateVerifier,
};
use accessapi_client::AccessApi;
use anyhow::{Context, Result};
use std::sync::Arc;

/// The fully-wired rollback engine
pub struct Engine {
    pub recorder: OperationRecorder,
    pub planner: RollbackPlanner,
    pub executor: RollbackExecutor,
    pub verifier: StateVerifier,
}

fn open_store() -> Result<Arc<dyn OperationStore>> {
    let dir = paths::history_dir();
    let store = FileOperationStore::open(&dir)
        .with_context(|| format!("Failed to open operation history at {}", dir.display()))?;
    Ok(Arc::new(store))
}

/// Build just the recorder, for commands that only touch history
pub fn build_recorder() -> Result<OperationRecorder> {
    Ok(OperationRecorder::new(open_store()?))
}

/// Build the full engine over an authenticated AccessAPI client
pub fn build(client: Arc<dyn AccessApi>) -> Result<Engine> {
    let store = open_store()?;
    let config = EngineConfig::default();

    let recorder = OperationRecorder::new(store.clone());
    let verifier = StateVerifier::new(client.clone(), store);
    let planner = RollbackPlanner::new(recorder.clone(), verifier.clone(), config.clone());
    let executor = RollbackExecutor::new(client, verifier.clone(), recorder.clone(), config);

    Ok(Engine {
        recorder,
        planner,
        executor,
        verifier,
    })
}
