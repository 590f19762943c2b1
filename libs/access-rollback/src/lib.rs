// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Operation history and rollback engine for AccessAPI
//!
//! Every mutating action the tooling takes against AccessAPI (assigning
//! or revoking a permission set for a principal across targets) is
//! recorded durably. This library derives and executes safe inverses of
//! those recorded actions:
//!
//! - [`store`] -- persistence contract plus the file-backed default
//!   backend (one JSON file per record, atomic writes)
//! - [`recorder`] -- validated appends, the monotonic rolled-back
//!   transition, retention cleanup
//! - [`planner`] -- inverse-action derivation with per-target drift
//!   detection against live remote state
//! - [`executor`] -- batched concurrent execution with bounded retries,
//!   partial-failure tolerance, and dry-run support
//! - [`verifier`] -- remote state classification and post-rollback
//!   confirmation
//!
//! # Rollback lifecycle
//!
//! ```ignore
//! let store = Arc::new(FileOperationStore::open(&dir)?);
//! let recorder = OperationRecorder::new(store.clone());
//! let verifier = StateVerifier::new(client.clone(), store.clone());
//! let planner = RollbackPlanner::new(recorder.clone(), verifier.clone(), config.clone());
//! let executor = RollbackExecutor::new(client, verifier.clone(), recorder.clone(), config);
//!
//! let validation = planner.validate_rollback(operation_id).await?;
//! if validation.is_valid {
//!     let plan = planner.generate_plan(operation_id).await?;
//!     let result = executor.execute_rollback(&plan, false, 10).await?;
//!     let check = verifier.verify_rollback(result.rollback_operation_id.unwrap()).await?;
//! }
//! ```
//!
//! A rollback never edits history: the execution is logged as a new
//! `rollback`-type operation and the source record is flipped to
//! rolled-back exactly once, forming an append-only causal chain. The
//! engine tolerates an externally-mutable remote -- targets whose state
//! drifted to the goal are skipped, conflicting reassignments are
//! excluded for manual resolution, and re-running a rollback fails fast
//! rather than double-applying.
//!
//! All components are plain service objects over `Arc` seams; construct
//! them per process (or per test) and pass them down -- there is no
//! global state.

pub mod config;
pub mod error;
pub mod executor;
pub mod planner;
pub mod recorder;
pub mod store;
pub mod types;
pub mod verifier;

pub use config::EngineConfig;
pub use error::RollbackError;
pub use executor::{MAX_BATCH_SIZE, MIN_BATCH_SIZE, RollbackExecutor};
pub use planner::RollbackPlanner;
pub use recorder::OperationRecorder;
pub use store::{FileOperationStore, MemoryOperationStore, OperationStore};
pub use types::{
    ActionOutcome, ActionResult, AssignmentState, OperationFilter, OperationInput,
    OperationRecord, OperationResult, OperationType, OperationUpdate, RollbackAction,
    RollbackActionType, RollbackPlan, RollbackResult, RollbackValidation, RollbackVerification,
};
pub use verifier::StateVerifier;
