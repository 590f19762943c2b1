// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Rollback planning
//!
//! Derives an inverse-action list for a recorded operation, cross-checking
//! every target against current remote state. Global precondition failures
//! (missing operation, already rolled back, non-invertible type) block the
//! whole plan; per-target drift never does -- a target whose goal state is
//! already satisfied becomes a warning and a skip, and a target in a
//! conflicting state is excluded from the plan for manual resolution.

use crate::config::EngineConfig;
use crate::error::RollbackError;
use crate::recorder::OperationRecorder;
use crate::types::{
    AssignmentState, OperationRecord, OperationType, RollbackAction, RollbackActionType,
    RollbackPlan, RollbackValidation,
};
use crate::verifier::StateVerifier;

/// Per-target assessment outcome during planning
enum TargetDisposition {
    /// Remote state still reflects the original action; an inverse
    /// action is required
    NeedsAction(AssignmentState),
    /// The goal state already holds
    AlreadySatisfied,
    /// The triple is bound through a combination the engine cannot
    /// disambiguate
    Conflicted(AssignmentState),
    /// The original action failed on this target, so there is nothing
    /// to undo
    OriginalFailed,
}

/// Derives and validates rollback plans
#[derive(Clone)]
pub struct RollbackPlanner {
    recorder: OperationRecorder,
    verifier: StateVerifier,
    config: EngineConfig,
}

impl RollbackPlanner {
    pub fn new(recorder: OperationRecorder, verifier: StateVerifier, config: EngineConfig) -> Self {
        Self {
            recorder,
            verifier,
            config,
        }
    }

    /// Check whether `operation_id` can be rolled back.
    ///
    /// Global precondition failures are reported through
    /// `RollbackValidation::errors` with `is_valid = false`; per-target
    /// findings land in `warnings`. Only store or AccessAPI failures
    /// return `Err`.
    pub async fn validate_rollback(
        &self,
        operation_id: uuid::Uuid,
    ) -> Result<RollbackValidation, RollbackError> {
        let record = match self.load_invertible(operation_id).await {
            Ok(record) => record,
            Err(
                err @ (RollbackError::OperationNotFound(_)
                | RollbackError::AlreadyRolledBack(_)
                | RollbackError::Validation { .. }),
            ) => {
                return Ok(RollbackValidation {
                    is_valid: false,
                    errors: vec![err.to_string()],
                    warnings: Vec::new(),
                });
            }
            Err(err) => return Err(err),
        };

        let mut warnings = Vec::new();
        for target_id in &record.targets {
            if let Some(warning) = self
                .assess_target(&record, target_id)
                .await?
                .into_warning(&record, target_id)
            {
                warnings.push(warning);
            }
        }

        Ok(RollbackValidation {
            is_valid: true,
            errors: Vec::new(),
            warnings,
        })
    }

    /// Derive the inverse-action list for `operation_id`.
    ///
    /// Unlike [`validate_rollback`](Self::validate_rollback), global
    /// precondition failures here are terminal errors: no plan is
    /// produced for a missing, already-rolled-back, or non-invertible
    /// operation.
    pub async fn generate_plan(
        &self,
        operation_id: uuid::Uuid,
    ) -> Result<RollbackPlan, RollbackError> {
        let record = self.load_invertible(operation_id).await?;
        let rollback_type = inverse_of(record.operation_type);

        let mut actions = Vec::new();
        let mut warnings = Vec::new();
        for target_id in &record.targets {
            match self.assess_target(&record, target_id).await? {
                TargetDisposition::NeedsAction(current_state) => {
                    actions.push(RollbackAction {
                        principal: record.principal.clone(),
                        permission_set: record.permission_set.clone(),
                        target_id: target_id.clone(),
                        target_name: record.target_name(target_id).to_string(),
                        action_type: rollback_type,
                        current_state,
                    });
                }
                disposition => {
                    if let Some(warning) = disposition.into_warning(&record, target_id) {
                        warnings.push(warning);
                    }
                }
            }
        }

        let estimated_duration_ms =
            actions.len() as u64 * self.config.action_latency.as_millis() as u64;
        tracing::info!(
            operation_id = %operation_id,
            actions = actions.len(),
            warnings = warnings.len(),
            "generated rollback plan"
        );

        Ok(RollbackPlan {
            operation_id,
            rollback_type,
            actions,
            estimated_duration_ms,
            warnings,
        })
    }

    /// Load the operation and assert the global rollback preconditions
    async fn load_invertible(
        &self,
        operation_id: uuid::Uuid,
    ) -> Result<OperationRecord, RollbackError> {
        let record = self
            .recorder
            .get_operation(operation_id)
            .await?
            .ok_or(RollbackError::OperationNotFound(operation_id))?;
        if record.rolled_back {
            return Err(RollbackError::AlreadyRolledBack(operation_id));
        }
        if record.operation_type == OperationType::Rollback {
            return Err(RollbackError::Validation {
                reasons: vec![format!(
                    "operation {} is a rollback and cannot itself be rolled back",
                    operation_id
                )],
            });
        }
        Ok(record)
    }

    async fn assess_target(
        &self,
        record: &OperationRecord,
        target_id: &str,
    ) -> Result<TargetDisposition, RollbackError> {
        if record
            .result_for(target_id)
            .is_some_and(|result| !result.success)
        {
            return Ok(TargetDisposition::OriginalFailed);
        }

        let state = self
            .verifier
            .current_state(&record.principal, &record.permission_set, target_id)
            .await?;

        Ok(match (inverse_of(record.operation_type), &state) {
            // Undoing an assign: the binding must still be live.
            (RollbackActionType::Revoke, AssignmentState::Assigned) => {
                TargetDisposition::NeedsAction(state)
            }
            (RollbackActionType::Revoke, AssignmentState::NotAssigned) => {
                TargetDisposition::AlreadySatisfied
            }
            // Undoing a revoke: the binding must still be absent.
            (RollbackActionType::Assign, AssignmentState::NotAssigned) => {
                TargetDisposition::NeedsAction(state)
            }
            (RollbackActionType::Assign, AssignmentState::Assigned) => {
                TargetDisposition::AlreadySatisfied
            }
            (_, AssignmentState::Foreign { .. }) => TargetDisposition::Conflicted(state),
        })
    }
}

impl TargetDisposition {
    fn into_warning(self, record: &OperationRecord, target_id: &str) -> Option<String> {
        match self {
            TargetDisposition::NeedsAction(_) => None,
            TargetDisposition::AlreadySatisfied => Some(format!(
                "target {}: rollback goal already satisfied; will be skipped",
                target_id
            )),
            TargetDisposition::Conflicted(state) => Some(format!(
                "target {}: {}; requires manual resolution and is excluded from the plan",
                target_id, state
            )),
            TargetDisposition::OriginalFailed => Some(format!(
                "target {}: original {} did not succeed; nothing to roll back",
                target_id, record.operation_type
            )),
        }
    }
}

fn inverse_of(operation_type: OperationType) -> RollbackActionType {
    match operation_type {
        OperationType::Assign => RollbackActionType::Revoke,
        OperationType::Revoke => RollbackActionType::Assign,
        // Guarded by load_invertible; a rollback record never reaches
        // plan derivation.
        OperationType::Rollback => RollbackActionType::Assign,
    }
}
