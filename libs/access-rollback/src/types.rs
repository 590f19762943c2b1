// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Operation history and rollback types
//!
//! [`OperationRecord`] is the durable unit of history: one record per
//! mutating action taken against AccessAPI, written by the recorder and
//! never edited in place except for the single monotonic
//! `rolled_back: false -> true` transition. Everything else in this module
//! (plans, validations, results, verifications) is transient -- derived per
//! invocation and persisted only through its effects on the records.

use accessapi_client::{PermissionSet, Principal};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// The kind of mutating action a record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Assign,
    Revoke,
    /// A rollback of a prior operation; not itself invertible
    Rollback,
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationType::Assign => write!(f, "assign"),
            OperationType::Revoke => write!(f, "revoke"),
            OperationType::Rollback => write!(f, "rollback"),
        }
    }
}

/// Per-target outcome of an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    pub target_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// One recorded mutating action against AccessAPI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub operation_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub operation_type: OperationType,
    pub principal: Principal,
    pub permission_set: PermissionSet,
    /// Target ids the action applied to, parallel with `target_names`
    /// and `results`
    pub targets: Vec<String>,
    pub target_names: Vec<String>,
    pub results: Vec<OperationResult>,
    /// Free-form caller context (source command, input file, batch size).
    /// Informational only; the engine never interprets it.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub rolled_back: bool,
    /// Set iff `rolled_back`: the operation record written by the
    /// rollback that reversed this one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback_operation_id: Option<Uuid>,
}

impl OperationRecord {
    /// The recorded per-target result, if the target is part of this
    /// operation
    pub fn result_for(&self, target_id: &str) -> Option<&OperationResult> {
        self.results.iter().find(|r| r.target_id == target_id)
    }

    /// Display name for a target id, falling back to the id itself
    pub fn target_name(&self, target_id: &str) -> &str {
        self.targets
            .iter()
            .position(|t| t == target_id)
            .and_then(|i| self.target_names.get(i))
            .map(|s| s.as_str())
            .unwrap_or(target_id)
    }
}

/// Caller-supplied description of an operation to record.
///
/// Validated exhaustively by the recorder before a record is created;
/// malformed input never enters history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationInput {
    pub operation_type: OperationType,
    pub principal: Principal,
    pub permission_set: PermissionSet,
    pub targets: Vec<String>,
    pub target_names: Vec<String>,
    pub results: Vec<OperationResult>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Filters for listing operation records; all fields optional, matching
/// records satisfy every supplied field
#[derive(Debug, Clone, Default)]
pub struct OperationFilter {
    pub operation_type: Option<OperationType>,
    /// Substring match on the principal display name
    pub principal: Option<String>,
    /// Substring match on the permission set display name
    pub permission_set: Option<String>,
    /// Only records at most this many days old
    pub days: Option<u32>,
    pub rolled_back: Option<bool>,
    /// Exact match against any of the record's targets
    pub target: Option<String>,
}

impl OperationFilter {
    pub fn matches(&self, record: &OperationRecord, now: DateTime<Utc>) -> bool {
        if let Some(op_type) = self.operation_type {
            if record.operation_type != op_type {
                return false;
            }
        }
        if let Some(principal) = &self.principal {
            if !record.principal.name.contains(principal.as_str()) {
                return false;
            }
        }
        if let Some(permission_set) = &self.permission_set {
            if !record.permission_set.name.contains(permission_set.as_str()) {
                return false;
            }
        }
        if let Some(days) = self.days {
            if record.timestamp < now - chrono::Duration::days(i64::from(days)) {
                return false;
            }
        }
        if let Some(rolled_back) = self.rolled_back {
            if record.rolled_back != rolled_back {
                return false;
            }
        }
        if let Some(target) = &self.target {
            if !record.targets.iter().any(|t| t == target) {
                return false;
            }
        }
        true
    }
}

/// Partial update applied to a stored record. Only the rolled-back
/// transition is updatable; everything else is immutable after `save`.
#[derive(Debug, Clone, Default)]
pub struct OperationUpdate {
    pub rolled_back: Option<bool>,
    pub rollback_operation_id: Option<Uuid>,
}

/// The verifier's classification of a (principal, permission set, target)
/// triple against live remote state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AssignmentState {
    /// The exact triple is live
    Assigned,
    /// Nothing binds this permission set on the target
    NotAssigned,
    /// The permission set is bound on the target, but through a
    /// different principal or a re-provisioned permission set id; the
    /// engine cannot disambiguate this and will not touch it
    Foreign {
        principal_id: String,
        permission_set_id: String,
    },
}

impl std::fmt::Display for AssignmentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssignmentState::Assigned => write!(f, "assigned"),
            AssignmentState::NotAssigned => write!(f, "not assigned"),
            AssignmentState::Foreign {
                principal_id,
                permission_set_id,
            } => write!(
                f,
                "held by principal {} via permission set {}",
                principal_id, permission_set_id
            ),
        }
    }
}

/// The inverse verb a rollback action performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollbackActionType {
    Assign,
    Revoke,
}

impl std::fmt::Display for RollbackActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RollbackActionType::Assign => write!(f, "assign"),
            RollbackActionType::Revoke => write!(f, "revoke"),
        }
    }
}

/// One atomic inverse unit of a rollback plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackAction {
    pub principal: Principal,
    pub permission_set: PermissionSet,
    pub target_id: String,
    pub target_name: String,
    pub action_type: RollbackActionType,
    /// Remote state observed at planning time; re-checked immediately
    /// before execution to detect further drift
    pub current_state: AssignmentState,
}

/// A derived inverse-action list for one operation. Transient: only its
/// execution effects are persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackPlan {
    pub operation_id: Uuid,
    pub rollback_type: RollbackActionType,
    pub actions: Vec<RollbackAction>,
    /// Operator-facing ETA (action count x configured per-action
    /// latency), not a correctness guarantee
    pub estimated_duration_ms: u64,
    pub warnings: Vec<String>,
}

/// Result of pre-rollback validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Terminal state of one executed rollback action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ActionOutcome {
    Succeeded,
    /// State drifted between planning and execution; nothing was done
    Skipped { reason: String },
    /// The mutation failed after retries were exhausted
    Failed { error: String },
}

impl ActionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ActionOutcome::Succeeded)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, ActionOutcome::Skipped { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ActionOutcome::Failed { .. })
    }
}

/// Per-action detail of an executed rollback
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub target_id: String,
    pub target_name: String,
    pub outcome: ActionOutcome,
    pub duration_ms: u64,
}

/// Aggregate outcome of a rollback execution.
///
/// `success` is true only when no action failed; skipped actions do not
/// count against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackResult {
    pub success: bool,
    pub dry_run: bool,
    /// The history record written for this rollback (absent on dry runs
    /// and empty plans)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback_operation_id: Option<Uuid>,
    pub successful_actions: usize,
    pub skipped_actions: usize,
    pub failed_actions: usize,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub actions: Vec<ActionResult>,
}

/// Post-execution confidence check over a rollback's targets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackVerification {
    pub is_verified: bool,
    pub verified_actions: usize,
    pub failed_verifications: usize,
    pub issues: Vec<String>,
}
