// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Remote state verification
//!
//! Classifies (principal, permission set, target) triples against live
//! AccessAPI state. Used three times per rollback: at planning (drift
//! detection), immediately before each action (final drift re-check),
//! and after execution (post-state confirmation). Reads are single-shot
//! and tolerate eventual consistency; the verifier never retries or
//! mutates.

use crate::error::RollbackError;
use crate::store::OperationStore;
use crate::types::{
    AssignmentState, OperationFilter, OperationType, RollbackVerification,
};
use accessapi_client::{AccessApi, PermissionSet, Principal};
use std::sync::Arc;
use uuid::Uuid;

/// Read-only view of remote assignment state
#[derive(Clone)]
pub struct StateVerifier {
    client: Arc<dyn AccessApi>,
    store: Arc<dyn OperationStore>,
}

impl StateVerifier {
    pub fn new(client: Arc<dyn AccessApi>, store: Arc<dyn OperationStore>) -> Self {
        Self { client, store }
    }

    /// Classify the current remote state of one triple.
    ///
    /// `Foreign` means the permission set is live on the target but bound
    /// through a different principal or a re-provisioned permission set
    /// id -- a combination the engine cannot safely act on.
    pub async fn current_state(
        &self,
        principal: &Principal,
        permission_set: &PermissionSet,
        target_id: &str,
    ) -> Result<AssignmentState, RollbackError> {
        let assignments = self.client.list_assignments(target_id).await?;

        let exact = assignments.iter().any(|a| {
            a.principal_id == principal.id
                && a.principal_type == principal.kind
                && a.permission_set_id == permission_set.id
        });
        if exact {
            return Ok(AssignmentState::Assigned);
        }

        if let Some(related) = assignments.iter().find(|a| {
            a.permission_set_id == permission_set.id
                || a.permission_set_name == permission_set.name
        }) {
            return Ok(AssignmentState::Foreign {
                principal_id: related.principal_id.clone(),
                permission_set_id: related.permission_set_id.clone(),
            });
        }

        Ok(AssignmentState::NotAssigned)
    }

    /// Confirm that a completed rollback's targets hold the expected
    /// post-rollback state.
    ///
    /// Best-effort: the remote may drift again immediately after the
    /// read, so a clean verification is confidence, not a guarantee.
    /// Targets whose rollback action failed are not re-read; the
    /// execution result already reports them.
    pub async fn verify_rollback(
        &self,
        rollback_operation_id: Uuid,
    ) -> Result<RollbackVerification, RollbackError> {
        let rollback = self
            .store
            .get(rollback_operation_id)
            .await?
            .ok_or(RollbackError::OperationNotFound(rollback_operation_id))?;
        if rollback.operation_type != OperationType::Rollback {
            return Err(RollbackError::Validation {
                reasons: vec![format!(
                    "operation {} is a {} operation, not a rollback",
                    rollback_operation_id, rollback.operation_type
                )],
            });
        }

        // The source operation holds the back-reference; find it rather
        // than trusting caller-supplied metadata.
        let source = self
            .store
            .load(&OperationFilter::default())
            .await?
            .into_iter()
            .find(|r| r.rollback_operation_id == Some(rollback_operation_id))
            .ok_or_else(|| RollbackError::Validation {
                reasons: vec![format!(
                    "no operation references rollback {}",
                    rollback_operation_id
                )],
            })?;

        let expected = match source.operation_type {
            OperationType::Assign => AssignmentState::NotAssigned,
            OperationType::Revoke => AssignmentState::Assigned,
            OperationType::Rollback => {
                return Err(RollbackError::Validation {
                    reasons: vec![format!(
                        "operation {} is itself a rollback and has no defined post-state",
                        source.operation_id
                    )],
                });
            }
        };

        let mut verification = RollbackVerification {
            is_verified: true,
            verified_actions: 0,
            failed_verifications: 0,
            issues: Vec::new(),
        };

        for result in &rollback.results {
            if !result.success {
                continue;
            }
            let observed = self
                .current_state(&rollback.principal, &rollback.permission_set, &result.target_id)
                .await?;
            if observed == expected {
                verification.verified_actions += 1;
            } else {
                verification.failed_verifications += 1;
                verification.issues.push(format!(
                    "target {}: expected {}, found {}",
                    result.target_id, expected, observed
                ));
            }
        }

        verification.is_verified = verification.failed_verifications == 0;
        tracing::info!(
            rollback_operation_id = %rollback_operation_id,
            verified = verification.verified_actions,
            failed = verification.failed_verifications,
            "verified rollback post-state"
        );
        Ok(verification)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::MemoryOperationStore;
    use accessapi_client::PrincipalType;
    use accessapi_stub::StubAccessApi;

    fn principal() -> Principal {
        Principal {
            id: "u-1".to_string(),
            kind: PrincipalType::User,
            name: "alice".to_string(),
        }
    }

    fn permission_set() -> PermissionSet {
        PermissionSet {
            id: "ps-1".to_string(),
            name: "ops-admin".to_string(),
        }
    }

    fn verifier(stub: Arc<StubAccessApi>) -> StateVerifier {
        StateVerifier::new(stub, Arc::new(MemoryOperationStore::new()))
    }

    #[tokio::test]
    async fn exact_triple_is_assigned() {
        let stub = Arc::new(StubAccessApi::new());
        stub.add_permission_set("ps-1", "ops-admin");
        stub.seed_assignment("u-1", PrincipalType::User, "ps-1", "acct-a");

        let state = verifier(stub)
            .current_state(&principal(), &permission_set(), "acct-a")
            .await
            .unwrap();
        assert_eq!(state, AssignmentState::Assigned);
    }

    #[tokio::test]
    async fn absent_triple_is_not_assigned() {
        let stub = Arc::new(StubAccessApi::new());
        let state = verifier(stub)
            .current_state(&principal(), &permission_set(), "acct-a")
            .await
            .unwrap();
        assert_eq!(state, AssignmentState::NotAssigned);
    }

    #[tokio::test]
    async fn reassigned_permission_set_is_foreign() {
        let stub = Arc::new(StubAccessApi::new());
        stub.add_permission_set("ps-1", "ops-admin");
        stub.seed_assignment("g-9", PrincipalType::Group, "ps-1", "acct-a");

        let state = verifier(stub)
            .current_state(&principal(), &permission_set(), "acct-a")
            .await
            .unwrap();
        assert_eq!(
            state,
            AssignmentState::Foreign {
                principal_id: "g-9".to_string(),
                permission_set_id: "ps-1".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn unrelated_assignments_do_not_shadow() {
        let stub = Arc::new(StubAccessApi::new());
        stub.add_permission_set("ps-2", "read-only");
        stub.seed_assignment("u-1", PrincipalType::User, "ps-2", "acct-a");

        let state = verifier(stub)
            .current_state(&principal(), &permission_set(), "acct-a")
            .await
            .unwrap();
        assert_eq!(state, AssignmentState::NotAssigned);
    }
}
