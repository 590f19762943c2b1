// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! End-to-end rollback engine scenarios
//!
//! Drives the full recorder -> planner -> executor -> verifier chain
//! against the in-memory AccessAPI stub and the file-backed store, the
//! way the CLI wires the engine in production.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use access_rollback::{
    EngineConfig, FileOperationStore, OperationFilter, OperationInput, OperationRecorder,
    OperationResult, OperationType, RollbackActionType, RollbackError, RollbackExecutor,
    RollbackPlanner, StateVerifier,
};
use accessapi_client::{PermissionSet, Principal, PrincipalType};
use accessapi_stub::StubAccessApi;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

struct Harness {
    _dir: tempfile::TempDir,
    stub: Arc<StubAccessApi>,
    recorder: OperationRecorder,
    planner: RollbackPlanner,
    executor: RollbackExecutor,
    verifier: StateVerifier,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(FileOperationStore::open(dir.path()).expect("open store"));

    let stub = Arc::new(StubAccessApi::new());
    stub.add_principal("u-1", PrincipalType::User, "alice");
    stub.add_permission_set("ps-1", "ops-admin");
    stub.add_target("acct-a", "alpha");
    stub.add_target("acct-b", "bravo");
    stub.add_target("acct-c", "charlie");

    let config = EngineConfig {
        retry_base_delay: std::time::Duration::from_millis(1),
        retry_max_delay: std::time::Duration::from_millis(2),
        ..EngineConfig::default()
    };

    let recorder = OperationRecorder::new(store.clone());
    let verifier = StateVerifier::new(stub.clone(), store.clone());
    let planner = RollbackPlanner::new(recorder.clone(), verifier.clone(), config.clone());
    let executor = RollbackExecutor::new(stub.clone(), verifier.clone(), recorder.clone(), config);

    Harness {
        _dir: dir,
        stub,
        recorder,
        planner,
        executor,
        verifier,
    }
}

fn assign_input(targets: &[(&str, &str)]) -> OperationInput {
    OperationInput {
        operation_type: OperationType::Assign,
        principal: Principal {
            id: "u-1".to_string(),
            kind: PrincipalType::User,
            name: "alice".to_string(),
        },
        permission_set: PermissionSet {
            id: "ps-1".to_string(),
            name: "ops-admin".to_string(),
        },
        targets: targets.iter().map(|(id, _)| id.to_string()).collect(),
        target_names: targets.iter().map(|(_, name)| name.to_string()).collect(),
        results: targets
            .iter()
            .map(|(id, _)| OperationResult {
                target_id: id.to_string(),
                success: true,
                error: None,
                duration_ms: Some(30),
            })
            .collect(),
        metadata: BTreeMap::from([(
            "source".to_string(),
            "accessadm assign".to_string(),
        )]),
    }
}

/// Record an assign operation and seed the matching remote state
async fn recorded_assign(h: &Harness, targets: &[(&str, &str)]) -> Uuid {
    for (id, _) in targets {
        h.stub.seed_assignment("u-1", PrincipalType::User, "ps-1", id);
    }
    h.recorder
        .log_operation(assign_input(targets))
        .await
        .expect("log operation")
}

#[tokio::test]
async fn logged_operations_read_back_faithfully() {
    let h = harness();
    let input = assign_input(&[("acct-a", "alpha"), ("acct-b", "bravo")]);
    let id = h.recorder.log_operation(input.clone()).await.unwrap();

    let record = h.recorder.get_operation(id).await.unwrap().unwrap();
    assert_eq!(record.operation_type, input.operation_type);
    assert_eq!(record.principal, input.principal);
    assert_eq!(record.permission_set, input.permission_set);
    assert_eq!(record.targets, input.targets);
    assert_eq!(record.target_names, input.target_names);
    assert_eq!(record.results, input.results);
    assert_eq!(record.metadata, input.metadata);
    assert!(!record.rolled_back);
}

// Scenario: a clean two-target assign rolls back completely.
#[tokio::test]
async fn clean_assign_rolls_back_both_targets() {
    let h = harness();
    let id = recorded_assign(&h, &[("acct-a", "alpha"), ("acct-b", "bravo")]).await;

    let plan = h.planner.generate_plan(id).await.unwrap();
    assert_eq!(plan.rollback_type, RollbackActionType::Revoke);
    assert_eq!(plan.actions.len(), 2);

    let result = h.executor.execute_rollback(&plan, false, 10).await.unwrap();
    assert!(result.success);
    assert_eq!(result.successful_actions, 2);
    assert_eq!(result.failed_actions, 0);
    assert!(!h.stub.has_assignment("u-1", "ps-1", "acct-a"));
    assert!(!h.stub.has_assignment("u-1", "ps-1", "acct-b"));

    // Post-state verification confirms both targets.
    let verification = h
        .verifier
        .verify_rollback(result.rollback_operation_id.unwrap())
        .await
        .unwrap();
    assert!(verification.is_verified);
    assert_eq!(verification.verified_actions, 2);
    assert!(verification.issues.is_empty());
}

// Scenario: drift before re-planning shrinks the plan, never fails it.
#[tokio::test]
async fn external_drift_shrinks_the_plan() {
    let h = harness();
    let id = recorded_assign(&h, &[("acct-a", "alpha"), ("acct-b", "bravo")]).await;

    // Another operator removes acct-a's binding before we plan.
    h.stub.remove_assignment("u-1", "ps-1", "acct-a");

    let plan = h.planner.generate_plan(id).await.unwrap();
    assert_eq!(plan.actions.len(), 1);
    assert_eq!(plan.actions[0].target_id, "acct-b");
    assert_eq!(plan.warnings.len(), 1);
    assert!(plan.warnings[0].contains("acct-a"));

    let result = h.executor.execute_rollback(&plan, false, 10).await.unwrap();
    assert!(result.success);
    assert_eq!(result.successful_actions, 1);
    assert_eq!(result.failed_actions, 0);
}

// Scenario: a rollback cannot be applied twice.
#[tokio::test]
async fn second_rollback_attempt_fails_before_building_a_plan() {
    let h = harness();
    let id = recorded_assign(&h, &[("acct-a", "alpha")]).await;

    let plan = h.planner.generate_plan(id).await.unwrap();
    h.executor.execute_rollback(&plan, false, 10).await.unwrap();

    let err = h.planner.generate_plan(id).await.unwrap_err();
    assert!(matches!(err, RollbackError::AlreadyRolledBack(found) if found == id));

    let validation = h.planner.validate_rollback(id).await.unwrap();
    assert!(!validation.is_valid);
    assert!(validation.errors[0].contains("already been rolled back"));
}

// Scenario: one target rate-limits until retries exhaust; the others
// complete and the command still reports them.
#[tokio::test]
async fn transient_failure_on_one_target_spares_the_rest() {
    let h = harness();
    let id = recorded_assign(
        &h,
        &[("acct-a", "alpha"), ("acct-b", "bravo"), ("acct-c", "charlie")],
    )
    .await;
    let plan = h.planner.generate_plan(id).await.unwrap();

    h.stub.fail_mutations("acct-b", 10, true);

    let result = h.executor.execute_rollback(&plan, false, 10).await.unwrap();
    assert!(!result.success);
    assert_eq!(result.successful_actions, 2);
    assert_eq!(result.failed_actions, 1);
    assert!(!h.stub.has_assignment("u-1", "ps-1", "acct-a"));
    assert!(h.stub.has_assignment("u-1", "ps-1", "acct-b"));
    assert!(!h.stub.has_assignment("u-1", "ps-1", "acct-c"));
}

#[tokio::test]
async fn dry_run_previews_the_same_plan_without_side_effects() {
    let h = harness();
    let id = recorded_assign(&h, &[("acct-a", "alpha"), ("acct-b", "bravo")]).await;
    let plan = h.planner.generate_plan(id).await.unwrap();

    let preview = h.executor.execute_rollback(&plan, true, 10).await.unwrap();
    assert!(preview.dry_run);
    assert_eq!(preview.successful_actions, 2);
    assert_eq!(h.stub.mutation_calls(), 0);

    // The real run still works afterwards.
    let result = h.executor.execute_rollback(&plan, false, 10).await.unwrap();
    assert!(result.success);
    assert_eq!(result.successful_actions, 2);
}

#[tokio::test]
async fn cleanup_at_zero_days_empties_the_store() {
    let h = harness();
    recorded_assign(&h, &[("acct-a", "alpha")]).await;
    recorded_assign(&h, &[("acct-b", "bravo")]).await;

    let removed = h.recorder.cleanup_old_operations(0).await.unwrap();
    assert_eq!(removed, 2);
    assert!(
        h.recorder
            .get_operations(&OperationFilter::default())
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn rollback_history_survives_filtered_listing() {
    let h = harness();
    let id = recorded_assign(&h, &[("acct-a", "alpha")]).await;
    let plan = h.planner.generate_plan(id).await.unwrap();
    let result = h.executor.execute_rollback(&plan, false, 10).await.unwrap();

    let rollbacks = h
        .recorder
        .get_operations(&OperationFilter {
            operation_type: Some(OperationType::Rollback),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(rollbacks.len(), 1);
    assert_eq!(
        rollbacks[0].operation_id,
        result.rollback_operation_id.unwrap()
    );

    let rolled_back = h
        .recorder
        .get_operations(&OperationFilter {
            rolled_back: Some(true),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(rolled_back.len(), 1);
    assert_eq!(rolled_back[0].operation_id, id);
}
