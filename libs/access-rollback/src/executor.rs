// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Rollback execution
//!
//! Runs a plan's inverse actions against AccessAPI in bounded batches:
//! actions within a batch execute concurrently, batches execute
//! sequentially, which caps peak in-flight calls against the service.
//! Every action is independently re-checked for drift, retried on
//! transient failures with exponential backoff, and reported
//! individually -- one stuck or failing target never aborts its siblings,
//! and the executor always drains the full plan.
//!
//! On completion the execution itself is recorded as a new operation and
//! the source operation's rolled-back flag is flipped; that final linking
//! step is the point of no return. If it fails after mutations have
//! landed, the error says so explicitly -- the remote is NOT rolled
//! forward again.

use crate::config::EngineConfig;
use crate::error::RollbackError;
use crate::recorder::OperationRecorder;
use crate::types::{
    ActionOutcome, ActionResult, OperationInput, OperationResult, OperationType, RollbackAction,
    RollbackActionType, RollbackPlan, RollbackResult,
};
use crate::verifier::StateVerifier;
use accessapi_client::{AccessApi, ClientError};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// Bounds on the per-batch action count; caller-supplied sizes are
/// clamped into this range
pub const MIN_BATCH_SIZE: usize = 1;
pub const MAX_BATCH_SIZE: usize = 20;

/// Executes rollback plans against AccessAPI
#[derive(Clone)]
pub struct RollbackExecutor {
    client: Arc<dyn AccessApi>,
    verifier: StateVerifier,
    recorder: OperationRecorder,
    config: EngineConfig,
}

impl RollbackExecutor {
    pub fn new(
        client: Arc<dyn AccessApi>,
        verifier: StateVerifier,
        recorder: OperationRecorder,
        config: EngineConfig,
    ) -> Self {
        Self {
            client,
            verifier,
            recorder,
            config,
        }
    }

    /// Execute `plan`. With `dry_run` every step runs -- validation,
    /// batching, the per-action drift re-check -- except the mutating
    /// call and the history writes, so the preview is accurate.
    ///
    /// `batch_size` is clamped into
    /// [`MIN_BATCH_SIZE`]..=[`MAX_BATCH_SIZE`].
    pub async fn execute_rollback(
        &self,
        plan: &RollbackPlan,
        dry_run: bool,
        batch_size: usize,
    ) -> Result<RollbackResult, RollbackError> {
        let started = Instant::now();

        // Re-assert the rolled-back precondition before the first remote
        // call; a concurrent apply may have won since planning.
        let source = self
            .recorder
            .get_operation(plan.operation_id)
            .await?
            .ok_or(RollbackError::OperationNotFound(plan.operation_id))?;
        if source.rolled_back {
            return Err(RollbackError::AlreadyRolledBack(plan.operation_id));
        }

        let clamped = batch_size.clamp(MIN_BATCH_SIZE, MAX_BATCH_SIZE);
        if clamped != batch_size {
            tracing::debug!(batch_size, clamped, "clamped rollback batch size");
        }

        tracing::info!(
            operation_id = %plan.operation_id,
            actions = plan.actions.len(),
            batch_size = clamped,
            dry_run,
            "executing rollback plan"
        );

        let mut slots: Vec<Option<ActionResult>> = vec![None; plan.actions.len()];
        for (batch_index, batch) in plan.actions.chunks(clamped).enumerate() {
            let mut tasks = tokio::task::JoinSet::new();
            for (offset, action) in batch.iter().enumerate() {
                let index = batch_index * clamped + offset;
                let action = action.clone();
                let client = Arc::clone(&self.client);
                let verifier = self.verifier.clone();
                let config = self.config.clone();
                tasks.spawn(async move {
                    (index, run_action(client, verifier, config, action, dry_run).await)
                });
            }

            // Batch N+1 does not start until batch N fully drains.
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((index, result)) => slots[index] = Some(result),
                    Err(err) => {
                        tracing::error!(error = %err, "rollback action task did not complete");
                    }
                }
            }
            tracing::debug!(batch = batch_index, "rollback batch drained");
        }

        let actions: Vec<ActionResult> = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| ActionResult {
                    target_id: plan.actions[index].target_id.clone(),
                    target_name: plan.actions[index].target_name.clone(),
                    outcome: ActionOutcome::Failed {
                        error: "action task did not complete".to_string(),
                    },
                    duration_ms: 0,
                })
            })
            .collect();

        let successful_actions = actions.iter().filter(|a| a.outcome.is_success()).count();
        let skipped_actions = actions.iter().filter(|a| a.outcome.is_skipped()).count();
        let failed_actions = actions.iter().filter(|a| a.outcome.is_failure()).count();
        let duration_ms = started.elapsed().as_millis() as u64;
        let error_message =
            (failed_actions > 0).then(|| format!("{} rollback action(s) failed", failed_actions));

        if dry_run || actions.is_empty() {
            // Nothing was mutated (dry run) or nothing needed doing
            // (fully-drifted plan); either way there is no history to
            // write and the source operation keeps its flag.
            return Ok(RollbackResult {
                success: failed_actions == 0,
                dry_run,
                rollback_operation_id: None,
                successful_actions,
                skipped_actions,
                failed_actions,
                duration_ms,
                error_message,
                actions,
            });
        }

        let rollback_operation_id = self
            .commit_history(plan, clamped, &actions)
            .await?;

        tracing::info!(
            operation_id = %plan.operation_id,
            rollback_operation_id = %rollback_operation_id,
            successful = successful_actions,
            skipped = skipped_actions,
            failed = failed_actions,
            "rollback execution complete"
        );

        Ok(RollbackResult {
            success: failed_actions == 0,
            dry_run: false,
            rollback_operation_id: Some(rollback_operation_id),
            successful_actions,
            skipped_actions,
            failed_actions,
            duration_ms: started.elapsed().as_millis() as u64,
            error_message,
            actions,
        })
    }

    /// Record the execution as a new operation and flip the source's
    /// rolled-back flag. Failures past this point mean remote mutations
    /// have landed but history does not reflect them; the returned error
    /// says so.
    async fn commit_history(
        &self,
        plan: &RollbackPlan,
        batch_size: usize,
        actions: &[ActionResult],
    ) -> Result<uuid::Uuid, RollbackError> {
        let reference = &plan.actions[0];
        let mut metadata = BTreeMap::new();
        metadata.insert("source".to_string(), "rollback".to_string());
        metadata.insert("rollback_of".to_string(), plan.operation_id.to_string());
        metadata.insert("batch_size".to_string(), batch_size.to_string());

        let input = OperationInput {
            operation_type: OperationType::Rollback,
            principal: reference.principal.clone(),
            permission_set: reference.permission_set.clone(),
            targets: actions.iter().map(|a| a.target_id.clone()).collect(),
            target_names: actions.iter().map(|a| a.target_name.clone()).collect(),
            results: actions
                .iter()
                .map(|a| OperationResult {
                    target_id: a.target_id.clone(),
                    success: !a.outcome.is_failure(),
                    error: match &a.outcome {
                        ActionOutcome::Failed { error } => Some(error.clone()),
                        _ => None,
                    },
                    duration_ms: Some(a.duration_ms),
                })
                .collect(),
            metadata,
        };

        let rollback_operation_id = self
            .recorder
            .log_operation(input)
            .await
            .map_err(|e| commit_failure(plan, &e))?;
        self.recorder
            .mark_rolled_back(plan.operation_id, rollback_operation_id)
            .await
            .map_err(|e| commit_failure(plan, &e))?;
        Ok(rollback_operation_id)
    }
}

fn commit_failure(plan: &RollbackPlan, err: &RollbackError) -> RollbackError {
    RollbackError::Storage(format!(
        "rollback of {} executed but its history could not be committed ({}); \
         remote mutations already applied were NOT reverted and require \
         manual reconciliation",
        plan.operation_id, err
    ))
}

async fn run_action(
    client: Arc<dyn AccessApi>,
    verifier: StateVerifier,
    config: EngineConfig,
    action: RollbackAction,
    dry_run: bool,
) -> ActionResult {
    let started = Instant::now();
    let outcome = action_outcome(client, verifier, config, &action, dry_run).await;
    ActionResult {
        target_id: action.target_id,
        target_name: action.target_name,
        outcome,
        duration_ms: started.elapsed().as_millis() as u64,
    }
}

async fn action_outcome(
    client: Arc<dyn AccessApi>,
    verifier: StateVerifier,
    config: EngineConfig,
    action: &RollbackAction,
    dry_run: bool,
) -> ActionOutcome {
    // Final drift re-check against the planning-time snapshot.
    let observed = match verifier
        .current_state(&action.principal, &action.permission_set, &action.target_id)
        .await
    {
        Ok(state) => state,
        Err(err) => {
            return ActionOutcome::Failed {
                error: format!("pre-execution state check failed: {}", err),
            };
        }
    };
    if observed != action.current_state {
        let mismatch = RollbackError::StateMismatch {
            expected: action.current_state.to_string(),
            actual: observed.to_string(),
        };
        tracing::debug!(
            target_id = %action.target_id,
            expected = %action.current_state,
            observed = %observed,
            "skipping drifted rollback action"
        );
        return ActionOutcome::Skipped {
            reason: format!("state drifted since planning: {}", mismatch),
        };
    }

    if dry_run {
        return ActionOutcome::Succeeded;
    }

    apply_with_retry(client, config, action).await
}

async fn apply_with_retry(
    client: Arc<dyn AccessApi>,
    config: EngineConfig,
    action: &RollbackAction,
) -> ActionOutcome {
    let mut delay = config.retry_base_delay;
    let mut attempt = 1u32;

    loop {
        let result = match action.action_type {
            RollbackActionType::Revoke => {
                client
                    .delete_assignment(
                        &action.principal.id,
                        action.principal.kind,
                        &action.permission_set.id,
                        &action.target_id,
                    )
                    .await
            }
            RollbackActionType::Assign => {
                client
                    .create_assignment(
                        &action.principal.id,
                        action.principal.kind,
                        &action.permission_set.id,
                        &action.target_id,
                    )
                    .await
            }
        };

        match result {
            Ok(()) => return ActionOutcome::Succeeded,
            // The binding vanished between the re-check and the call;
            // the goal state already holds.
            Err(ClientError::Api { status: 404, .. })
                if action.action_type == RollbackActionType::Revoke =>
            {
                return ActionOutcome::Skipped {
                    reason: "assignment already absent at execution time".to_string(),
                };
            }
            Err(err) if err.is_transient() && attempt < config.max_attempts => {
                tracing::warn!(
                    target_id = %action.target_id,
                    attempt,
                    error = %err,
                    "transient failure, retrying rollback action"
                );
                let jitter = std::time::Duration::from_millis(rand::random_range(0..50));
                tokio::time::sleep(delay + jitter).await;
                delay = std::cmp::min(delay * 2, config.retry_max_delay);
                attempt += 1;
            }
            Err(err) => {
                tracing::warn!(
                    target_id = %action.target_id,
                    attempts = attempt,
                    error = %err,
                    "rollback action failed"
                );
                return ActionOutcome::Failed {
                    error: format!("{} (after {} attempt(s))", err, attempt),
                };
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::planner::RollbackPlanner;
    use crate::store::{MemoryOperationStore, OperationStore};
    use crate::types::{OperationFilter, OperationInput, OperationResult};
    use accessapi_client::{PermissionSet, Principal, PrincipalType};
    use accessapi_stub::StubAccessApi;
    use uuid::Uuid;

    struct Fixture {
        stub: Arc<StubAccessApi>,
        store: Arc<MemoryOperationStore>,
        recorder: OperationRecorder,
        planner: RollbackPlanner,
        executor: RollbackExecutor,
    }

    fn fixture() -> Fixture {
        fixture_with_config(fast_config())
    }

    fn fast_config() -> EngineConfig {
        EngineConfig {
            retry_base_delay: std::time::Duration::from_millis(1),
            retry_max_delay: std::time::Duration::from_millis(2),
            ..EngineConfig::default()
        }
    }

    fn fixture_with_config(config: EngineConfig) -> Fixture {
        let stub = Arc::new(StubAccessApi::new());
        stub.add_permission_set("ps-1", "ops-admin");
        let store = Arc::new(MemoryOperationStore::new());
        let recorder = OperationRecorder::new(store.clone());
        let verifier = StateVerifier::new(stub.clone(), store.clone());
        let planner = RollbackPlanner::new(recorder.clone(), verifier.clone(), config.clone());
        let executor =
            RollbackExecutor::new(stub.clone(), verifier, recorder.clone(), config);
        Fixture {
            stub,
            store,
            recorder,
            planner,
            executor,
        }
    }

    fn assign_input(targets: &[&str]) -> OperationInput {
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
            targets: targets.iter().map(|t| t.to_string()).collect(),
            target_names: targets.iter().map(|t| t.to_string()).collect(),
            results: targets
                .iter()
                .map(|t| OperationResult {
                    target_id: t.to_string(),
                    success: true,
                    error: None,
                    duration_ms: None,
                })
                .collect(),
            metadata: BTreeMap::new(),
        }
    }

    async fn seed_assign(fx: &Fixture, targets: &[&str]) -> Uuid {
        for target in targets {
            fx.stub
                .seed_assignment("u-1", PrincipalType::User, "ps-1", target);
        }
        fx.recorder.log_operation(assign_input(targets)).await.unwrap()
    }

    #[tokio::test]
    async fn full_rollback_reverts_every_target_and_links_history() {
        let fx = fixture();
        let id = seed_assign(&fx, &["acct-a", "acct-b"]).await;
        let plan = fx.planner.generate_plan(id).await.unwrap();

        let result = fx.executor.execute_rollback(&plan, false, 10).await.unwrap();
        assert!(result.success);
        assert_eq!(result.successful_actions, 2);
        assert_eq!(result.failed_actions, 0);
        assert!(!fx.stub.has_assignment("u-1", "ps-1", "acct-a"));
        assert!(!fx.stub.has_assignment("u-1", "ps-1", "acct-b"));

        // The execution is itself history, linked from the source.
        let rollback_id = result.rollback_operation_id.unwrap();
        let rollback = fx.store.get(rollback_id).await.unwrap().unwrap();
        assert_eq!(rollback.operation_type, OperationType::Rollback);
        assert_eq!(rollback.results.len(), plan.actions.len());

        let source = fx.store.get(id).await.unwrap().unwrap();
        assert!(source.rolled_back);
        assert_eq!(source.rollback_operation_id, Some(rollback_id));
    }

    #[tokio::test]
    async fn drift_between_planning_and_execution_becomes_a_skip() {
        let fx = fixture();
        let id = seed_assign(&fx, &["acct-a", "acct-b"]).await;
        let plan = fx.planner.generate_plan(id).await.unwrap();

        // acct-a loses its binding after the plan was cut.
        fx.stub.remove_assignment("u-1", "ps-1", "acct-a");
        let mutations_before = fx.stub.mutation_calls();

        let result = fx.executor.execute_rollback(&plan, false, 10).await.unwrap();
        assert!(result.success);
        assert_eq!(result.successful_actions, 1);
        assert_eq!(result.skipped_actions, 1);
        assert_eq!(result.failed_actions, 0);
        // Only acct-b was touched.
        assert_eq!(fx.stub.mutation_calls(), mutations_before + 1);

        let skipped = result
            .actions
            .iter()
            .find(|a| a.target_id == "acct-a")
            .unwrap();
        assert!(skipped.outcome.is_skipped());
    }

    #[tokio::test]
    async fn transient_failures_are_retried_to_success() {
        let fx = fixture();
        let id = seed_assign(&fx, &["acct-a"]).await;
        let plan = fx.planner.generate_plan(id).await.unwrap();

        fx.stub.fail_mutations("acct-a", 1, true);
        let result = fx.executor.execute_rollback(&plan, false, 10).await.unwrap();
        assert!(result.success);
        assert_eq!(result.successful_actions, 1);
        // One failed attempt plus the successful retry.
        assert_eq!(fx.stub.mutation_calls(), 2);
    }

    #[tokio::test]
    async fn exhausted_retries_fail_only_that_action() {
        let fx = fixture();
        let id = seed_assign(&fx, &["acct-a", "acct-b", "acct-c"]).await;
        let plan = fx.planner.generate_plan(id).await.unwrap();

        // More faults than the attempt budget.
        fx.stub.fail_mutations("acct-b", 10, true);

        let result = fx.executor.execute_rollback(&plan, false, 10).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.successful_actions, 2);
        assert_eq!(result.failed_actions, 1);
        assert!(result.error_message.unwrap().contains("1 rollback action(s) failed"));

        let failed = result
            .actions
            .iter()
            .find(|a| a.target_id == "acct-b")
            .unwrap();
        assert!(failed.outcome.is_failure());

        // History still commits, with the failure captured per target.
        let rollback_id = result.rollback_operation_id.unwrap();
        let rollback = fx.store.get(rollback_id).await.unwrap().unwrap();
        let failed_result = rollback.result_for("acct-b").unwrap();
        assert!(!failed_result.success);
        assert!(failed_result.error.is_some());
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() {
        let fx = fixture();
        let id = seed_assign(&fx, &["acct-a"]).await;
        let plan = fx.planner.generate_plan(id).await.unwrap();

        fx.stub.fail_mutations("acct-a", 10, false);
        let result = fx.executor.execute_rollback(&plan, false, 10).await.unwrap();
        assert_eq!(result.failed_actions, 1);
        // A 403 burns exactly one attempt.
        assert_eq!(fx.stub.mutation_calls(), 1);
    }

    #[tokio::test]
    async fn dry_run_previews_without_mutating_or_recording() {
        let fx = fixture();
        let id = seed_assign(&fx, &["acct-a", "acct-b"]).await;
        let plan = fx.planner.generate_plan(id).await.unwrap();

        let result = fx.executor.execute_rollback(&plan, true, 10).await.unwrap();
        assert!(result.success);
        assert!(result.dry_run);
        assert_eq!(result.successful_actions, 2);
        assert!(result.rollback_operation_id.is_none());
        assert_eq!(fx.stub.mutation_calls(), 0);
        assert!(fx.stub.has_assignment("u-1", "ps-1", "acct-a"));

        // Nothing entered history and the source is untouched.
        let source = fx.store.get(id).await.unwrap().unwrap();
        assert!(!source.rolled_back);
        assert_eq!(
            fx.store.load(&OperationFilter::default()).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn second_execution_fails_fast_before_any_mutation() {
        let fx = fixture();
        let id = seed_assign(&fx, &["acct-a"]).await;
        let plan = fx.planner.generate_plan(id).await.unwrap();

        fx.executor.execute_rollback(&plan, false, 10).await.unwrap();
        let mutations = fx.stub.mutation_calls();

        let err = fx
            .executor
            .execute_rollback(&plan, false, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, RollbackError::AlreadyRolledBack(found) if found == id));
        assert_eq!(fx.stub.mutation_calls(), mutations);
    }

    #[tokio::test]
    async fn out_of_range_batch_sizes_are_clamped() {
        let fx = fixture();
        let id = seed_assign(&fx, &["acct-a", "acct-b", "acct-c"]).await;
        let plan = fx.planner.generate_plan(id).await.unwrap();

        // Zero would otherwise panic chunks(); it must behave as 1.
        let result = fx.executor.execute_rollback(&plan, false, 0).await.unwrap();
        assert!(result.success);
        assert_eq!(result.successful_actions, 3);
    }

    #[tokio::test]
    async fn empty_plan_is_a_successful_no_op() {
        let fx = fixture();
        let id = seed_assign(&fx, &["acct-a"]).await;
        let mut plan = fx.planner.generate_plan(id).await.unwrap();
        plan.actions.clear();

        let result = fx.executor.execute_rollback(&plan, false, 10).await.unwrap();
        assert!(result.success);
        assert_eq!(result.successful_actions, 0);
        assert!(result.rollback_operation_id.is_none());

        let source = fx.store.get(id).await.unwrap().unwrap();
        assert!(!source.rolled_back);
    }
}
