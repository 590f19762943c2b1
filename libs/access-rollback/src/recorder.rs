// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Operation recorder
//!
//! The write path into operation history. `log_operation` is a fail-fast
//! boundary: input is validated exhaustively and a malformed operation
//! can never enter the store.

use crate::error::RollbackError;
use crate::store::OperationStore;
use crate::types::{OperationFilter, OperationInput, OperationRecord, OperationUpdate};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Validates and appends operation records, and owns the monotonic
/// rolled-back transition
#[derive(Clone)]
pub struct OperationRecorder {
    store: Arc<dyn OperationStore>,
}

impl OperationRecorder {
    pub fn new(store: Arc<dyn OperationStore>) -> Self {
        Self { store }
    }

    /// Validate `input`, assign a fresh id and timestamp, and persist the
    /// record. Returns the new operation id.
    pub async fn log_operation(&self, input: OperationInput) -> Result<Uuid, RollbackError> {
        let reasons = validate_input(&input);
        if !reasons.is_empty() {
            return Err(RollbackError::Validation { reasons });
        }

        let record = OperationRecord {
            operation_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            operation_type: input.operation_type,
            principal: input.principal,
            permission_set: input.permission_set,
            targets: input.targets,
            target_names: input.target_names,
            results: input.results,
            metadata: input.metadata,
            rolled_back: false,
            rollback_operation_id: None,
        };

        self.store.save(&record).await?;
        tracing::info!(
            operation_id = %record.operation_id,
            operation_type = %record.operation_type,
            principal = %record.principal.name,
            permission_set = %record.permission_set.name,
            targets = record.targets.len(),
            "recorded operation"
        );
        Ok(record.operation_id)
    }

    pub async fn get_operations(
        &self,
        filter: &OperationFilter,
    ) -> Result<Vec<OperationRecord>, RollbackError> {
        self.store.load(filter).await
    }

    pub async fn get_operation(
        &self,
        operation_id: Uuid,
    ) -> Result<Option<OperationRecord>, RollbackError> {
        self.store.get(operation_id).await
    }

    /// Mark `operation_id` as rolled back by `rollback_operation_id`.
    ///
    /// Check-and-set: the precondition is asserted here and re-checked by
    /// the store under its write lock, so two concurrent rollbacks of the
    /// same operation cannot both succeed.
    pub async fn mark_rolled_back(
        &self,
        operation_id: Uuid,
        rollback_operation_id: Uuid,
    ) -> Result<(), RollbackError> {
        let record = self
            .store
            .get(operation_id)
            .await?
            .ok_or(RollbackError::OperationNotFound(operation_id))?;
        if record.rolled_back {
            return Err(RollbackError::AlreadyRolledBack(operation_id));
        }

        self.store
            .update(
                operation_id,
                OperationUpdate {
                    rolled_back: Some(true),
                    rollback_operation_id: Some(rollback_operation_id),
                },
            )
            .await?;
        tracing::info!(
            operation_id = %operation_id,
            rollback_operation_id = %rollback_operation_id,
            "marked operation rolled back"
        );
        Ok(())
    }

    /// Delete records older than `days` days, returning the count
    /// removed.
    ///
    /// Deletion is oldest-leaf-first: a record whose rollback record is
    /// still younger than the cutoff is retained, so a surviving rollback
    /// always keeps its source operation's provenance reachable. The
    /// source becomes eligible once its rollback has aged out.
    pub async fn cleanup_old_operations(&self, days: u32) -> Result<usize, RollbackError> {
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(days));
        let all = self.store.load(&OperationFilter::default()).await?;
        let by_id: HashMap<Uuid, &OperationRecord> =
            all.iter().map(|r| (r.operation_id, r)).collect();

        let mut removed = 0;
        for record in &all {
            if record.timestamp > cutoff {
                continue;
            }
            if let Some(rollback_id) = record.rollback_operation_id {
                if let Some(rollback) = by_id.get(&rollback_id) {
                    if rollback.timestamp > cutoff {
                        tracing::debug!(
                            operation_id = %record.operation_id,
                            rollback_operation_id = %rollback_id,
                            "retaining aged record; its rollback is still within retention"
                        );
                        continue;
                    }
                }
            }
            self.store.delete(record.operation_id).await?;
            removed += 1;
        }

        tracing::info!(days, removed, "cleaned up operation history");
        Ok(removed)
    }
}

fn validate_input(input: &OperationInput) -> Vec<String> {
    let mut reasons = Vec::new();

    if input.principal.id.is_empty() {
        reasons.push("principal id must not be empty".to_string());
    }
    if input.principal.name.is_empty() {
        reasons.push("principal name must not be empty".to_string());
    }
    if input.permission_set.id.is_empty() {
        reasons.push("permission set id must not be empty".to_string());
    }
    if input.permission_set.name.is_empty() {
        reasons.push("permission set name must not be empty".to_string());
    }
    if input.targets.is_empty() {
        reasons.push("target list must not be empty".to_string());
    }
    if input.target_names.len() != input.targets.len() {
        reasons.push(format!(
            "target name list length {} does not match target list length {}",
            input.target_names.len(),
            input.targets.len()
        ));
    }
    if input.results.len() != input.targets.len() {
        reasons.push(format!(
            "result list length {} does not match target list length {}",
            input.results.len(),
            input.targets.len()
        ));
    }
    for result in &input.results {
        if !input.targets.contains(&result.target_id) {
            reasons.push(format!(
                "result references unknown target '{}'",
                result.target_id
            ));
        }
    }
    let mut seen = std::collections::HashSet::new();
    for target in &input.targets {
        if !seen.insert(target.as_str()) {
            reasons.push(format!("duplicate target '{}'", target));
        }
    }

    reasons
}
