// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! In-memory AccessAPI stub for testing
//!
//! Implements the `AccessApi` trait over a mutable in-memory directory so
//! the rollback engine and the CLI can be exercised without a real
//! AccessAPI deployment. Beyond the plain API surface it exposes test
//! hooks for:
//!
//! - Seeding principals, permission sets, targets, and assignments
//! - Mutating assignment state out-of-band (simulating another operator
//!   drifting the remote between planning and execution)
//! - Injecting failures into mutating calls, transient (503) or
//!   permanent (403), to drive retry and partial-failure paths
//! - Counting mutating calls, so tests can assert retry behaviour

use accessapi_client::{
    AccessApi, Assignment, ClientError, PermissionSet, Principal, PrincipalType, Target,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// A queued failure for a target's mutating calls
#[derive(Debug, Clone)]
struct Fault {
    remaining: usize,
    status: u16,
}

#[derive(Default)]
struct StubState {
    principals: Vec<Principal>,
    permission_sets: Vec<PermissionSet>,
    targets: Vec<Target>,
    assignments: Vec<Assignment>,
    faults: HashMap<String, Fault>,
    mutation_calls: usize,
}

/// In-memory AccessAPI backend
#[derive(Default)]
pub struct StubAccessApi {
    state: Mutex<StubState>,
}

impl StubAccessApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StubState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_principal(&self, id: &str, kind: PrincipalType, name: &str) {
        self.lock().principals.push(Principal {
            id: id.to_string(),
            kind,
            name: name.to_string(),
        });
    }

    pub fn add_permission_set(&self, id: &str, name: &str) {
        self.lock().permission_sets.push(PermissionSet {
            id: id.to_string(),
            name: name.to_string(),
        });
    }

    pub fn add_target(&self, id: &str, name: &str) {
        self.lock().targets.push(Target {
            id: id.to_string(),
            name: name.to_string(),
        });
    }

    /// Seed an assignment directly, bypassing fault injection. The
    /// permission set name is looked up from the catalogue when present.
    pub fn seed_assignment(
        &self,
        principal_id: &str,
        principal_type: PrincipalType,
        permission_set_id: &str,
        target_id: &str,
    ) {
        let mut state = self.lock();
        let permission_set_name = state
            .permission_sets
            .iter()
            .find(|ps| ps.id == permission_set_id)
            .map(|ps| ps.name.clone())
            .unwrap_or_else(|| permission_set_id.to_string());
        state.assignments.push(Assignment {
            principal_id: principal_id.to_string(),
            principal_type,
            permission_set_id: permission_set_id.to_string(),
            permission_set_name,
            target_id: target_id.to_string(),
        });
    }

    /// Remove an assignment out-of-band, simulating external drift
    pub fn remove_assignment(&self, principal_id: &str, permission_set_id: &str, target_id: &str) {
        self.lock().assignments.retain(|a| {
            !(a.principal_id == principal_id
                && a.permission_set_id == permission_set_id
                && a.target_id == target_id)
        });
    }

    pub fn has_assignment(&self, principal_id: &str, permission_set_id: &str, target_id: &str) -> bool {
        self.lock().assignments.iter().any(|a| {
            a.principal_id == principal_id
                && a.permission_set_id == permission_set_id
                && a.target_id == target_id
        })
    }

    /// Fail the next `count` mutating calls against `target_id`.
    /// `transient` selects a 503 (retryable) over a 403 (not).
    pub fn fail_mutations(&self, target_id: &str, count: usize, transient: bool) {
        let status = if transient { 503 } else { 403 };
        self.lock().faults.insert(
            target_id.to_string(),
            Fault {
                remaining: count,
                status,
            },
        );
    }

    /// Total create/delete calls observed, including failed ones
    pub fn mutation_calls(&self) -> usize {
        self.lock().mutation_calls
    }

    fn check_fault(state: &mut StubState, target_id: &str) -> Result<(), ClientError> {
        if let Some(fault) = state.faults.get_mut(target_id) {
            if fault.remaining > 0 {
                fault.remaining -= 1;
                let status = fault.status;
                return Err(ClientError::Api {
                    status,
                    message: format!("injected fault for target {}", target_id),
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl AccessApi for StubAccessApi {
    async fn list_principals(&self) -> Result<Vec<Principal>, ClientError> {
        Ok(self.lock().principals.clone())
    }

    async fn list_permission_sets(&self) -> Result<Vec<PermissionSet>, ClientError> {
        Ok(self.lock().permission_sets.clone())
    }

    async fn list_targets(&self) -> Result<Vec<Target>, ClientError> {
        Ok(self.lock().targets.clone())
    }

    async fn list_assignments(&self, target_id: &str) -> Result<Vec<Assignment>, ClientError> {
        Ok(self
            .lock()
            .assignments
            .iter()
            .filter(|a| a.target_id == target_id)
            .cloned()
            .collect())
    }

    async fn create_assignment(
        &self,
        principal_id: &str,
        principal_type: PrincipalType,
        permission_set_id: &str,
        target_id: &str,
    ) -> Result<(), ClientError> {
        let mut state = self.lock();
        state.mutation_calls += 1;
        Self::check_fault(&mut state, target_id)?;

        let exists = state.assignments.iter().any(|a| {
            a.principal_id == principal_id
                && a.permission_set_id == permission_set_id
                && a.target_id == target_id
        });
        if !exists {
            let permission_set_name = state
                .permission_sets
                .iter()
                .find(|ps| ps.id == permission_set_id)
                .map(|ps| ps.name.clone())
                .unwrap_or_else(|| permission_set_id.to_string());
            state.assignments.push(Assignment {
                principal_id: principal_id.to_string(),
                principal_type,
                permission_set_id: permission_set_id.to_string(),
                permission_set_name,
                target_id: target_id.to_string(),
            });
        }
        Ok(())
    }

    async fn delete_assignment(
        &self,
        principal_id: &str,
        _principal_type: PrincipalType,
        permission_set_id: &str,
        target_id: &str,
    ) -> Result<(), ClientError> {
        let mut state = self.lock();
        state.mutation_calls += 1;
        Self::check_fault(&mut state, target_id)?;

        let before = state.assignments.len();
        state.assignments.retain(|a| {
            !(a.principal_id == principal_id
                && a.permission_set_id == permission_set_id
                && a.target_id == target_id)
        });
        if state.assignments.len() == before {
            return Err(ClientError::Api {
                status: 404,
                message: format!(
                    "no assignment of {} to {} on {}",
                    permission_set_id, principal_id, target_id
                ),
            });
        }
        Ok(())
    }
}
