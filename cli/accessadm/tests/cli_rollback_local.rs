// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! History-only rollback command tests
//!
//! `rollback list`, `status`, and `cleanup` operate purely on the local
//! operation history, so they can be exercised end-to-end against a
//! temporary history directory without credentials or a server.

#![allow(deprecated, clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;

fn accessadm_cmd(history_dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("accessadm").expect("Failed to find accessadm binary");
    cmd.env("ACCESSADM_HISTORY_DIR", history_dir);
    cmd
}

#[test]
fn list_of_empty_history_is_empty() {
    let dir = tempfile::tempdir().unwrap();

    accessadm_cmd(dir.path())
        .args(["rollback", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No matching operations"));

    accessadm_cmd(dir.path())
        .args(["rollback", "list", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));
}

#[test]
fn status_reports_zero_operations() {
    let dir = tempfile::tempdir().unwrap();

    let output = accessadm_cmd(dir.path())
        .args(["rollback", "status", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let status: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(status["operations"], 0);
    assert_eq!(status["rolled_back"], 0);
}

#[test]
fn cleanup_of_empty_history_removes_nothing() {
    let dir = tempfile::tempdir().unwrap();

    accessadm_cmd(dir.path())
        .args(["rollback", "cleanup", "--days", "0", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 0"));
}

#[test]
fn show_of_unknown_operation_fails() {
    let dir = tempfile::tempdir().unwrap();

    accessadm_cmd(dir.path())
        .args(["rollback", "show", "deadbeef"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No operation matches"));
}

#[test]
fn list_rejects_unknown_operation_type() {
    let dir = tempfile::tempdir().unwrap();

    accessadm_cmd(dir.path())
        .args(["rollback", "list", "--operation-type", "explode"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown operation type"));
}
