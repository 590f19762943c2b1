// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Bulk assign and revoke commands
//!
//! Applies a permission set change for one principal across many
//! targets, then records the whole action as one operation so it can be
//! rolled back later.

use crate::output::{json, table};
use crate::resolve;
use access_rollback::{OperationInput, OperationRecorder, OperationResult, OperationType};
use accessapi_client::{AccessApi, PrincipalType};
use anyhow::Result;
use clap::Args;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

#[derive(Args, Clone)]
pub struct AssignArgs {
    /// Principal name or id
    #[arg(long)]
    pub principal: String,

    /// Treat the principal as a group rather than a user
    #[arg(long, short)]
    pub group: bool,

    /// Permission set name or id
    #[arg(long, short = 's')]
    pub permission_set: String,

    /// Target account ids or names
    #[arg(required = true)]
    pub targets: Vec<String>,

    /// Skip confirmation prompt
    #[arg(long, short, visible_alias = "yes", short_alias = 'y')]
    pub force: bool,
}

#[derive(Args, Clone)]
pub struct RevokeArgs {
    /// Principal name or id
    #[arg(long)]
    pub principal: String,

    /// Treat the principal as a group rather than a user
    #[arg(long, short)]
    pub group: bool,

    /// Permission set name or id
    #[arg(long, short = 's')]
    pub permission_set: String,

    /// Target account ids or names
    #[arg(required = true)]
    pub targets: Vec<String>,

    /// Skip confirmation prompt
    #[arg(long, short, visible_alias = "yes", short_alias = 'y')]
    pub force: bool,
}

/// JSON output for a bulk operation
#[derive(serde::Serialize)]
struct BulkOutcome {
    operation_id: Uuid,
    operation_type: OperationType,
    results: Vec<OperationResult>,
}

pub async fn run_assign(
    args: AssignArgs,
    client: &Arc<dyn AccessApi>,
    recorder: &OperationRecorder,
    use_json: bool,
) -> Result<()> {
    run_bulk(
        OperationType::Assign,
        &args.principal,
        args.group,
        &args.permission_set,
        &args.targets,
        args.force,
        client,
        recorder,
        use_json,
    )
    .await
}

pub async fn run_revoke(
    args: RevokeArgs,
    client: &Arc<dyn AccessApi>,
    recorder: &OperationRecorder,
    use_json: bool,
) -> Result<()> {
    run_bulk(
        OperationType::Revoke,
        &args.principal,
        args.group,
        &args.permission_set,
        &args.targets,
        args.force,
        client,
        recorder,
        use_json,
    )
    .await
}

#[allow(clippy::too_many_arguments)]
async fn run_bulk(
    operation_type: OperationType,
    principal: &str,
    group: bool,
    permission_set: &str,
    targets: &[String],
    force: bool,
    client: &Arc<dyn AccessApi>,
    recorder: &OperationRecorder,
    use_json: bool,
) -> Result<()> {
    let kind = if group {
        PrincipalType::Group
    } else {
        PrincipalType::User
    };
    // Repeated targets would mutate twice but can only be recorded once.
    let mut seen = std::collections::HashSet::new();
    let targets: Vec<String> = targets
        .iter()
        .filter(|t| seen.insert(t.as_str()))
        .cloned()
        .collect();

    let principal = resolve::resolve_principal(client, principal, kind).await?;
    let permission_set = resolve::resolve_permission_set(client, permission_set).await?;
    let targets = resolve::resolve_targets(client, &targets).await?;

    let verb = match operation_type {
        OperationType::Assign => "Assign",
        _ => "Revoke",
    };
    if !use_json {
        println!(
            "{} '{}' for {} '{}' on {} target(s)",
            verb, permission_set.name, principal.kind, principal.name,
            targets.len()
        );
    }

    if !force {
        use dialoguer::Confirm;
        if !Confirm::new()
            .with_prompt(format!("Apply {} change(s)?", targets.len()))
            .default(false)
            .interact()?
        {
            println!("Aborted.");
            return Ok(());
        }
    }

    let mut results = Vec::with_capacity(targets.len());
    for target in &targets {
        let started = Instant::now();
        let call = match operation_type {
            OperationType::Assign => {
                client
                    .create_assignment(&principal.id, principal.kind, &permission_set.id, &target.id)
                    .await
            }
            _ => {
                client
                    .delete_assignment(&principal.id, principal.kind, &permission_set.id, &target.id)
                    .await
            }
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        match call {
            Ok(()) => {
                if !use_json {
                    println!("  {} ok", target.name);
                }
                results.push(OperationResult {
                    target_id: target.id.clone(),
                    success: true,
                    error: None,
                    duration_ms: Some(duration_ms),
                });
            }
            Err(e) => {
                if !use_json {
                    println!("  {} FAILED: {}", target.name, e);
                }
                results.push(OperationResult {
                    target_id: target.id.clone(),
                    success: false,
                    error: Some(e.to_string()),
                    duration_ms: Some(duration_ms),
                });
            }
        }
    }

    let failed = results.iter().filter(|r| !r.success).count();
    let metadata = BTreeMap::from([
        (
            "source".to_string(),
            format!("accessadm {}", verb.to_lowercase()),
        ),
        ("targets".to_string(), targets.len().to_string()),
    ]);

    let operation_id = recorder
        .log_operation(OperationInput {
            operation_type,
            principal,
            permission_set,
            targets: targets.iter().map(|t| t.id.clone()).collect(),
            target_names: targets.iter().map(|t| t.name.clone()).collect(),
            results: results.clone(),
            metadata,
        })
        .await?;

    if use_json {
        json::print_json(&BulkOutcome {
            operation_id,
            operation_type,
            results,
        })?;
    } else {
        println!();
        let mut tbl = table::create_kv_table();
        tbl.add_row(vec!["operation", &operation_id.to_string()]);
        tbl.add_row(vec!["succeeded", &(targets.len() - failed).to_string()]);
        tbl.add_row(vec!["failed", &failed.to_string()]);
        table::print_table(tbl);
        println!("Undo later with: accessadm rollback apply {}", operation_id);
    }

    if failed > 0 {
        return Err(anyhow::anyhow!(
            "{} of {} change(s) failed",
            failed,
            targets.len()
        ));
    }
    Ok(())
}
