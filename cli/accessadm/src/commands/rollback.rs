// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Operation history and rollback commands
//!
//! `list`, `show`, `status`, and `cleanup` work purely against local
//! history; `apply` additionally talks to AccessAPI to validate, plan,
//! execute, and verify the rollback of a recorded operation.

use crate::engine::Engine;
use crate::output::{json, table};
use access_rollback::{
    ActionOutcome, OperationFilter, OperationRecord, OperationRecorder, OperationType,
    RollbackPlan, RollbackResult,
};
use anyhow::Result;
use clap::{Args, Subcommand};
use uuid::Uuid;

#[derive(Subcommand, Clone)]
pub enum RollbackCommand {
    /// List recorded operations
    List(ListArgs),
    /// Show one operation record in full
    Show(ShowArgs),
    /// Roll back a recorded operation
    Apply(ApplyArgs),
    /// Summarise the operation history store
    Status,
    /// Delete operation records past the retention window
    Cleanup(CleanupArgs),
}

#[derive(Args, Clone)]
pub struct ListArgs {
    /// Filter by operation type (assign, revoke, rollback)
    #[arg(long, short = 't')]
    pub operation_type: Option<String>,

    /// Filter by principal name substring
    #[arg(long)]
    pub principal: Option<String>,

    /// Filter by permission set name substring
    #[arg(long, short = 's')]
    pub permission_set: Option<String>,

    /// Only operations at most this many days old
    #[arg(long, short)]
    pub days: Option<u32>,

    /// Filter by target id
    #[arg(long)]
    pub target: Option<String>,

    /// Only operations that have been rolled back
    #[arg(long)]
    pub rolled_back: bool,
}

#[derive(Args, Clone)]
pub struct ShowArgs {
    /// Operation id (full UUID or unique prefix)
    pub operation_id: String,
}

#[derive(Args, Clone)]
pub struct ApplyArgs {
    /// Operation id (full UUID or unique prefix)
    pub operation_id: String,

    /// Show what would be done without making changes
    #[arg(long, short = 'n')]
    pub dry_run: bool,

    /// Skip confirmation prompt
    #[arg(long, short, visible_alias = "yes", short_alias = 'y')]
    pub force: bool,

    /// Actions per concurrent batch (1-20)
    #[arg(long, short, default_value = "10")]
    pub batch_size: usize,
}

#[derive(Args, Clone)]
pub struct CleanupArgs {
    /// Delete records older than this many days
    #[arg(long, short, default_value = "90")]
    pub days: u32,

    /// Skip confirmation prompt
    #[arg(long, short, visible_alias = "yes", short_alias = 'y')]
    pub force: bool,
}

impl ListArgs {
    fn to_filter(&self) -> Result<OperationFilter> {
        let operation_type = match self.operation_type.as_deref() {
            None => None,
            Some("assign") => Some(OperationType::Assign),
            Some("revoke") => Some(OperationType::Revoke),
            Some("rollback") => Some(OperationType::Rollback),
            Some(other) => {
                return Err(anyhow::anyhow!(
                    "Unknown operation type '{}' (expected assign, revoke, or rollback)",
                    other
                ));
            }
        };
        Ok(OperationFilter {
            operation_type,
            principal: self.principal.clone(),
            permission_set: self.permission_set.clone(),
            days: self.days,
            rolled_back: self.rolled_back.then_some(true),
            target: self.target.clone(),
        })
    }
}

/// Resolve a full UUID or a unique id prefix to a recorded operation id
async fn resolve_operation_id(recorder: &OperationRecorder, input: &str) -> Result<Uuid> {
    if let Ok(id) = Uuid::parse_str(input) {
        return Ok(id);
    }

    let records = recorder.get_operations(&OperationFilter::default()).await?;
    let matches: Vec<&OperationRecord> = records
        .iter()
        .filter(|r| r.operation_id.to_string().starts_with(input))
        .collect();
    match matches.as_slice() {
        [record] => Ok(record.operation_id),
        [] => Err(anyhow::anyhow!("No operation matches '{}'", input)),
        _ => Err(anyhow::anyhow!(
            "Operation id prefix '{}' is ambiguous ({} matches)",
            input,
            matches.len()
        )),
    }
}

fn short_id(id: Uuid) -> String {
    id.to_string()[..8].to_string()
}

fn result_summary(record: &OperationRecord) -> String {
    let failed = record.results.iter().filter(|r| !r.success).count();
    if failed == 0 {
        format!("{} ok", record.results.len())
    } else {
        format!("{} ok / {} failed", record.results.len() - failed, failed)
    }
}

pub async fn list(args: ListArgs, recorder: &OperationRecorder, use_json: bool) -> Result<()> {
    let filter = args.to_filter()?;
    let records = recorder.get_operations(&filter).await?;

    if use_json {
        json::print_json(&records)?;
        return Ok(());
    }

    if records.is_empty() {
        println!("No matching operations.");
        return Ok(());
    }

    let mut tbl = table::create_table(&[
        "SHORTID",
        "WHEN",
        "TYPE",
        "PRINCIPAL",
        "PERMISSION SET",
        "TARGETS",
        "RESULTS",
        "ROLLED BACK",
    ]);
    for record in &records {
        tbl.add_row(vec![
            short_id(record.operation_id),
            record.timestamp.format("%Y-%m-%d %H:%M").to_string(),
            record.operation_type.to_string(),
            record.principal.name.clone(),
            record.permission_set.name.clone(),
            record.targets.len().to_string(),
            result_summary(record),
            if record.rolled_back {
                "yes".to_string()
            } else {
                "-".to_string()
            },
        ]);
    }
    table::print_table(tbl);
    Ok(())
}

pub async fn show(args: ShowArgs, recorder: &OperationRecorder, use_json: bool) -> Result<()> {
    let id = resolve_operation_id(recorder, &args.operation_id).await?;
    let record = recorder
        .get_operation(id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Operation not found: {}", id))?;

    if use_json {
        json::print_json(&record)?;
        return Ok(());
    }

    let mut tbl = table::create_kv_table();
    tbl.add_row(vec!["operation", &record.operation_id.to_string()]);
    tbl.add_row(vec!["when", &record.timestamp.to_rfc3339()]);
    tbl.add_row(vec!["type", &record.operation_type.to_string()]);
    tbl.add_row(vec![
        "principal",
        &format!("{} ({})", record.principal.name, record.principal.kind),
    ]);
    tbl.add_row(vec!["permission set", &record.permission_set.name]);
    tbl.add_row(vec![
        "rolled back",
        &record
            .rollback_operation_id
            .map(|id| format!("yes, by {}", id))
            .unwrap_or_else(|| "no".to_string()),
    ]);
    table::print_table(tbl);

    println!();
    let mut results = table::create_table(&["TARGET", "RESULT", "DETAIL"]);
    for result in &record.results {
        results.add_row(vec![
            record.target_name(&result.target_id).to_string(),
            if result.success {
                "ok".to_string()
            } else {
                "failed".to_string()
            },
            result.error.clone().unwrap_or_else(|| "-".to_string()),
        ]);
    }
    table::print_table(results);
    Ok(())
}

pub async fn status(recorder: &OperationRecorder, use_json: bool) -> Result<()> {
    let records = recorder.get_operations(&OperationFilter::default()).await?;

    let assigns = records
        .iter()
        .filter(|r| r.operation_type == OperationType::Assign)
        .count();
    let revokes = records
        .iter()
        .filter(|r| r.operation_type == OperationType::Revoke)
        .count();
    let rollbacks = records
        .iter()
        .filter(|r| r.operation_type == OperationType::Rollback)
        .count();
    let rolled_back = records.iter().filter(|r| r.rolled_back).count();
    let oldest = records.last().map(|r| r.timestamp);

    if use_json {
        json::print_json(&serde_json::json!({
            "operations": records.len(),
            "assigns": assigns,
            "revokes": revokes,
            "rollbacks": rollbacks,
            "rolled_back": rolled_back,
            "oldest": oldest,
            "history_dir": crate::config::paths::history_dir(),
        }))?;
        return Ok(());
    }

    let mut tbl = table::create_kv_table();
    tbl.add_row(vec!["operations", &records.len().to_string()]);
    tbl.add_row(vec!["assigns", &assigns.to_string()]);
    tbl.add_row(vec!["revokes", &revokes.to_string()]);
    tbl.add_row(vec!["rollbacks", &rollbacks.to_string()]);
    tbl.add_row(vec!["rolled back", &rolled_back.to_string()]);
    tbl.add_row(vec![
        "oldest",
        &oldest
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string()),
    ]);
    tbl.add_row(vec![
        "history dir",
        &crate::config::paths::history_dir().display().to_string(),
    ]);
    table::print_table(tbl);
    Ok(())
}

pub async fn cleanup(args: CleanupArgs, recorder: &OperationRecorder) -> Result<()> {
    if !args.force {
        use dialoguer::Confirm;
        if !Confirm::new()
            .with_prompt(format!(
                "Delete operation records older than {} day(s)?",
                args.days
            ))
            .default(false)
            .interact()?
        {
            println!("Aborted.");
            return Ok(());
        }
    }

    let removed = recorder.cleanup_old_operations(args.days).await?;
    println!("Removed {} operation record(s).", removed);
    Ok(())
}

fn print_plan(plan: &RollbackPlan) {
    println!(
        "Rollback plan for {}: {} {} action(s), est. {}s",
        plan.operation_id,
        plan.actions.len(),
        plan.rollback_type,
        plan.estimated_duration_ms / 1000
    );
    for action in &plan.actions {
        println!(
            "  - {} '{}' for '{}' on {}",
            plan.rollback_type, action.permission_set.name, action.principal.name,
            action.target_name
        );
    }
    for warning in &plan.warnings {
        println!("  ! {}", warning);
    }
}

fn print_result(result: &RollbackResult) {
    let mut tbl = table::create_table(&["TARGET", "RESULT", "DETAIL"]);
    for action in &result.actions {
        let (status, detail) = match &action.outcome {
            ActionOutcome::Succeeded => ("ok", "-".to_string()),
            ActionOutcome::Skipped { reason } => ("skipped", reason.clone()),
            ActionOutcome::Failed { error } => ("failed", error.clone()),
        };
        tbl.add_row(vec![
            action.target_name.clone(),
            status.to_string(),
            detail,
        ]);
    }
    table::print_table(tbl);

    println!();
    println!(
        "{} succeeded, {} skipped, {} failed in {}ms",
        result.successful_actions,
        result.skipped_actions,
        result.failed_actions,
        result.duration_ms
    );
    if let Some(id) = result.rollback_operation_id {
        println!("Recorded as rollback operation {}", id);
    }
}

pub async fn apply(args: ApplyArgs, engine: &Engine, use_json: bool) -> Result<()> {
    let id = resolve_operation_id(&engine.recorder, &args.operation_id).await?;

    let validation = engine.planner.validate_rollback(id).await?;
    if !validation.is_valid {
        if use_json {
            json::print_json(&validation)?;
        } else {
            for error in &validation.errors {
                println!("error: {}", error);
            }
        }
        return Err(anyhow::anyhow!("Operation {} cannot be rolled back", id));
    }

    let plan = engine.planner.generate_plan(id).await?;

    if plan.actions.is_empty() {
        if use_json {
            json::print_json(&plan)?;
        } else {
            print_plan(&plan);
            println!("Nothing to roll back.");
        }
        return Ok(());
    }

    if !use_json {
        print_plan(&plan);
        println!();
    }

    if args.dry_run {
        let preview = engine
            .executor
            .execute_rollback(&plan, true, args.batch_size)
            .await?;
        if use_json {
            json::print_json(&preview)?;
        } else {
            println!("[dry-run] no changes were made.");
            print_result(&preview);
        }
        if preview.failed_actions > 0 {
            return Err(anyhow::anyhow!(
                "{} action(s) would fail",
                preview.failed_actions
            ));
        }
        return Ok(());
    }

    if !args.force {
        use dialoguer::Confirm;
        if !Confirm::new()
            .with_prompt(format!("Execute {} rollback action(s)?", plan.actions.len()))
            .default(false)
            .interact()?
        {
            println!("Aborted.");
            return Ok(());
        }
    }

    let result = engine
        .executor
        .execute_rollback(&plan, false, args.batch_size)
        .await?;

    if use_json {
        json::print_json(&result)?;
    } else {
        print_result(&result);
    }

    // Best-effort post-state confirmation; issues are reported but do
    // not change the exit code.
    if let Some(rollback_id) = result.rollback_operation_id {
        match engine.verifier.verify_rollback(rollback_id).await {
            Ok(verification) if !verification.is_verified => {
                if !use_json {
                    println!();
                    println!("Post-rollback verification found issues:");
                    for issue in &verification.issues {
                        println!("  ! {}", issue);
                    }
                }
            }
            Ok(_) => {
                if !use_json {
                    println!("Post-rollback verification passed.");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "post-rollback verification failed to run");
            }
        }
    }

    if result.failed_actions > 0 {
        return Err(anyhow::anyhow!(
            "{} rollback action(s) failed",
            result.failed_actions
        ));
    }
    Ok(())
}
