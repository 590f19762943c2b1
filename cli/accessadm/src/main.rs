// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! accessadm - operator CLI for AccessAPI assignment management
//!
//! Bulk-assigns and revokes permission sets for directory principals
//! across targets, records every mutating action in a durable operation
//! history, and can derive and execute safe rollbacks of recorded
//! operations.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;

mod commands;
mod config;
mod engine;
mod output;
mod resolve;

use accessapi_client::{AccessApi, HttpAccessApi};
use commands::{AssignArgs, ProfileCommand, RevokeArgs, RollbackCommand};
use config::profile::{Config, Profile};

#[derive(Parser)]
#[command(
    name = "accessadm",
    version,
    about = "AccessAPI assignment management CLI",
    long_about = "Operator CLI for bulk permission set assignment on AccessAPI, \
                  with durable operation history and rollback"
)]
struct Cli {
    /// Profile to use
    #[arg(short, long, global = true, env = "ACCESSADM_PROFILE")]
    profile: Option<String>,

    /// AccessAPI URL override
    #[arg(short = 'U', long, global = true, env = "ACCESSAPI_URL")]
    url: Option<String>,

    /// Account name override
    #[arg(short, long, global = true, env = "ACCESSAPI_ACCOUNT")]
    account: Option<String>,

    /// Output as JSON
    #[arg(short, long, global = true)]
    json: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage connection profiles
    Profile {
        #[command(subcommand)]
        command: ProfileCommand,
    },

    /// Assign a permission set to a principal on one or more targets
    Assign(AssignArgs),

    /// Revoke a permission set from a principal on one or more targets
    Revoke(RevokeArgs),

    /// Inspect and roll back recorded operations
    #[command(alias = "rb")]
    Rollback {
        #[command(subcommand)]
        command: RollbackCommand,
    },
}

impl Cli {
    /// Build an authenticated AccessAPI client from CLI options or
    /// profile
    fn build_client(&self) -> Result<Arc<dyn AccessApi>> {
        let url = self.url.clone();
        let account = self.account.clone();

        let (url, account) = if let (Some(url), Some(account)) = (url.clone(), account.clone()) {
            (url, account)
        } else {
            let profile_name = self
                .profile
                .clone()
                .or_else(|| Config::load().ok().and_then(|c| c.profile));

            let profile_name = profile_name.ok_or_else(|| {
                anyhow::anyhow!(
                    "No profile configured. Use 'accessadm profile create' or set \
                     ACCESSAPI_URL and ACCESSAPI_ACCOUNT"
                )
            })?;

            let profile = Profile::load(&profile_name)?;
            (
                url.unwrap_or(profile.url),
                account.unwrap_or(profile.account),
            )
        };

        let token = std::env::var("ACCESSAPI_TOKEN").map_err(|_| {
            anyhow::anyhow!("ACCESSAPI_TOKEN is not set; export an API token first")
        })?;

        let client = HttpAccessApi::new(&url, &account, &token)?;
        Ok(Arc::new(client))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("accessadm=debug,access_rollback=debug,accessapi_client=debug")
            .init();
    }

    match &cli.command {
        Commands::Profile { command } => command.clone().run(cli.json).await,
        Commands::Assign(args) => {
            let client = cli.build_client()?;
            let recorder = engine::build_recorder()?;
            commands::assignment::run_assign(args.clone(), &client, &recorder, cli.json).await
        }
        Commands::Revoke(args) => {
            let client = cli.build_client()?;
            let recorder = engine::build_recorder()?;
            commands::assignment::run_revoke(args.clone(), &client, &recorder, cli.json).await
        }
        Commands::Rollback { command } => match command {
            RollbackCommand::Apply(args) => {
                let client = cli.build_client()?;
                let engine = engine::build(client)?;
                commands::rollback::apply(args.clone(), &engine, cli.json).await
            }
            RollbackCommand::List(args) => {
                let recorder = engine::build_recorder()?;
                commands::rollback::list(args.clone(), &recorder, cli.json).await
            }
            RollbackCommand::Show(args) => {
                let recorder = engine::build_recorder()?;
                commands::rollback::show(args.clone(), &recorder, cli.json).await
            }
            RollbackCommand::Status => {
                let recorder = engine::build_recorder()?;
                commands::rollback::status(&recorder, cli.json).await
            }
            RollbackCommand::Cleanup(args) => {
                let recorder = engine::build_recorder()?;
                commands::rollback::cleanup(args.clone(), &recorder).await
            }
        },
    }
}
