// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Connection profile management commands

use crate::config::profile::{Config, Profile};
use crate::output::{json, table};
use anyhow::Result;
use clap::Subcommand;

#[derive(Subcommand, Clone)]
pub enum ProfileCommand {
    /// Create a connection profile
    Create {
        /// Profile name
        name: String,
        /// AccessAPI URL
        #[arg(long)]
        url: String,
        /// Account login name
        #[arg(long, short)]
        account: String,
        /// Make this the default profile
        #[arg(long)]
        r#use: bool,
    },
    /// List profiles
    List,
    /// Show a profile (defaults to the current one)
    Show {
        /// Profile name
        name: Option<String>,
    },
    /// Select the default profile
    Use {
        /// Profile name
        name: String,
    },
    /// Delete a profile
    Delete {
        /// Profile name
        name: String,
    },
}

impl ProfileCommand {
    pub async fn run(self, use_json: bool) -> Result<()> {
        match self {
            Self::Create {
                name,
                url,
                account,
                r#use,
            } => {
                let profile = Profile::new(name.clone(), url, account);
                profile.save()?;
                if r#use {
                    let mut config = Config::load()?;
                    config.profile = Some(name.clone());
                    config.save()?;
                }
                println!("Created profile '{}'", name);
                Ok(())
            }
            Self::List => {
                let profiles = Profile::list_all()?;
                let current = Config::load()?.profile;
                if use_json {
                    json::print_json(&profiles)?;
                } else if profiles.is_empty() {
                    println!("No profiles. Create one with 'accessadm profile create'.");
                } else {
                    let mut tbl = table::create_table(&["NAME", "URL", "ACCOUNT", "CURRENT"]);
                    for name in &profiles {
                        let profile = Profile::load(name)?;
                        let marker = if current.as_deref() == Some(name.as_str()) {
                            "*"
                        } else {
                            ""
                        };
                        tbl.add_row(vec![&profile.name, &profile.url, &profile.account, marker]);
                    }
                    table::print_table(tbl);
                }
                Ok(())
            }
            Self::Show { name } => {
                let name = match name.or(Config::load()?.profile) {
                    Some(name) => name,
                    None => {
                        return Err(anyhow::anyhow!(
                            "No profile selected. Pass a name or run 'accessadm profile use'."
                        ));
                    }
                };
                let profile = Profile::load(&name)?;
                if use_json {
                    json::print_json(&profile)?;
                } else {
                    let mut tbl = table::create_kv_table();
                    tbl.add_row(vec!["name", &profile.name]);
                    tbl.add_row(vec!["url", &profile.url]);
                    tbl.add_row(vec!["account", &profile.account]);
                    table::print_table(tbl);
                }
                Ok(())
            }
            Self::Use { name } => {
                // Validate the profile exists before pointing at it.
                Profile::load(&name)?;
                let mut config = Config::load()?;
                config.profile = Some(name.clone());
                config.save()?;
                println!("Switched to profile '{}'", name);
                Ok(())
            }
            Self::Delete { name } => {
                Profile::delete(&name)?;
                let mut config = Config::load()?;
                if config.profile.as_deref() == Some(name.as_str()) {
                    config.profile = None;
                    config.save()?;
                }
                println!("Deleted profile '{}'", name);
                Ok(())
            }
        }
    }
}
