// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Profile management types

use serde::{Deserialize, Serialize};

/// A connection profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Profile name
    pub name: String,

    /// AccessAPI URL
    pub url: String,

    /// Account login name
    pub account: String,
}

impl Profile {
    /// Create a new profile
    pub fn new(name: String, url: String, account: String) -> Self {
        Self { name, url, account }
    }

    /// Load a profile from a file
    pub fn load(name: &str) -> anyhow::Result<Self> {
        let path = super::paths::profile_path(name);
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Failed to read profile '{}': {}", name, e))?;
        let profile: Profile = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse profile '{}': {}", name, e))?;
        Ok(profile)
    }

    /// Save the profile to a file
    pub fn save(&self) -> anyhow::Result<()> {
        super::paths::ensure_config_dirs()?;
        let path = super::paths::profile_path(&self.name);
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Delete the profile file
    pub fn delete(name: &str) -> anyhow::Result<()> {
        let path = super::paths::profile_path(name);
        std::fs::remove_file(&path)
            .map_err(|e| anyhow::anyhow!("Failed to delete profile '{}': {}", name, e))?;
        Ok(())
    }

    /// List all available profiles
    pub fn list_all() -> anyhow::Result<Vec<String>> {
        let profiles_dir = super::paths::profiles_dir();
        if !profiles_dir.exists() {
            return Ok(vec![]);
        }

        let mut profiles = vec![];
        for entry in std::fs::read_dir(&profiles_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json")
                && let Some(stem) = path.file_stem()
            {
                profiles.push(stem.to_string_lossy().to_string());
            }
        }
        profiles.sort();
        Ok(profiles)
    }
}

/// Top-level CLI configuration (current profile selection)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Name of the profile used when none is given on the command line
    pub profile: Option<String>,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let path = super::paths::config_file();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        super::paths::ensure_config_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(super::paths::config_file(), content)?;
        Ok(())
    }
}
