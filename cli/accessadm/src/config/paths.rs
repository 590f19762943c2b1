// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Configuration path resolution
//!
//! Supports both legacy ~/.accessadm/ and XDG ~/.config/accessadm/ paths.

use std::path::PathBuf;

/// Get the accessadm configuration directory
///
/// Priority:
/// 1. ACCESSADM_CONFIG_DIR environment variable
/// 2. ~/.accessadm/ if it exists (migration support)
/// 3. XDG config dir (~/.config/accessadm/ on Linux/Mac)
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("ACCESSADM_CONFIG_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        let legacy_dir = home.join(".accessadm");
        if legacy_dir.exists() {
            return legacy_dir;
        }
    }

    directories::ProjectDirs::from("com", "edgecast", "accessadm")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".accessadm")
        })
}

/// Get the profiles directory
pub fn profiles_dir() -> PathBuf {
    config_dir().join("profiles.d")
}

/// Get the path to the main config file
pub fn config_file() -> PathBuf {
    config_dir().join("config.json")
}

/// Get the path to a specific profile
pub fn profile_path(name: &str) -> PathBuf {
    profiles_dir().join(format!("{}.json", name))
}

/// Get the operation history directory
///
/// Overridable with ACCESSADM_HISTORY_DIR so history can live on shared
/// or backed-up storage independently of the config dir.
pub fn history_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("ACCESSADM_HISTORY_DIR") {
        return PathBuf::from(dir);
    }
    config_dir().join("operations.d")
}

/// Ensure config directories exist
pub fn ensure_config_dirs() -> std::io::Result<()> {
    let config = config_dir();
    let profiles = profiles_dir();

    std::fs::create_dir_all(&config)?;
    std::fs::create_dir_all(&profiles)?;

    Ok(())
}
