// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Name resolution against the AccessAPI directory
//!
//! Commands accept either service-assigned ids or human-readable names;
//! these helpers translate names to ids with a single list call each.

use accessapi_client::{AccessApi, PermissionSet, Principal, PrincipalType, Target};
use anyhow::Result;
use std::sync::Arc;

/// Resolve a principal name or id to the directory entry
pub async fn resolve_principal(
    client: &Arc<dyn AccessApi>,
    name_or_id: &str,
    kind: PrincipalType,
) -> Result<Principal> {
    let principals = client.list_principals().await?;

    if let Some(principal) = principals
        .iter()
        .find(|p| p.kind == kind && (p.id == name_or_id || p.name == name_or_id))
    {
        return Ok(principal.clone());
    }

    Err(anyhow::anyhow!("{} not found: {}", kind, name_or_id))
}

/// Resolve a permission set name or id
pub async fn resolve_permission_set(
    client: &Arc<dyn AccessApi>,
    name_or_id: &str,
) -> Result<PermissionSet> {
    let permission_sets = client.list_permission_sets().await?;

    if let Some(permission_set) = permission_sets
        .iter()
        .find(|ps| ps.id == name_or_id || ps.name == name_or_id)
    {
        return Ok(permission_set.clone());
    }

    Err(anyhow::anyhow!("Permission set not found: {}", name_or_id))
}

/// Resolve a list of target names or ids in one pass
pub async fn resolve_targets(
    client: &Arc<dyn AccessApi>,
    names_or_ids: &[String],
) -> Result<Vec<Target>> {
    let targets = client.list_targets().await?;

    let mut resolved = Vec::with_capacity(names_or_ids.len());
    for name_or_id in names_or_ids {
        let target = targets
            .iter()
            .find(|t| &t.id == name_or_id || &t.name == name_or_id)
            .ok_or_else(|| anyhow::anyhow!("Target not found: {}", name_or_id))?;
        resolved.push(target.clone());
    }
    Ok(resolved)
}
