// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Wire types for the AccessAPI service

use serde::{Deserialize, Serialize};

/// Kind of directory principal an assignment attaches to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalType {
    User,
    Group,
}

impl std::fmt::Display for PrincipalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrincipalType::User => write!(f, "user"),
            PrincipalType::Group => write!(f, "group"),
        }
    }
}

/// A directory principal (user or group)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Directory-assigned identifier
    pub id: String,
    #[serde(rename = "type")]
    pub kind: PrincipalType,
    /// Login name (users) or group name
    pub name: String,
}

/// A named bundle of access rights that can be assigned to a principal
/// on a target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    /// Service-assigned identifier (stable across renames)
    pub id: String,
    pub name: String,
}

/// An account the service can scope assignments to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub id: String,
    pub name: String,
}

/// A live (principal, permission set, target) binding as reported by
/// the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub principal_id: String,
    pub principal_type: PrincipalType,
    pub permission_set_id: String,
    pub permission_set_name: String,
    pub target_id: String,
}
