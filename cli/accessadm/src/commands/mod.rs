// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! accessadm command implementations

pub mod assignment;
pub mod profile;
pub mod rollback;

pub use assignment::{AssignArgs, RevokeArgs};
pub use profile::ProfileCommand;
pub use rollback::RollbackCommand;
