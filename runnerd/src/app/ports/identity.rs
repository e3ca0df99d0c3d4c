// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use async_trait::async_trait;

use crate::app::errors::DispatchResult;
use crate::app::types::RunnerIdentity;

#[async_trait]
/// Maps a system username to the identity subprocesses are run as.
/// Lookup only; never touches the filesystem.
pub trait IdentityPort: Send + Sync {
    async fn resolve(&self, username: &str) -> DispatchResult<RunnerIdentity>;
}
