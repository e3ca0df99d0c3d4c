// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::app::errors::DispatchResult;
use crate::app::types::RunnerIdentity;

#[async_trait]
/// Creates the nested output directory of a request below `root`, owned by the
/// runner identity. Idempotent; parents are created before children.
pub trait OutputDirPort: Send + Sync {
    async fn provision(
        &self,
        root: &Path,
        relative: &str,
        identity: &RunnerIdentity,
    ) -> DispatchResult<PathBuf>;
}
