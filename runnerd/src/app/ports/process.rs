// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::PathBuf;

use async_trait::async_trait;

use crate::app::errors::DispatchResult;
use crate::app::types::RunnerIdentity;

/// Where a child's output stream goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
    Capture,
    /// Truncated or created, then owned by the runner identity.
    File(PathBuf),
}

#[derive(Debug, Clone, Default)]
pub struct ExitOutcome {
    /// `None` when the child was killed by a signal.
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ExitOutcome {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

#[async_trait]
/// Runs one child process under another system identity and waits for it.
pub trait ProcessRunnerPort: Send + Sync {
    async fn run_as(
        &self,
        identity: &RunnerIdentity,
        argv: &[String],
        stdout: Redirect,
        stderr: Redirect,
    ) -> DispatchResult<ExitOutcome>;
}
