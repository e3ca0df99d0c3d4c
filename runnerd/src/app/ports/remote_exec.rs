// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use async_trait::async_trait;

use crate::app::errors::SshError;
use crate::app::types::SubmissionHost;

#[derive(Debug, Clone)]
pub struct ExecCapture {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
}

#[async_trait]
/// Runs one command on a submission host inside a fresh, exclusively owned
/// session that is closed before this call returns.
pub trait RemoteExecPort: Send + Sync {
    async fn exec_capture(
        &self,
        host: &SubmissionHost,
        username: &str,
        command: &str,
    ) -> Result<ExecCapture, SshError>;
}
