// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::sync::Arc;

use async_trait::async_trait;

use crate::app::errors::{DispatchError, DispatchResult};
use crate::app::ports::RemoteExecPort;
use crate::app::services::{hosts, torque};
use crate::app::types::{JobSpec, Submission, SubmissionHost, SubmitMethod};

/// Submits via a randomly chosen submission host over SSH, as the runner.
/// The output directory must be on storage shared with the cluster.
pub struct RemoteQueue {
    remote: Arc<dyn RemoteExecPort>,
    hosts: Vec<SubmissionHost>,
}

impl RemoteQueue {
    pub fn new(remote: Arc<dyn RemoteExecPort>, hosts: Vec<SubmissionHost>) -> Self {
        Self { remote, hosts }
    }
}

#[async_trait]
impl super::SubmitStrategy for RemoteQueue {
    fn method(&self) -> SubmitMethod {
        SubmitMethod::Ssh
    }

    async fn submit(&self, submission: &Submission<'_>, spec: &JobSpec) -> DispatchResult<String> {
        let host = hosts::select_host(&self.hosts)
            .ok_or_else(|| DispatchError::submission("no submission hosts configured"))?;
        let command = torque::remote_qsub_command(spec, submission.request, submission.output_dir);
        tracing::debug!(%host, %command, "submitting over ssh");

        let capture = self
            .remote
            .exec_capture(host, &submission.identity.username, &command)
            .await?;
        if capture.exit_code != 0 {
            let detail = torque::failure_detail(&capture.stdout, &capture.stderr);
            tracing::debug!(%host, "remote qsub failed: {detail}");
            return Err(DispatchError::submission(format!(
                "qsub on {host} exited with status {}: {detail}",
                capture.exit_code
            )));
        }
        Ok(torque::job_id_from_stdout(&capture.stdout))
    }
}
