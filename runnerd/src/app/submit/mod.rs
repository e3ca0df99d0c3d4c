// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::sync::Arc;

use async_trait::async_trait;

use crate::app::errors::DispatchResult;
use crate::app::ports::{ProcessRunnerPort, RemoteExecPort};
use crate::app::types::{JobSpec, Submission, SubmissionHost, SubmitMethod};

mod local;
mod qsub;
mod remote;

pub use local::LocalExecution;
pub use qsub::DirectQueue;
pub use remote::RemoteQueue;

#[async_trait]
/// Turns a provisioned request into a scheduler job and returns its identifier.
pub trait SubmitStrategy: Send + Sync {
    fn method(&self) -> SubmitMethod;

    async fn submit(&self, submission: &Submission<'_>, spec: &JobSpec) -> DispatchResult<String>;
}

/// Build the strategy selected by configuration.
pub fn build(
    method: SubmitMethod,
    runner: Arc<dyn ProcessRunnerPort>,
    remote: Arc<dyn RemoteExecPort>,
    hosts: Vec<SubmissionHost>,
) -> Arc<dyn SubmitStrategy> {
    match method {
        SubmitMethod::Local => Arc::new(LocalExecution::new(runner)),
        SubmitMethod::Qsub => Arc::new(DirectQueue::new(runner)),
        SubmitMethod::Ssh => Arc::new(RemoteQueue::new(remote, hosts)),
    }
}
