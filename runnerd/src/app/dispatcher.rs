// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::PathBuf;
use std::sync::Arc;

use crate::app::errors::DispatchResult;
use crate::app::ports::{IdentityPort, OutputDirPort};
use crate::app::submit::SubmitStrategy;
use crate::app::types::{JobSpec, Request, RunnerIdentity, Submission};

const DEFAULT_OUTPUT_DIR_NAME: &str = "dynamore-feature-extraction";

/// Read-only settings shared by every dispatch.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub runner_user: String,
    /// Root below which request output directories are created. Defaults to
    /// a directory in the runner's home.
    pub output_root: Option<PathBuf>,
    pub job: JobSpec,
}

impl DispatchSettings {
    pub fn output_root_for(&self, identity: &RunnerIdentity) -> PathBuf {
        match &self.output_root {
            Some(root) => root.clone(),
            None => identity.home.join(DEFAULT_OUTPUT_DIR_NAME),
        }
    }
}

/// Turns one inbound payload into one submitted job.
#[derive(Clone)]
pub struct Dispatcher {
    identities: Arc<dyn IdentityPort>,
    output_dirs: Arc<dyn OutputDirPort>,
    strategy: Arc<dyn SubmitStrategy>,
    settings: Arc<DispatchSettings>,
}

impl Dispatcher {
    pub fn new(
        identities: Arc<dyn IdentityPort>,
        output_dirs: Arc<dyn OutputDirPort>,
        strategy: Arc<dyn SubmitStrategy>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            identities,
            output_dirs,
            strategy,
            settings: Arc::new(settings),
        }
    }

    pub async fn dispatch(&self, payload: &str) -> DispatchResult<String> {
        let request = Request::decode(payload)?;
        self.dispatch_request(&request).await
    }

    #[tracing::instrument(
        name = "dispatch",
        skip(self, request),
        fields(
            user_id = %request.user_id,
            session_id = %request.session_id,
            method = self.strategy.method().as_str(),
        )
    )]
    pub async fn dispatch_request(&self, request: &Request) -> DispatchResult<String> {
        let identity = self.identities.resolve(&self.settings.runner_user).await?;
        let root = self.settings.output_root_for(&identity);
        let output_dir = self
            .output_dirs
            .provision(&root, &request.output_dir, &identity)
            .await?;
        let submission = Submission {
            request,
            identity: &identity,
            output_dir: &output_dir,
        };
        self.strategy.submit(&submission, &self.settings.job).await
    }

    /// Dispatch and report. Failures are logged and the request is dropped;
    /// redelivery is up to the publisher.
    pub async fn handle(&self, payload: &str) {
        tracing::info!(%payload, "payload received");
        let request = match Request::decode(payload) {
            Ok(request) => request,
            Err(err) => {
                tracing::error!(code = err.code(), %payload, "rejecting payload: {err}");
                return;
            }
        };
        match self.dispatch_request(&request).await {
            Ok(job_id) => tracing::info!(
                user_id = %request.user_id,
                session_id = %request.session_id,
                %job_id,
                "[{request}] payload submitted as job {job_id}"
            ),
            Err(err) => tracing::error!(
                user_id = %request.user_id,
                session_id = %request.session_id,
                code = err.code(),
                "[{request}] cannot submit payload: {err}"
            ),
        }
    }
}
