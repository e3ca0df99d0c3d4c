// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::sync::Arc;

use async_trait::async_trait;

use crate::app::errors::{DispatchError, DispatchResult};
use crate::app::ports::{ProcessRunnerPort, Redirect};
use crate::app::types::{JobSpec, Submission, SubmitMethod};

/// Returned for local runs; the executable's own logs are the source of truth.
pub const LOCAL_SUCCESS_TOKEN: &str = "success";

/// Runs the feature-extraction executable on this host, as the runner.
pub struct LocalExecution {
    runner: Arc<dyn ProcessRunnerPort>,
}

impl LocalExecution {
    pub fn new(runner: Arc<dyn ProcessRunnerPort>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl super::SubmitStrategy for LocalExecution {
    fn method(&self) -> SubmitMethod {
        SubmitMethod::Local
    }

    async fn submit(&self, submission: &Submission<'_>, spec: &JobSpec) -> DispatchResult<String> {
        let request = submission.request;
        let argv = vec![
            spec.executable.to_string_lossy().into_owned(),
            request.user_id.clone(),
            request.session_id.clone(),
            request.output_dir.clone(),
        ];
        let stem = request.log_stem();
        let stdout = submission.output_dir.join(format!("{stem}.out"));
        let stderr = submission.output_dir.join(format!("{stem}.err"));
        tracing::debug!(command = ?argv, stdout = %stdout.display(), "running locally");

        let outcome = self
            .runner
            .run_as(
                submission.identity,
                &argv,
                Redirect::File(stdout),
                Redirect::File(stderr),
            )
            .await?;
        if !outcome.success() {
            return Err(DispatchError::submission(format!(
                "{} exited with status {:?}",
                spec.executable.display(),
                outcome.code
            )));
        }
        Ok(LOCAL_SUCCESS_TOKEN.to_string())
    }
}
