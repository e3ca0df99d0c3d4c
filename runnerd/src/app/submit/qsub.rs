// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::sync::Arc;

use async_trait::async_trait;

use crate::app::errors::{DispatchError, DispatchResult};
use crate::app::ports::{ProcessRunnerPort, Redirect};
use crate::app::services::torque;
use crate::app::types::{JobSpec, Submission, SubmitMethod};

/// Submits through the local qsub binary; this host must be a submit host.
pub struct DirectQueue {
    runner: Arc<dyn ProcessRunnerPort>,
}

impl DirectQueue {
    pub fn new(runner: Arc<dyn ProcessRunnerPort>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl super::SubmitStrategy for DirectQueue {
    fn method(&self) -> SubmitMethod {
        SubmitMethod::Qsub
    }

    async fn submit(&self, submission: &Submission<'_>, spec: &JobSpec) -> DispatchResult<String> {
        let argv = torque::qsub_argv(spec, submission.request, submission.output_dir);
        tracing::debug!(command = ?argv, "submitting with qsub");

        let outcome = self
            .runner
            .run_as(submission.identity, &argv, Redirect::Capture, Redirect::Capture)
            .await?;
        if !outcome.success() {
            let detail = torque::failure_detail(&outcome.stdout, &outcome.stderr);
            tracing::debug!("qsub failed: {detail}");
            return Err(DispatchError::submission(format!(
                "qsub exited with status {:?}: {detail}",
                outcome.code
            )));
        }
        Ok(torque::job_id_from_stdout(&outcome.stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::submit::SubmitStrategy;
    use crate::app::testing::{RecordingRunner, identity, job_spec, request};
    use std::path::Path;

    #[tokio::test]
    async fn returns_qsub_stdout_as_job_id() {
        let runner = Arc::new(RecordingRunner::exiting(0, b"4711.torque.dccn.nl\n"));
        let strategy = DirectQueue::new(runner.clone());
        let req = request("u1", "s1", "");
        let ident = identity();
        let submission = Submission {
            request: &req,
            identity: &ident,
            output_dir: Path::new("/data/out"),
        };

        let job_id = strategy.submit(&submission, &job_spec(None)).await.unwrap();
        assert_eq!(job_id, "4711.torque.dccn.nl");

        let calls = runner.calls();
        let argv = &calls[0].argv;
        assert_eq!(argv[0], "/bin/qsub");
        assert!(argv.windows(2).any(|w| w[0] == "-l" && w[1] == "walltime=1:00:00,mem=4gb"));
        assert!(!argv.iter().any(|a| a == "-q"));
        assert!(argv.iter().any(|a| a == "u1 s1"));
        assert_eq!(calls[0].stdout, Redirect::Capture);
    }

    #[tokio::test]
    async fn passes_queue_when_configured() {
        let runner = Arc::new(RecordingRunner::exiting(0, b"1.host"));
        let strategy = DirectQueue::new(runner.clone());
        let req = request("u1", "s1", "");
        let ident = identity();
        let submission = Submission {
            request: &req,
            identity: &ident,
            output_dir: Path::new("/data/out"),
        };
        strategy.submit(&submission, &job_spec(Some("long"))).await.unwrap();
        let argv = &runner.calls()[0].argv;
        assert!(argv.windows(2).any(|w| w[0] == "-q" && w[1] == "long"));
    }

    #[tokio::test]
    async fn failing_qsub_reports_stderr() {
        let runner = Arc::new(RecordingRunner::failing(1, b"qsub: Unknown queue"));
        let strategy = DirectQueue::new(runner);
        let req = request("u1", "s1", "");
        let ident = identity();
        let submission = Submission {
            request: &req,
            identity: &ident,
            output_dir: Path::new("/data/out"),
        };
        let err = strategy
            .submit(&submission, &job_spec(Some("nope")))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("qsub: Unknown queue"));
    }
}
