// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

// Port fakes shared by the app tests.

use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::app::errors::{DispatchResult, SshError};
use crate::app::ports::{ExecCapture, ExitOutcome, ProcessRunnerPort, Redirect, RemoteExecPort};
use crate::app::types::{JobSpec, Request, RunnerIdentity, SubmissionHost};

pub fn identity() -> RunnerIdentity {
    RunnerIdentity {
        username: "runner".into(),
        uid: 1234,
        gid: 5678,
        home: PathBuf::from("/home/runner"),
    }
}

pub fn job_spec(queue: Option<&str>) -> JobSpec {
    JobSpec {
        requirement: "walltime=1:00:00,mem=4gb".into(),
        queue: queue.map(str::to_string),
        job_name_prefix: "dynamore-feature-state".into(),
        executable: PathBuf::from("/opt/dynamore/run-feature-stats.sh"),
        qsub: PathBuf::from("/bin/qsub"),
    }
}

pub fn request(user_id: &str, session_id: &str, output_dir: &str) -> Request {
    Request {
        user_id: user_id.into(),
        session_id: session_id.into(),
        output_dir: output_dir.into(),
    }
}

#[derive(Debug, Clone)]
pub struct RunCall {
    pub argv: Vec<String>,
    pub uid: u32,
    pub stdout: Redirect,
    pub stderr: Redirect,
}

pub struct RecordingRunner {
    outcome: Mutex<Option<DispatchResult<ExitOutcome>>>,
    calls: Mutex<Vec<RunCall>>,
}

impl RecordingRunner {
    pub fn with_outcome(outcome: DispatchResult<ExitOutcome>) -> Self {
        Self {
            outcome: Mutex::new(Some(outcome)),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn exiting(code: i32, stdout: &[u8]) -> Self {
        Self::with_outcome(Ok(ExitOutcome {
            code: Some(code),
            stdout: stdout.to_vec(),
            stderr: Vec::new(),
        }))
    }

    pub fn failing(code: i32, stderr: &[u8]) -> Self {
        Self::with_outcome(Ok(ExitOutcome {
            code: Some(code),
            stdout: Vec::new(),
            stderr: stderr.to_vec(),
        }))
    }

    pub fn calls(&self) -> Vec<RunCall> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl ProcessRunnerPort for RecordingRunner {
    async fn run_as(
        &self,
        identity: &RunnerIdentity,
        argv: &[String],
        stdout: Redirect,
        stderr: Redirect,
    ) -> DispatchResult<ExitOutcome> {
        self.calls.lock().expect("calls lock").push(RunCall {
            argv: argv.to_vec(),
            uid: identity.uid,
            stdout,
            stderr,
        });
        self.outcome
            .lock()
            .expect("outcome lock")
            .take()
            .expect("run_as called more than once")
    }
}

pub struct ScriptedRemoteExec {
    result: Result<ExecCapture, SshError>,
    calls: Mutex<Vec<(SubmissionHost, String, String)>>,
}

impl ScriptedRemoteExec {
    pub fn printing(exit_code: i32, stdout: &[u8]) -> Self {
        Self {
            result: Ok(ExecCapture {
                stdout: stdout.to_vec(),
                stderr: Vec::new(),
                exit_code,
            }),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(err: SshError) -> Self {
        Self {
            result: Err(err),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(SubmissionHost, String, String)> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl RemoteExecPort for ScriptedRemoteExec {
    async fn exec_capture(
        &self,
        host: &SubmissionHost,
        username: &str,
        command: &str,
    ) -> Result<ExecCapture, SshError> {
        self.calls.lock().expect("calls lock").push((
            host.clone(),
            username.to_string(),
            command.to_string(),
        ));
        self.result.clone()
    }
}
