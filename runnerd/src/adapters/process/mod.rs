// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::fs::File;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use nix::unistd::{Gid, Uid, chown};
use tokio::process::Command;

use crate::app::errors::{DispatchError, DispatchResult};
use crate::app::ports::{ExitOutcome, ProcessRunnerPort, Redirect};
use crate::app::types::RunnerIdentity;

/// Spawns local programs under the runner's uid and gid.
///
/// Supplementary groups of the daemon are not inherited: when running as root,
/// switching uid clears them before exec.
#[derive(Clone, Default)]
pub struct LocalProcesses;

impl LocalProcesses {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessRunnerPort for LocalProcesses {
    #[tracing::instrument(
        name = "process",
        skip(self, identity, argv, stdout, stderr),
        fields(program = argv.first().map(String::as_str).unwrap_or(""), uid = identity.uid)
    )]
    async fn run_as(
        &self,
        identity: &RunnerIdentity,
        argv: &[String],
        stdout: Redirect,
        stderr: Redirect,
    ) -> DispatchResult<ExitOutcome> {
        let Some((program, args)) = argv.split_first() else {
            return Err(DispatchError::submission("empty command line"));
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(stdio_for(&stdout, identity)?)
            .stderr(stdio_for(&stderr, identity)?)
            .uid(identity.uid)
            .gid(identity.gid)
            .kill_on_drop(true);
        if let Some(home) = identity.home.to_str() {
            cmd.env("HOME", home);
        }
        cmd.env("USER", &identity.username)
            .env("LOGNAME", &identity.username);

        // `output()` would force both streams back to pipes.
        let child = cmd.spawn().map_err(|err| {
            DispatchError::submission(format!("cannot start {program}: {err}"))
        })?;
        let output = child.wait_with_output().await.map_err(|err| {
            DispatchError::submission(format!("cannot wait for {program}: {err}"))
        })?;
        tracing::debug!(status = ?output.status, "process finished");
        Ok(ExitOutcome {
            code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

fn stdio_for(redirect: &Redirect, identity: &RunnerIdentity) -> DispatchResult<Stdio> {
    match redirect {
        Redirect::Capture => Ok(Stdio::piped()),
        Redirect::File(path) => Ok(Stdio::from(open_owned(path, identity)?)),
    }
}

/// Create or truncate `path` and give it to the runner before the child
/// writes to it.
fn open_owned(path: &Path, identity: &RunnerIdentity) -> DispatchResult<File> {
    let file = File::create(path).map_err(|err| {
        DispatchError::submission(format!("cannot open {}: {err}", path.display()))
    })?;
    chown(
        path,
        Some(Uid::from_raw(identity.uid)),
        Some(Gid::from_raw(identity.gid)),
    )
    .map_err(|err| {
        DispatchError::submission(format!("cannot change owner of {}: {err}", path.display()))
    })?;
    Ok(file)
}
