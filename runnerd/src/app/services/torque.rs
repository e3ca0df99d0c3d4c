// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::Path;

use crate::app::services::shell::{join_words, sh_escape};
use crate::app::types::{JobSpec, Request};

/// qsub as found on the login shell `PATH` of a submission host.
pub const REMOTE_QSUB: &str = "qsub";

/// Runtime arguments handed to the feature-extraction executable through `-F`.
pub fn job_arguments(request: &Request) -> String {
    format!(
        "{} {} {}",
        request.user_id, request.session_id, request.output_dir
    )
    .trim_end()
    .to_string()
}

/// Arguments for qsub, without the qsub binary itself.
///
/// The queue is omitted entirely when unset: Torque treats `-q ""` as an
/// invalid queue, not as the default one.
pub fn qsub_args(spec: &JobSpec, request: &Request, output_dir: &Path) -> Vec<String> {
    let output_dir = output_dir.to_string_lossy().into_owned();
    let mut args = vec![
        "-l".to_string(),
        spec.requirement.clone(),
        "-N".to_string(),
        spec.job_name(request),
        "-o".to_string(),
        output_dir.clone(),
        "-e".to_string(),
        output_dir,
        "-F".to_string(),
        job_arguments(request),
    ];
    if let Some(queue) = spec.queue() {
        args.push("-q".to_string());
        args.push(queue.to_string());
    }
    args.push(spec.executable.to_string_lossy().into_owned());
    args
}

/// Full argv for direct submission through the local qsub binary.
pub fn qsub_argv(spec: &JobSpec, request: &Request, output_dir: &Path) -> Vec<String> {
    let mut argv = vec![spec.qsub.to_string_lossy().into_owned()];
    argv.extend(qsub_args(spec, request, output_dir));
    argv
}

/// Single command line run on a submission host. It goes through a login
/// shell so the remote user's profile (module paths, Torque env) applies.
pub fn remote_qsub_command(spec: &JobSpec, request: &Request, output_dir: &Path) -> String {
    let mut words = vec![REMOTE_QSUB.to_string()];
    words.extend(qsub_args(spec, request, output_dir));
    format!("bash -l -c {}", sh_escape(&join_words(&words)))
}

/// Job identifier as printed by qsub, minus the trailing line terminator.
pub fn job_id_from_stdout(stdout: &[u8]) -> String {
    String::from_utf8_lossy(stdout)
        .trim_end_matches(['\r', '\n'])
        .to_string()
}

/// Best human-readable reason for a failed submission.
pub fn failure_detail(stdout: &[u8], stderr: &[u8]) -> String {
    let err = String::from_utf8_lossy(stderr);
    if !err.trim().is_empty() {
        return err.trim().to_string();
    }
    let out = String::from_utf8_lossy(stdout);
    if !out.trim().is_empty() {
        return out.trim().to_string();
    }
    "no error output from qsub".to_string()
}
