// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::app::errors::{DispatchError, DispatchResult};

const DEFAULT_SSH_PORT: u16 = 22;

/// One feature-extraction request as published on the message bus.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Request {
    /// User id the raw data concerns.
    #[serde(rename = "userID")]
    pub user_id: String,
    /// Experiment session id the raw data concerns.
    #[serde(rename = "sessionID")]
    pub session_id: String,
    /// Output location relative to the output root.
    #[serde(rename = "outputDirectory", default)]
    pub output_dir: String,
}

impl Request {
    /// Parse and validate one inbound message. Malformed messages are rejected
    /// instead of being dispatched with empty identifiers.
    pub fn decode(payload: &str) -> DispatchResult<Self> {
        let request: Request = serde_json::from_str(payload)
            .map_err(|err| DispatchError::InvalidRequest(format!("malformed payload: {err}")))?;
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> DispatchResult<()> {
        validate_identifier("userID", &self.user_id)?;
        validate_identifier("sessionID", &self.session_id)?;
        output_segments(&self.output_dir)?;
        Ok(())
    }

    /// Non-empty segments of the output directory, confined below the output root.
    pub fn output_segments(&self) -> DispatchResult<Vec<&str>> {
        output_segments(&self.output_dir)
    }

    /// File stem shared by the stdout/stderr capture files of this request.
    pub fn log_stem(&self) -> String {
        format!("{}.{}", self.user_id, self.session_id)
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.user_id, self.session_id, self.output_dir)
    }
}

fn validate_identifier(field: &str, value: &str) -> DispatchResult<()> {
    if value.is_empty() {
        return Err(DispatchError::InvalidRequest(format!("{field} is empty")));
    }
    let bad = value
        .chars()
        .find(|c| matches!(c, '/' | '\'' | '"' | '`' | '\\') || c.is_whitespace() || c.is_control());
    if let Some(c) = bad {
        return Err(DispatchError::InvalidRequest(format!(
            "{field} contains forbidden character {c:?}"
        )));
    }
    Ok(())
}

pub(crate) fn output_segments(raw: &str) -> DispatchResult<Vec<&str>> {
    if raw.starts_with('/') {
        return Err(DispatchError::InvalidRequest(format!(
            "outputDirectory must be relative: {raw}"
        )));
    }
    let mut segments = Vec::new();
    for segment in raw.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(DispatchError::InvalidRequest(format!(
                    "outputDirectory escapes the output root: {raw}"
                )));
            }
            s if s.chars().any(|c| c.is_control()) => {
                return Err(DispatchError::InvalidRequest(format!(
                    "outputDirectory contains control characters: {raw:?}"
                )));
            }
            // The directory is also passed in qsub's whitespace-split `-F`.
            s if s.chars().any(char::is_whitespace) => {
                return Err(DispatchError::InvalidRequest(format!(
                    "outputDirectory contains whitespace: {raw:?}"
                )));
            }
            s => segments.push(s),
        }
    }
    Ok(segments)
}

/// System identity that every subprocess of a request runs as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerIdentity {
    pub username: String,
    pub uid: u32,
    pub gid: u32,
    pub home: PathBuf,
}

/// One cluster access point accepting remote submission sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionHost {
    pub host: String,
    pub port: u16,
}

impl SubmissionHost {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for SubmissionHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid submission host {0:?}: expected host or host:port")]
pub struct ParseHostError(String);

impl FromStr for SubmissionHost {
    type Err = ParseHostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (host, port) = match s.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|_| ParseHostError(s.to_string()))?;
                (host, port)
            }
            None => (s, DEFAULT_SSH_PORT),
        };
        if host.is_empty() || port == 0 {
            return Err(ParseHostError(s.to_string()));
        }
        Ok(SubmissionHost::new(host, port))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SubmitMethod {
    /// Run the feature-extraction executable on this host.
    Local,
    /// Submit with the local qsub binary; this host is a submit host.
    Qsub,
    /// Submit through a remote submission host over SSH.
    Ssh,
}

impl SubmitMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            SubmitMethod::Local => "local",
            SubmitMethod::Qsub => "qsub",
            SubmitMethod::Ssh => "ssh",
        }
    }
}

impl fmt::Display for SubmitMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubmitMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(SubmitMethod::Local),
            "qsub" => Ok(SubmitMethod::Qsub),
            "ssh" => Ok(SubmitMethod::Ssh),
            other => Err(format!("unknown submit method {other:?}: expected local, qsub or ssh")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostKeyPolicy {
    /// Only keys already present in known_hosts are accepted.
    Strict,
    /// Unknown hosts are learned on first contact; changed keys are rejected.
    AcceptNew,
}

impl HostKeyPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            HostKeyPolicy::Strict => "strict",
            HostKeyPolicy::AcceptNew => "accept-new",
        }
    }
}

impl FromStr for HostKeyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(HostKeyPolicy::Strict),
            "accept-new" => Ok(HostKeyPolicy::AcceptNew),
            other => Err(format!(
                "unknown host key policy {other:?}: expected strict or accept-new"
            )),
        }
    }
}

/// Scheduler-facing parameters shared by every submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    /// Torque resource requirement, passed to `-l`.
    pub requirement: String,
    /// Torque queue; `None` leaves queue selection to the scheduler.
    pub queue: Option<String>,
    pub job_name_prefix: String,
    /// Feature-extraction executable run by the job.
    pub executable: PathBuf,
    /// Local qsub binary used by direct submission.
    pub qsub: PathBuf,
}

impl JobSpec {
    pub fn job_name(&self, request: &Request) -> String {
        format!(
            "{}-{}-{}",
            self.job_name_prefix, request.user_id, request.session_id
        )
    }

    pub fn queue(&self) -> Option<&str> {
        self.queue.as_deref().filter(|q| !q.trim().is_empty())
    }
}

/// Everything a strategy needs to turn one request into a job.
#[derive(Debug, Clone, Copy)]
pub struct Submission<'a> {
    pub request: &'a Request,
    pub identity: &'a RunnerIdentity,
    /// Provisioned output directory, owned by `identity`.
    pub output_dir: &'a Path,
}
