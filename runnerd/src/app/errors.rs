// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::fmt;
use std::path::PathBuf;

use thiserror::Error as ThisError;

pub mod codes {
    pub const INVALID_REQUEST: &str = "invalid_request";
    pub const USER_NOT_FOUND: &str = "user_not_found";
    pub const DIRECTORY_ERROR: &str = "directory_error";
    pub const DIAL_FAILURE: &str = "dial_failure";
    pub const AUTHENTICATION_FAILURE: &str = "authentication_failure";
    pub const TIMEOUT: &str = "timeout";
    pub const SESSION_FAILURE: &str = "session_failure";
    pub const HOST_KEY_REJECTED: &str = "host_key_rejected";
    pub const SUBMISSION_FAILED: &str = "submission_failed";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SshErrorKind {
    DialFailure,
    AuthFailure,
    Timeout,
    SessionFailure,
    HostKeyRejected,
}

impl SshErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            SshErrorKind::DialFailure => codes::DIAL_FAILURE,
            SshErrorKind::AuthFailure => codes::AUTHENTICATION_FAILURE,
            SshErrorKind::Timeout => codes::TIMEOUT,
            SshErrorKind::SessionFailure => codes::SESSION_FAILURE,
            SshErrorKind::HostKeyRejected => codes::HOST_KEY_REJECTED,
        }
    }
}

impl fmt::Display for SshErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Failure of one remote session: connect, authenticate, open a channel or run on it.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
#[error("ssh {kind}: {message}")]
pub struct SshError {
    kind: SshErrorKind,
    message: String,
}

impl SshError {
    pub fn new(kind: SshErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> SshErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Per-request failure. Every variant is logged at the dispatch boundary and the
/// request is dropped.
#[derive(Debug, ThisError)]
pub enum DispatchError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("cannot resolve credential of runner {username}: {reason}")]
    UserNotFound { username: String, reason: String },

    #[error("cannot prepare output directory {}: {reason}", path.display())]
    Directory { path: PathBuf, reason: String },

    /// Failed to start or run the scheduler command. Remote submissions keep
    /// the session error that caused it.
    #[error("submission failed: {message}")]
    Submission {
        message: String,
        #[source]
        ssh: Option<SshError>,
    },
}

impl From<SshError> for DispatchError {
    fn from(err: SshError) -> Self {
        DispatchError::Submission {
            message: err.to_string(),
            ssh: Some(err),
        }
    }
}

impl DispatchError {
    pub fn submission(message: impl Into<String>) -> Self {
        DispatchError::Submission {
            message: message.into(),
            ssh: None,
        }
    }

    pub fn directory(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        DispatchError::Directory {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            DispatchError::InvalidRequest(_) => codes::INVALID_REQUEST,
            DispatchError::UserNotFound { .. } => codes::USER_NOT_FOUND,
            DispatchError::Directory { .. } => codes::DIRECTORY_ERROR,
            DispatchError::Submission { ssh: Some(err), .. } => err.kind().code(),
            DispatchError::Submission { ssh: None, .. } => codes::SUBMISSION_FAILED,
        }
    }

    pub fn ssh_error(&self) -> Option<&SshError> {
        match self {
            DispatchError::Submission { ssh, .. } => ssh.as_ref(),
            _ => None,
        }
    }
}

pub type DispatchResult<T> = Result<T, DispatchError>;
