// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use thiserror::Error as ThisError;

use crate::app::errors::{SshError, SshErrorKind};

/// Error type of the russh client handler. Host key rejections are kept apart
/// from transport errors so they can be reported as such.
#[derive(Debug, ThisError)]
pub enum HandlerError {
    #[error(transparent)]
    Russh(#[from] russh::Error),
    #[error("{0}")]
    HostKey(String),
}

impl HandlerError {
    /// Classify an error returned while establishing the connection.
    pub fn into_connect_error(self, target: &str) -> SshError {
        match self {
            HandlerError::HostKey(message) => SshError::new(SshErrorKind::HostKeyRejected, message),
            HandlerError::Russh(russh::Error::UnknownKey) => SshError::new(
                SshErrorKind::HostKeyRejected,
                format!("server key of {target} was not accepted"),
            ),
            HandlerError::Russh(err) => SshError::new(
                SshErrorKind::DialFailure,
                format!("cannot connect to {target}: {err}"),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_key_errors_are_not_dial_failures() {
        let err = HandlerError::HostKey("changed".into()).into_connect_error("h:22");
        assert_eq!(err.kind(), SshErrorKind::HostKeyRejected);

        let err = HandlerError::from(russh::Error::UnknownKey).into_connect_error("h:22");
        assert_eq!(err.kind(), SshErrorKind::HostKeyRejected);

        let err = HandlerError::from(russh::Error::Disconnect).into_connect_error("h:22");
        assert_eq!(err.kind(), SshErrorKind::DialFailure);
        assert!(err.message().contains("h:22"));
    }
}
