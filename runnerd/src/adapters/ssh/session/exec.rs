// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use russh::ChannelMsg;

use crate::app::errors::{SshError, SshErrorKind};
use crate::app::ports::ExecCapture;

use super::RemoteSession;

/// Exit code reported when the server closes the channel without one.
const MISSING_EXIT_STATUS: i32 = -1;

#[derive(Default)]
struct CaptureState {
    out: Vec<u8>,
    err: Vec<u8>,
    code: Option<i32>,
}

impl CaptureState {
    /// Returns `true` once the channel is done.
    fn handle(&mut self, msg: ChannelMsg) -> bool {
        match msg {
            ChannelMsg::Data { ref data } => self.out.extend_from_slice(data),
            ChannelMsg::ExtendedData { ref data, ext: 1 } => self.err.extend_from_slice(data),
            ChannelMsg::ExitStatus { exit_status } => self.code = Some(exit_status as i32),
            ChannelMsg::Close => return true,
            _ => {}
        }
        false
    }

    fn finish(self) -> ExecCapture {
        ExecCapture {
            stdout: self.out,
            stderr: self.err,
            exit_code: self.code.unwrap_or(MISSING_EXIT_STATUS),
        }
    }
}

fn session_error(message: String) -> SshError {
    SshError::new(SshErrorKind::SessionFailure, message)
}

impl RemoteSession {
    /// Run `command` on a fresh channel and collect its output. The channel is
    /// closed before returning, also on failure.
    pub async fn exec_capture(&self, command: &str) -> Result<ExecCapture, SshError> {
        let mut chan = self
            .handle
            .channel_open_session()
            .await
            .map_err(|err| session_error(format!("cannot open channel on {}: {err}", self.target)))?;
        tracing::debug!("executing '{command}' on {}", self.target);

        let mut state = CaptureState::default();
        let result = match chan.exec(true, command).await {
            Ok(()) => {
                while let Some(msg) = chan.wait().await {
                    if state.handle(msg) {
                        break;
                    }
                }
                Ok(())
            }
            Err(err) => Err(session_error(format!(
                "exec request on {} failed: {err}",
                self.target
            ))),
        };

        let _ = chan.close().await;
        result.map(|()| state.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use russh::CryptoVec;

    #[test]
    fn collects_streams_and_exit_status() {
        let mut state = CaptureState::default();
        assert!(!state.handle(ChannelMsg::Data {
            data: CryptoVec::from_slice(b"12345.")
        }));
        assert!(!state.handle(ChannelMsg::Data {
            data: CryptoVec::from_slice(b"host\n")
        }));
        assert!(!state.handle(ChannelMsg::ExtendedData {
            data: CryptoVec::from_slice(b"warning\n"),
            ext: 1,
        }));
        assert!(!state.handle(ChannelMsg::ExitStatus { exit_status: 0 }));
        assert!(state.handle(ChannelMsg::Close));

        let capture = state.finish();
        assert_eq!(capture.stdout, b"12345.host\n");
        assert_eq!(capture.stderr, b"warning\n");
        assert_eq!(capture.exit_code, 0);
    }

    #[test]
    fn missing_exit_status_is_reported_as_failure() {
        let mut state = CaptureState::default();
        state.handle(ChannelMsg::Eof);
        assert_eq!(state.finish().exit_code, MISSING_EXIT_STATUS);
    }
}
