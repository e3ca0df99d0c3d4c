// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::app::errors::SshError;
use crate::app::ports::{ExecCapture, RemoteExecPort};
use crate::app::types::{HostKeyPolicy, SubmissionHost};

mod error;
mod session;

pub mod keys;

pub use session::{RemoteSession, SessionParams, client_config};

#[derive(Debug, Clone)]
pub struct SshSettings {
    /// Private key used for every session.
    pub key_path: PathBuf,
    pub known_hosts_path: Option<PathBuf>,
    pub policy: HostKeyPolicy,
    pub connect_timeout: Duration,
}

/// Opens one short-lived session per command.
#[derive(Clone)]
pub struct SshAdapter {
    settings: Arc<SshSettings>,
    config: Arc<russh::client::Config>,
}

impl SshAdapter {
    pub fn new(settings: SshSettings) -> Self {
        Self {
            settings: Arc::new(settings),
            config: Arc::new(client_config()),
        }
    }

    fn params(&self, host: &SubmissionHost, username: &str) -> SessionParams {
        SessionParams {
            host: host.clone(),
            username: username.to_string(),
            key_path: self.settings.key_path.clone(),
            known_hosts_path: self.settings.known_hosts_path.clone(),
            policy: self.settings.policy,
            connect_timeout: self.settings.connect_timeout,
        }
    }
}

#[async_trait]
impl RemoteExecPort for SshAdapter {
    #[tracing::instrument(
        name = "ssh",
        level = "debug",
        skip(self, host, username, command),
        fields(op = "exec_capture", host = %host, user = %username)
    )]
    async fn exec_capture(
        &self,
        host: &SubmissionHost,
        username: &str,
        command: &str,
    ) -> Result<ExecCapture, SshError> {
        let session = RemoteSession::open(Arc::clone(&self.config), &self.params(host, username)).await?;
        let result = session.exec_capture(command).await;
        session.close().await;
        result
    }
}
