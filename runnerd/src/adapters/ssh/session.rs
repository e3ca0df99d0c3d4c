// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use russh::client::{Config, Handle};
use russh::keys::known_hosts::{learn_known_hosts, learn_known_hosts_path};

use crate::adapters::ssh::error::HandlerError;
use crate::app::errors::{SshError, SshErrorKind};
use crate::app::types::{HostKeyPolicy, SubmissionHost};

mod auth;
mod exec;

/// russh client handler that checks server keys against known_hosts.
#[derive(Clone, Debug)]
pub struct ClientHandler {
    host: String,
    addr: SocketAddr,
    known_hosts_path: Option<PathBuf>,
    policy: HostKeyPolicy,
}

impl russh::client::Handler for ClientHandler {
    type Error = HandlerError;

    async fn check_server_key(
        &mut self,
        server_public_key: &russh::keys::ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        verify_server_key(
            &self.host,
            self.addr,
            server_public_key,
            self.known_hosts_path.as_deref(),
            self.policy,
        )
    }
}

/// Everything needed to open one session as one user.
#[derive(Debug, Clone)]
pub struct SessionParams {
    pub host: SubmissionHost,
    pub username: String,
    pub key_path: PathBuf,
    /// `None` uses the daemon user's `~/.ssh/known_hosts`.
    pub known_hosts_path: Option<PathBuf>,
    pub policy: HostKeyPolicy,
    /// Bound on resolve, connect and authentication together.
    pub connect_timeout: Duration,
}

pub fn client_config() -> Config {
    Config {
        inactivity_timeout: Some(Duration::from_secs(60)),
        ..Default::default()
    }
}

fn check_known_hosts_for(
    host: &str,
    port: u16,
    key: &russh::keys::ssh_key::PublicKey,
    known_hosts_path: Option<&Path>,
) -> Result<bool, russh::keys::Error> {
    match known_hosts_path {
        Some(path) => russh::keys::check_known_hosts_path(host, port, key, path),
        None => russh::keys::check_known_hosts(host, port, key),
    }
}

fn learn_known_hosts_for(
    host: &str,
    port: u16,
    key: &russh::keys::ssh_key::PublicKey,
    known_hosts_path: Option<&Path>,
) -> Result<(), russh::keys::Error> {
    match known_hosts_path {
        Some(path) => learn_known_hosts_path(host, port, key, path),
        None => learn_known_hosts(host, port, key),
    }
}

/// Accept `key` if known_hosts lists it for the host name or its address.
/// A listed but different key is always rejected; an unlisted host is learned
/// only under [`HostKeyPolicy::AcceptNew`].
fn verify_server_key(
    host: &str,
    addr: SocketAddr,
    key: &russh::keys::ssh_key::PublicKey,
    known_hosts_path: Option<&Path>,
    policy: HostKeyPolicy,
) -> Result<bool, HandlerError> {
    let port = addr.port();
    let ip_host = addr.ip().to_string();
    let mut candidates = vec![host];
    if ip_host != host {
        candidates.push(&ip_host);
    }

    for candidate in &candidates {
        match check_known_hosts_for(candidate, port, key, known_hosts_path) {
            Ok(true) => return Ok(true),
            Ok(false) => {}
            Err(err) => {
                tracing::warn!("server key validation failed for {host}:{port}: {err}");
                return Err(HandlerError::HostKey(format!(
                    "server key validation failed for {host}:{port}: {err}"
                )));
            }
        }
    }

    let tried = candidates.join(", ");
    match policy {
        HostKeyPolicy::Strict => Err(HandlerError::HostKey(format!(
            "server key for {host}:{port} is not present in known_hosts (tried {tried})"
        ))),
        HostKeyPolicy::AcceptNew => {
            tracing::info!(
                "server key for {host}:{port} is not present in known_hosts (tried {tried}); learning"
            );
            learn_known_hosts_for(host, port, key, known_hosts_path).map_err(|err| {
                tracing::warn!("failed to learn server key for {host}:{port}: {err}");
                HandlerError::HostKey(format!(
                    "failed to learn server key for {host}:{port}: {err}"
                ))
            })?;
            Ok(true)
        }
    }
}

/// One authenticated connection. Sessions are not reused across requests.
pub struct RemoteSession {
    handle: Handle<ClientHandler>,
    target: String,
}

impl RemoteSession {
    #[tracing::instrument(
        name = "ssh",
        level = "debug",
        skip(config, params),
        fields(op = "open", host = %params.host, user = %params.username)
    )]
    pub async fn open(config: Arc<Config>, params: &SessionParams) -> Result<Self, SshError> {
        let target = format!("{}@{}", params.username, params.host);
        match tokio::time::timeout(params.connect_timeout, Self::establish(config, params)).await
        {
            Ok(res) => res,
            Err(_) => Err(SshError::new(
                SshErrorKind::Timeout,
                format!(
                    "no session with {target} within {}s",
                    params.connect_timeout.as_secs()
                ),
            )),
        }
    }

    async fn establish(config: Arc<Config>, params: &SessionParams) -> Result<Self, SshError> {
        let target = params.host.to_string();
        let addr = tokio::net::lookup_host((params.host.host.as_str(), params.host.port))
            .await
            .map_err(|err| {
                SshError::new(
                    SshErrorKind::DialFailure,
                    format!("cannot resolve {target}: {err}"),
                )
            })?
            .next()
            .ok_or_else(|| {
                SshError::new(
                    SshErrorKind::DialFailure,
                    format!("{target} resolved to no address"),
                )
            })?;

        let handler = ClientHandler {
            host: params.host.host.clone(),
            addr,
            known_hosts_path: params.known_hosts_path.clone(),
            policy: params.policy,
        };
        let mut handle = russh::client::connect(config, addr, handler)
            .await
            .map_err(|err| err.into_connect_error(&target))?;
        tracing::debug!("established connection with {target}, proceeding with auth");

        auth::authenticate(&mut handle, &params.username, &params.key_path).await?;
        Ok(RemoteSession {
            handle,
            target: format!("{}@{}", params.username, target),
        })
    }

    /// Disconnect politely. Errors are only logged: the connection is being
    /// dropped either way.
    pub async fn close(self) {
        if let Err(err) = self
            .handle
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
        {
            tracing::debug!("error while disconnecting from {}: {err}", self.target);
        }
    }
}
