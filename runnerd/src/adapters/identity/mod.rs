// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use async_trait::async_trait;
use nix::unistd::User;

use crate::app::errors::{DispatchError, DispatchResult};
use crate::app::ports::IdentityPort;
use crate::app::types::RunnerIdentity;

/// Resolves runner accounts through the system user database.
#[derive(Clone, Default)]
pub struct SystemUsers;

impl SystemUsers {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl IdentityPort for SystemUsers {
    #[tracing::instrument(name = "identity", level = "debug", skip(self))]
    async fn resolve(&self, username: &str) -> DispatchResult<RunnerIdentity> {
        let name = username.to_string();
        tokio::task::spawn_blocking(move || lookup(&name))
            .await
            .map_err(|err| DispatchError::UserNotFound {
                username: username.to_string(),
                reason: format!("lookup task failed: {err}"),
            })?
    }
}

/// Blocking passwd lookup; may go through NSS.
pub fn lookup(username: &str) -> DispatchResult<RunnerIdentity> {
    let not_found = |reason: String| DispatchError::UserNotFound {
        username: username.to_string(),
        reason,
    };
    let user = User::from_name(username)
        .map_err(|errno| not_found(errno.desc().to_string()))?
        .ok_or_else(|| not_found("no such user".to_string()))?;
    Ok(RunnerIdentity {
        username: user.name,
        uid: user.uid.as_raw(),
        gid: user.gid.as_raw(),
        home: user.dir,
    })
}

/// Name of the account this process runs as.
pub fn current_username() -> Option<String> {
    User::from_uid(nix::unistd::Uid::current())
        .ok()
        .flatten()
        .map(|user| user.name)
}
