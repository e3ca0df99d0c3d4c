// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::Path;
use std::sync::Arc;

use russh::client::{AuthResult, Handle};
use russh::keys::PrivateKeyWithHashAlg;

use crate::app::errors::{SshError, SshErrorKind};

use super::ClientHandler;

#[derive(Debug)]
enum AuthDecision {
    Success,
    Failure(String),
}

fn auth_decision(result: AuthResult) -> AuthDecision {
    match result {
        AuthResult::Success => AuthDecision::Success,
        AuthResult::Failure {
            remaining_methods,
            partial_success,
        } => AuthDecision::Failure(format!(
            "publickey rejected (partial_success={partial_success}, remaining={remaining_methods:?})"
        )),
    }
}

fn auth_error(message: impl Into<String>) -> SshError {
    SshError::new(SshErrorKind::AuthFailure, message)
}

/// Public key authentication with the runner's key. There is no interactive
/// fallback: nobody is around to answer prompts.
pub(super) async fn authenticate(
    handle: &mut Handle<ClientHandler>,
    username: &str,
    key_path: &Path,
) -> Result<(), SshError> {
    let key = russh::keys::load_secret_key(key_path, None).map_err(|err| {
        auth_error(format!(
            "failed to load secret key at {}: {err}",
            key_path.display()
        ))
    })?;
    // Prefer SHA-256 for RSA if applicable (ignored for non-RSA keys)
    let hash = handle
        .best_supported_rsa_hash()
        .await
        .map_err(|err| SshError::new(SshErrorKind::SessionFailure, err.to_string()))?
        .flatten();
    let pk = PrivateKeyWithHashAlg::new(Arc::new(key), hash);
    let result = handle
        .authenticate_publickey(username.to_string(), pk)
        .await
        .map_err(|err| auth_error(format!("publickey authentication failed: {err}")))?;
    match auth_decision(result) {
        AuthDecision::Success => Ok(()),
        AuthDecision::Failure(reason) => {
            tracing::debug!("authentication of {username} failed: {reason}");
            Err(auth_error(format!("{username}: {reason}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AuthDecision, auth_decision};
    use russh::client::AuthResult;
    use russh::{MethodKind, MethodSet};

    #[test]
    fn auth_decision_success() {
        let decision = auth_decision(AuthResult::Success);
        assert!(matches!(decision, AuthDecision::Success));
    }

    #[test]
    fn partial_success_is_still_a_failure() {
        let methods = [MethodKind::KeyboardInteractive];
        let decision = auth_decision(AuthResult::Failure {
            remaining_methods: MethodSet::from(methods.as_slice()),
            partial_success: true,
        });
        let AuthDecision::Failure(reason) = decision else {
            panic!("expected auth failure");
        };
        assert!(reason.contains("partial_success=true"));
    }

    #[test]
    fn auth_decision_failure_without_other_methods() {
        let methods = [MethodKind::PublicKey];
        let decision = auth_decision(AuthResult::Failure {
            remaining_methods: MethodSet::from(methods.as_slice()),
            partial_success: false,
        });
        assert!(matches!(decision, AuthDecision::Failure(_)));
    }
}
