// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Startup provisioning of the key pair used for submission sessions.

use std::fs::{DirBuilder, OpenOptions};
use std::io::Write;
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use nix::unistd::{Gid, Uid, chown};
use rand::Rng;
use russh::keys::ssh_key::private::{Ed25519Keypair, KeypairData};
use russh::keys::ssh_key::{LineEnding, PrivateKey};

use crate::app::types::RunnerIdentity;

pub const PRIVATE_KEY_FILE: &str = "id_ed25519";
pub const PUBLIC_KEY_FILE: &str = "id_ed25519.pub";
const KEY_DIR_MODE: u32 = 0o700;
const AUTHORIZED_KEYS_MODE: u32 = 0o600;
const PRIVATE_KEY_MODE: u32 = 0o600;
const PUBLIC_KEY_MODE: u32 = 0o644;

pub fn private_key_path(dir: &Path) -> PathBuf {
    dir.join(PRIVATE_KEY_FILE)
}

/// Create the key directory (and parents) and restrict it to its owner.
pub fn ensure_key_dir(dir: &Path) -> Result<()> {
    DirBuilder::new()
        .recursive(true)
        .mode(KEY_DIR_MODE)
        .create(dir)
        .with_context(|| format!("cannot create ssh key directory {}", dir.display()))?;
    std::fs::set_permissions(dir, std::fs::Permissions::from_mode(KEY_DIR_MODE))
        .with_context(|| format!("cannot restrict ssh key directory {}", dir.display()))?;
    Ok(())
}

/// Generate a key pair in `dir` unless one exists, and authorize its public
/// half for `runner`. Returns the private key path.
pub fn ensure_keypair(dir: &Path, runner: &RunnerIdentity) -> Result<PathBuf> {
    let private = private_key_path(dir);
    if private.exists() {
        tracing::debug!(path = %private.display(), "ssh key pair present");
        return Ok(private);
    }

    tracing::info!(path = %private.display(), "generating ssh key pair");
    let (private_pem, public_key) = generate_ed25519(&format!("runnerd@{}", runner.username))?;
    write_key_file(&private, private_pem.as_bytes(), PRIVATE_KEY_MODE)?;
    write_key_file(
        &dir.join(PUBLIC_KEY_FILE),
        format!("{public_key}\n").as_bytes(),
        PUBLIC_KEY_MODE,
    )?;
    authorize_key(runner, &public_key)?;
    Ok(private)
}

/// OpenSSH private key text and `authorized_keys` line of a fresh ed25519 key.
fn generate_ed25519(comment: &str) -> Result<(String, String)> {
    let mut seed = [0u8; 32];
    rand::rng().fill(&mut seed);
    let key = PrivateKey::new(
        KeypairData::Ed25519(Ed25519Keypair::from_seed(&seed)),
        comment,
    )
    .map_err(|err| anyhow!("cannot build ed25519 key: {err}"))?;
    let private = key
        .to_openssh(LineEnding::LF)
        .map_err(|err| anyhow!("cannot encode private key: {err}"))?;
    let public = key
        .public_key()
        .to_openssh()
        .map_err(|err| anyhow!("cannot encode public key: {err}"))?;
    Ok((private.to_string(), public))
}

fn write_key_file(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(mode)
        .open(path)
        .with_context(|| format!("cannot create {}", path.display()))?;
    file.write_all(contents)
        .with_context(|| format!("cannot write {}", path.display()))
}

/// Append `public_key` to the runner's `~/.ssh/authorized_keys` unless it is
/// already listed. Created files belong to the runner.
pub fn authorize_key(runner: &RunnerIdentity, public_key: &str) -> Result<()> {
    let ssh_dir = runner.home.join(".ssh");
    if !ssh_dir.exists() {
        DirBuilder::new()
            .mode(KEY_DIR_MODE)
            .create(&ssh_dir)
            .with_context(|| format!("cannot create {}", ssh_dir.display()))?;
        give_to(&ssh_dir, runner)?;
    }

    let path = ssh_dir.join("authorized_keys");
    if let Ok(existing) = std::fs::read_to_string(&path) {
        if existing.lines().any(|line| line.trim() == public_key) {
            return Ok(());
        }
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .mode(AUTHORIZED_KEYS_MODE)
        .open(&path)
        .with_context(|| format!("cannot open {}", path.display()))?;
    writeln!(file, "{public_key}").with_context(|| format!("cannot update {}", path.display()))?;
    give_to(&path, runner)?;
    tracing::info!(path = %path.display(), user = %runner.username, "authorized submission key");
    Ok(())
}

fn give_to(path: &Path, runner: &RunnerIdentity) -> Result<()> {
    chown(
        path,
        Some(Uid::from_raw(runner.uid)),
        Some(Gid::from_raw(runner.gid)),
    )
    .with_context(|| format!("cannot change owner of {} to {}", path.display(), runner.username))
}
