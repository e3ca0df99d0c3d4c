// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::fs::DirBuilder;
use std::io;
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use nix::unistd::{Gid, Uid, chown};

use crate::app::errors::{DispatchError, DispatchResult};
use crate::app::ports::OutputDirPort;
use crate::app::types::{RunnerIdentity, output_segments};

/// Mode of every directory created below the output root.
pub const OUTPUT_DIR_MODE: u32 = 0o770;

/// Creates request output directories on the local filesystem and hands
/// each level over to the runner.
#[derive(Clone, Default)]
pub struct OutputDirs;

impl OutputDirs {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl OutputDirPort for OutputDirs {
    #[tracing::instrument(
        name = "fs",
        level = "debug",
        skip(self, root, identity),
        fields(op = "provision", root = %root.display(), uid = identity.uid)
    )]
    async fn provision(
        &self,
        root: &Path,
        relative: &str,
        identity: &RunnerIdentity,
    ) -> DispatchResult<PathBuf> {
        let root = root.to_path_buf();
        let relative = relative.to_string();
        let (uid, gid) = (identity.uid, identity.gid);
        tokio::task::spawn_blocking(move || provision_blocking(&root, &relative, uid, gid))
            .await
            .map_err(|err| DispatchError::directory(PathBuf::new(), format!("provisioning task failed: {err}")))?
    }
}

/// Create `root/relative` one level at a time, root first. Missing ancestors of
/// the root are created as well but keep the daemon as owner. Existing levels
/// are left in place but still handed to the runner so a rerun repairs
/// ownership.
pub fn provision_blocking(
    root: &Path,
    relative: &str,
    uid: u32,
    gid: u32,
) -> DispatchResult<PathBuf> {
    let segments = output_segments(relative)?;
    let mut builder = DirBuilder::new();
    builder.mode(OUTPUT_DIR_MODE);

    if let Some(parent) = root.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        DirBuilder::new()
            .recursive(true)
            .mode(OUTPUT_DIR_MODE)
            .create(parent)
            .map_err(|err| DispatchError::directory(parent, err))?;
    }
    let mut path = root.to_path_buf();
    ensure_level(&builder, &path, uid, gid)?;
    for segment in segments {
        path.push(segment);
        ensure_level(&builder, &path, uid, gid)?;
    }
    Ok(path)
}

fn ensure_level(builder: &DirBuilder, path: &Path, uid: u32, gid: u32) -> DispatchResult<()> {
    match builder.create(path) {
        Ok(()) => {
            // DirBuilder mode is filtered through the umask.
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(OUTPUT_DIR_MODE))
                .map_err(|err| DispatchError::directory(path, err))?;
            tracing::debug!(path = %path.display(), "created output directory");
        }
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            if !path.is_dir() {
                return Err(DispatchError::directory(path, "exists and is not a directory"));
            }
        }
        Err(err) => return Err(DispatchError::directory(path, err)),
    }
    chown(path, Some(Uid::from_raw(uid)), Some(Gid::from_raw(gid)))
        .map_err(|err| DispatchError::directory(path, format!("cannot change owner to {uid}:{gid}: {err}")))
}
