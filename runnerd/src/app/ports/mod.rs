// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

pub mod identity;
pub mod message_source;
pub mod output_dir;
pub mod process;
pub mod remote_exec;

pub use identity::IdentityPort;
pub use message_source::MessageSource;
pub use output_dir::OutputDirPort;
pub use process::{ExitOutcome, ProcessRunnerPort, Redirect};
pub use remote_exec::{ExecCapture, RemoteExecPort};
