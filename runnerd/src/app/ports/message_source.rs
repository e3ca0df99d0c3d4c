// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use async_trait::async_trait;

#[async_trait]
/// Inbound request payloads, one raw message at a time.
pub trait MessageSource: Send {
    /// `Ok(None)` once the subscription has ended for good.
    async fn recv(&mut self) -> anyhow::Result<Option<String>>;
}
