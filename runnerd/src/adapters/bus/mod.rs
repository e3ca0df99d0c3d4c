// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;

use crate::app::ports::MessageSource;

/// Redis pub/sub subscription on a single channel.
pub struct RedisSource {
    channel: String,
    messages: BoxStream<'static, redis::Msg>,
}

impl RedisSource {
    #[tracing::instrument(name = "bus", skip(url), fields(op = "subscribe"))]
    pub async fn connect(url: &str, channel: &str) -> Result<Self> {
        let client = redis::Client::open(url).context("invalid redis url")?;
        let mut pubsub = client
            .get_async_pubsub()
            .await
            .with_context(|| format!("cannot connect to redis at {}", redacted(url)))?;
        pubsub
            .subscribe(channel)
            .await
            .with_context(|| format!("cannot subscribe to channel {channel}"))?;
        tracing::info!(channel, "subscribed");
        Ok(Self {
            channel: channel.to_string(),
            messages: pubsub.into_on_message().boxed(),
        })
    }
}

#[async_trait]
impl MessageSource for RedisSource {
    async fn recv(&mut self) -> Result<Option<String>> {
        let Some(msg) = self.messages.next().await else {
            tracing::warn!(channel = %self.channel, "subscription ended");
            return Ok(None);
        };
        msg.get_payload::<String>()
            .map(Some)
            .map_err(|err| anyhow!("undecodable message on {}: {err}", self.channel))
    }
}

/// Hide the password part of a redis url for logging.
pub fn redacted(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    match rest.rsplit_once('@') {
        Some((auth, host)) if auth.contains(':') => {
            let user = auth.split(':').next().unwrap_or_default();
            format!("{scheme}://{user}:***@{host}")
        }
        _ => url.to_string(),
    }
}
