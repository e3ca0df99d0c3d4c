// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::sync::Arc;

use anyhow::bail;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::app::dispatcher::Dispatcher;
use crate::app::ports::MessageSource;

/// Fixed set of workers draining a bounded queue of payloads.
///
/// `submit` waits for queue capacity, so a slow scheduler pushes back on the
/// subscription instead of growing memory.
pub struct DispatchPool {
    tx: Option<mpsc::Sender<String>>,
    workers: JoinSet<()>,
}

impl DispatchPool {
    pub fn start(dispatcher: Arc<Dispatcher>, workers: usize, queue_depth: usize) -> Self {
        let (tx, rx) = mpsc::channel::<String>(queue_depth.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let mut set = JoinSet::new();
        for worker in 0..workers.max(1) {
            let rx = Arc::clone(&rx);
            let dispatcher = Arc::clone(&dispatcher);
            set.spawn(async move {
                loop {
                    let next = { rx.lock().await.recv().await };
                    let Some(payload) = next else {
                        break;
                    };
                    dispatcher.handle(&payload).await;
                }
                tracing::debug!(worker, "dispatch worker stopped");
            });
        }
        Self {
            tx: Some(tx),
            workers: set,
        }
    }

    pub async fn submit(&self, payload: String) -> anyhow::Result<()> {
        match &self.tx {
            Some(tx) => tx
                .send(payload)
                .await
                .map_err(|_| anyhow::anyhow!("dispatch workers are gone")),
            None => bail!("dispatch pool is shut down"),
        }
    }

    /// Stop accepting work and wait until every queued payload was handled.
    pub async fn shutdown(mut self) {
        self.tx.take();
        while let Some(res) = self.workers.join_next().await {
            if let Err(err) = res {
                tracing::error!("dispatch worker failed: {err}");
            }
        }
    }
}

/// Feed messages from `source` into `pool` until cancelled.
///
/// A receive error is logged and the loop continues; a closed source ends
/// the loop with an error.
pub async fn serve<S: MessageSource>(
    source: &mut S,
    pool: &DispatchPool,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("shutdown requested, no longer accepting messages");
                return Ok(());
            }
            next = source.recv() => next,
        };
        match next {
            Ok(Some(payload)) => pool.submit(payload).await?,
            Ok(None) => bail!("message source closed"),
            Err(err) => tracing::warn!("cannot receive message: {err:#}"),
        }
    }
}
