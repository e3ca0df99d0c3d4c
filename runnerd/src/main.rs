// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::adapters::bus::RedisSource;
use crate::adapters::fs::OutputDirs;
use crate::adapters::identity::{self, SystemUsers};
use crate::adapters::process::LocalProcesses;
use crate::adapters::ssh::{SshAdapter, SshSettings, keys};
use crate::app::dispatcher::{DispatchSettings, Dispatcher};
use crate::app::pool::{DispatchPool, serve};
use crate::app::submit;
use crate::app::types::JobSpec;
use crate::config::Config;

mod adapters;
mod app;
mod config;
mod logging;
mod shutdown;

fn log_config_report(report: &config::ConfigReport) {
    match (&report.config_path, report.config_path_source) {
        (Some(path), Some(source)) => {
            tracing::info!(
                "config path: {} (source={}, present={})",
                path.display(),
                source.as_str(),
                report.config_file_present
            );
        }
        (Some(path), None) => {
            tracing::info!(
                "config path: {} (present={})",
                path.display(),
                report.config_file_present
            );
        }
        (None, _) => {
            tracing::info!("config path: (none)");
        }
    }
    for entry in &report.entries {
        let value = if entry.name == "redis_url" {
            adapters::bus::redacted(&entry.value)
        } else {
            entry.value.clone()
        };
        tracing::info!(
            "config {}: {} (source={})",
            entry.name,
            value,
            entry.source.as_str()
        );
    }
}

fn job_spec(config: &Config) -> JobSpec {
    JobSpec {
        requirement: config.job_requirement.clone(),
        queue: config.job_queue.clone(),
        job_name_prefix: config.job_name.clone(),
        executable: config.feature_stats_exec.clone(),
        qsub: config.qsub_exec.clone(),
    }
}

async fn run(config: Config) -> Result<()> {
    keys::ensure_key_dir(&config.ssh_key_dir)?;
    let runner = identity::lookup(&config.runner_user)
        .with_context(|| format!("runner user {} is unusable", config.runner_user))?;
    let key_path = keys::ensure_keypair(&config.ssh_key_dir, &runner)
        .context("cannot provision the ssh key pair")?;

    let remote = Arc::new(SshAdapter::new(SshSettings {
        key_path,
        known_hosts_path: config.known_hosts_path.clone(),
        policy: config.host_key_policy,
        connect_timeout: config.ssh_connect_timeout,
    }));
    let strategy = submit::build(
        config.method,
        Arc::new(LocalProcesses::new()),
        remote,
        config.submit_hosts.clone(),
    );
    let dispatcher = Dispatcher::new(
        Arc::new(SystemUsers::new()),
        Arc::new(OutputDirs::new()),
        strategy,
        DispatchSettings {
            runner_user: config.runner_user.clone(),
            output_root: config.output_root.clone(),
            job: job_spec(&config),
        },
    );

    let cancel = shutdown::install_shutdown_handler()?;
    let mut source = RedisSource::connect(&config.redis_url, &config.channel).await?;
    let pool = DispatchPool::start(Arc::new(dispatcher), config.workers, config.queue_depth);
    tracing::info!(
        method = config.method.as_str(),
        workers = config.workers,
        "waiting for payloads on {}",
        config.channel
    );

    let served = serve(&mut source, &pool, &cancel).await;
    pool.shutdown().await;
    tracing::info!("dispatcher stopped");
    served
}

#[tokio::main]
async fn main() -> ExitCode {
    let parsed = adapters::cli::parse_opts();
    let opts = parsed.opts;
    let loaded = config::load_with_report(
        opts.config,
        config::Overrides {
            redis_url: opts.redis_url,
            channel: opts.channel,
            runner_user: opts.runner_user,
            ssh_key_dir: opts.ssh_key_dir,
            job_requirement: opts.job_requirement,
            job_queue: opts.job_queue,
            method: opts.method,
            verbose: parsed.verbose_override,
        },
    );
    let config::LoadResult { config, report } = match loaded {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!("runnerd: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    logging::init(config.verbose);
    log_config_report(&report);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
