// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::app::types::{HostKeyPolicy, SubmissionHost, SubmitMethod};

const APP_DIR_NAME: &str = "runnerd";
const CONFIG_FILE_NAME: &str = "runnerd.toml";
const CONFIG_ENV_VAR: &str = "RUNNERD_CONFIG_PATH";

const DEFAULT_REDIS_URL: &str = "redis://localhost:6379/0";
const DEFAULT_CHANNEL: &str = "dynamore_feature_extraction";
const DEFAULT_JOB_REQUIREMENT: &str = "walltime=1:00:00,mem=4gb";
const DEFAULT_FEATURE_STATS_EXEC: &str = "/opt/dynamore/run-feature-stats.sh";
const DEFAULT_QSUB_EXEC: &str = "/bin/qsub";
const DEFAULT_JOB_NAME: &str = "dynamore-feature-state";
const DEFAULT_SUBMIT_HOSTS: [&str; 5] = [
    "mentat001.dccn.nl:22",
    "mentat002.dccn.nl:22",
    "mentat003.dccn.nl:22",
    "mentat004.dccn.nl:22",
    "mentat005.dccn.nl:22",
];
const DEFAULT_WORKERS: usize = 8;
const DEFAULT_QUEUE_DEPTH: usize = 64;
const DEFAULT_SSH_CONNECT_TIMEOUT_SECS: u64 = 10;

mod env_keys {
    pub const REDIS_URL: &str = "REDIS_URL";
    pub const CHANNEL: &str = "REDIS_PAYLOAD_CHANNEL";
    pub const RUNNER_USER: &str = "EXEC_USER";
    pub const SSH_KEY_DIR: &str = "SSH_KEY_DIR";
    pub const JOB_REQUIREMENT: &str = "TORQUE_JOB_REQUIREMENT";
    pub const JOB_QUEUE: &str = "TORQUE_JOB_QUEUE";
    pub const METHOD: &str = "SUBMIT_METHOD";
    pub const FEATURE_STATS_EXEC: &str = "FEATURE_STATS_EXEC";
    pub const QSUB_EXEC: &str = "QSUB_EXEC";
    pub const JOB_NAME: &str = "TORQUE_JOB_NAME";
    pub const OUTPUT_ROOT: &str = "PAYLOAD_OUTPUT_ROOT";
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    redis_url: Option<String>,
    channel: Option<String>,
    runner_user: Option<String>,
    ssh_key_dir: Option<String>,
    job_requirement: Option<String>,
    job_queue: Option<String>,
    method: Option<SubmitMethod>,
    verbose: Option<bool>,
    feature_stats_exec: Option<String>,
    qsub_exec: Option<String>,
    job_name: Option<String>,
    output_root: Option<String>,
    submit_hosts: Option<Vec<String>>,
    known_hosts_path: Option<String>,
    host_key_policy: Option<HostKeyPolicy>,
    workers: Option<usize>,
    queue_depth: Option<usize>,
    ssh_connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub redis_url: String,
    pub channel: String,
    pub runner_user: String,
    pub ssh_key_dir: PathBuf,
    pub job_requirement: String,
    pub job_queue: Option<String>,
    pub method: SubmitMethod,
    pub verbose: bool,
    pub feature_stats_exec: PathBuf,
    pub qsub_exec: PathBuf,
    pub job_name: String,
    /// `None` means `<runner home>/dynamore-feature-extraction`.
    pub output_root: Option<PathBuf>,
    pub submit_hosts: Vec<SubmissionHost>,
    pub known_hosts_path: Option<PathBuf>,
    pub host_key_policy: HostKeyPolicy,
    pub workers: usize,
    pub queue_depth: usize,
    pub ssh_connect_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Override,
    Env,
    ConfigFile,
    Default,
}

impl ConfigSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfigSource::Override => "override",
            ConfigSource::Env => "env",
            ConfigSource::ConfigFile => "config",
            ConfigSource::Default => "default",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportEntry {
    pub name: &'static str,
    pub value: String,
    pub source: ConfigSource,
}

#[derive(Debug)]
pub struct ConfigReport {
    pub config_path: Option<PathBuf>,
    pub config_path_source: Option<ConfigSource>,
    pub config_file_present: bool,
    pub entries: Vec<ReportEntry>,
}

impl ConfigReport {
    #[cfg(test)]
    pub fn source_of(&self, name: &str) -> Option<ConfigSource> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.source)
    }
}

#[derive(Debug)]
pub struct LoadResult {
    pub config: Config,
    pub report: ConfigReport,
}

/// Values given on the command line.
#[derive(Debug, Default)]
pub struct Overrides {
    pub redis_url: Option<String>,
    pub channel: Option<String>,
    pub runner_user: Option<String>,
    pub ssh_key_dir: Option<PathBuf>,
    pub job_requirement: Option<String>,
    pub job_queue: Option<String>,
    pub method: Option<SubmitMethod>,
    pub verbose: Option<bool>,
}

/// Resolves one setting at a time and records where each value came from.
struct Resolver<'a> {
    config_dir: Option<&'a Path>,
    entries: Vec<ReportEntry>,
}

impl Resolver<'_> {
    fn record<T>(&mut self, name: &'static str, value: T, source: ConfigSource, shown: String) -> T {
        self.entries.push(ReportEntry {
            name,
            value: shown,
            source,
        });
        value
    }

    /// Pick override, env, file or default, in that order.
    fn pick<T: Display>(
        &mut self,
        name: &'static str,
        overridden: Option<T>,
        env: Option<Result<T>>,
        file: Option<T>,
        default: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        let (value, source) = if let Some(value) = overridden {
            (value, ConfigSource::Override)
        } else if let Some(value) = env {
            (value?, ConfigSource::Env)
        } else if let Some(value) = file {
            (value, ConfigSource::ConfigFile)
        } else {
            (default()?, ConfigSource::Default)
        };
        let shown = value.to_string();
        Ok(self.record(name, value, source, shown))
    }

    fn pick_path(
        &mut self,
        name: &'static str,
        overridden: Option<PathBuf>,
        env_key: &str,
        file: Option<String>,
        default: impl FnOnce() -> Result<PathBuf>,
    ) -> Result<PathBuf> {
        let (value, source) = if let Some(path) = overridden {
            (expand_path(path), ConfigSource::Override)
        } else if let Some(raw) = env_var(env_key) {
            (expand_path(PathBuf::from(raw)), ConfigSource::Env)
        } else if let Some(raw) = file {
            (resolve_path(&raw, self.config_dir), ConfigSource::ConfigFile)
        } else {
            (default()?, ConfigSource::Default)
        };
        let shown = value.display().to_string();
        Ok(self.record(name, value, source, shown))
    }
}

pub fn load_with_report(
    config_path_override: Option<PathBuf>,
    overrides: Overrides,
) -> Result<LoadResult> {
    let (config_path, config_path_source, required) = match config_path_override {
        Some(path) => (Some(expand_path(path)), Some(ConfigSource::Override), true),
        None => match config_path_from_env()? {
            Some(path) => (Some(expand_path(path)), Some(ConfigSource::Env), true),
            None => match default_config_path().ok() {
                Some(path) => (Some(path), Some(ConfigSource::Default), false),
                None => (None, None, false),
            },
        },
    };
    let config_file_present = config_path
        .as_deref()
        .map(|path| path.exists())
        .unwrap_or(false);
    let file = match config_path.as_deref() {
        Some(path) => read_config_file(path, required)?,
        None => FileConfig::default(),
    };

    let mut r = Resolver {
        config_dir: config_path.as_deref().and_then(|path| path.parent()),
        entries: Vec::new(),
    };

    let redis_url = r.pick(
        "redis_url",
        overrides.redis_url,
        env_var(env_keys::REDIS_URL).map(Ok),
        file.redis_url,
        || Ok(DEFAULT_REDIS_URL.to_string()),
    )?;
    let channel = r.pick(
        "channel",
        overrides.channel,
        env_var(env_keys::CHANNEL).map(Ok),
        file.channel,
        || Ok(DEFAULT_CHANNEL.to_string()),
    )?;
    let runner_user = r.pick(
        "runner_user",
        overrides.runner_user,
        env_var(env_keys::RUNNER_USER).map(Ok),
        file.runner_user,
        || {
            crate::adapters::identity::current_username()
                .context("cannot resolve the current user; pass --runner-user")
        },
    )?;
    let ssh_key_dir = r.pick_path(
        "ssh_key_dir",
        overrides.ssh_key_dir,
        env_keys::SSH_KEY_DIR,
        file.ssh_key_dir,
        default_ssh_key_dir,
    )?;
    let job_requirement = r.pick(
        "job_requirement",
        overrides.job_requirement,
        env_var(env_keys::JOB_REQUIREMENT).map(Ok),
        file.job_requirement,
        || Ok(DEFAULT_JOB_REQUIREMENT.to_string()),
    )?;
    let job_queue = r
        .pick(
            "job_queue",
            overrides.job_queue,
            env_var(env_keys::JOB_QUEUE).map(Ok),
            file.job_queue,
            || Ok(String::new()),
        )?
        .trim()
        .to_string();
    let method = r.pick(
        "method",
        overrides.method,
        env_var(env_keys::METHOD).map(|raw| parse_env(env_keys::METHOD, &raw)),
        file.method,
        || Ok(SubmitMethod::Ssh),
    )?;
    let verbose = r.pick("verbose", overrides.verbose, None, file.verbose, || Ok(false))?;
    let feature_stats_exec = r.pick_path(
        "feature_stats_exec",
        None,
        env_keys::FEATURE_STATS_EXEC,
        file.feature_stats_exec,
        || Ok(PathBuf::from(DEFAULT_FEATURE_STATS_EXEC)),
    )?;
    let qsub_exec = r.pick_path(
        "qsub_exec",
        None,
        env_keys::QSUB_EXEC,
        file.qsub_exec,
        || Ok(PathBuf::from(DEFAULT_QSUB_EXEC)),
    )?;
    let job_name = r.pick(
        "job_name",
        None,
        env_var(env_keys::JOB_NAME).map(Ok),
        file.job_name,
        || Ok(DEFAULT_JOB_NAME.to_string()),
    )?;
    let output_root = match (env_var(env_keys::OUTPUT_ROOT), file.output_root) {
        (Some(raw), _) => {
            let path = expand_path(PathBuf::from(raw));
            let shown = path.display().to_string();
            Some(r.record("output_root", path, ConfigSource::Env, shown))
        }
        (None, Some(raw)) => {
            let path = resolve_path(&raw, r.config_dir);
            let shown = path.display().to_string();
            Some(r.record("output_root", path, ConfigSource::ConfigFile, shown))
        }
        (None, None) => r.record(
            "output_root",
            None,
            ConfigSource::Default,
            "<runner home>/dynamore-feature-extraction".to_string(),
        ),
    };

    let (submit_hosts, hosts_source) = match file.submit_hosts {
        Some(raw) => (raw, ConfigSource::ConfigFile),
        None => (
            DEFAULT_SUBMIT_HOSTS.iter().map(|h| h.to_string()).collect(),
            ConfigSource::Default,
        ),
    };
    let submit_hosts = submit_hosts
        .iter()
        .map(|raw| raw.parse::<SubmissionHost>())
        .collect::<Result<Vec<_>, _>>()
        .context("invalid submit_hosts in config file")?;
    let shown = submit_hosts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");
    let submit_hosts = r.record("submit_hosts", submit_hosts, hosts_source, shown);

    let known_hosts_path = match file.known_hosts_path {
        Some(raw) => {
            let path = resolve_path(&raw, r.config_dir);
            let shown = path.display().to_string();
            Some(r.record("known_hosts_path", path, ConfigSource::ConfigFile, shown))
        }
        None => r.record(
            "known_hosts_path",
            None,
            ConfigSource::Default,
            "~/.ssh/known_hosts".to_string(),
        ),
    };
    let host_key_policy = match file.host_key_policy {
        Some(policy) => r.record(
            "host_key_policy",
            policy,
            ConfigSource::ConfigFile,
            policy.as_str().to_string(),
        ),
        None => r.record(
            "host_key_policy",
            HostKeyPolicy::AcceptNew,
            ConfigSource::Default,
            HostKeyPolicy::AcceptNew.as_str().to_string(),
        ),
    };
    let workers = r.pick("workers", None, None, file.workers, || Ok(DEFAULT_WORKERS))?;
    let queue_depth = r.pick("queue_depth", None, None, file.queue_depth, || {
        Ok(DEFAULT_QUEUE_DEPTH)
    })?;
    let ssh_connect_timeout_secs = r.pick(
        "ssh_connect_timeout_secs",
        None,
        None,
        file.ssh_connect_timeout_secs,
        || Ok(DEFAULT_SSH_CONNECT_TIMEOUT_SECS),
    )?;

    if redis_url.trim().is_empty() {
        bail!("redis_url must not be empty");
    }
    if channel.trim().is_empty() {
        bail!("channel must not be empty");
    }
    if runner_user.trim().is_empty() {
        bail!("runner_user must not be empty");
    }
    if job_name.trim().is_empty() {
        bail!("job_name must not be empty");
    }
    if workers == 0 {
        bail!("workers must be at least 1");
    }
    if queue_depth == 0 {
        bail!("queue_depth must be at least 1");
    }
    if ssh_connect_timeout_secs == 0 {
        bail!("ssh_connect_timeout_secs must be at least 1");
    }
    if method == SubmitMethod::Ssh && submit_hosts.is_empty() {
        bail!("submit_hosts must not be empty when submitting over ssh");
    }

    let config = Config {
        redis_url,
        channel,
        runner_user,
        ssh_key_dir,
        job_requirement,
        job_queue: Some(job_queue).filter(|q| !q.is_empty()),
        method,
        verbose,
        feature_stats_exec,
        qsub_exec,
        job_name,
        output_root,
        submit_hosts,
        known_hosts_path,
        host_key_policy,
        workers,
        queue_depth,
        ssh_connect_timeout: Duration::from_secs(ssh_connect_timeout_secs),
    };
    let entries = r.entries;
    let report = ConfigReport {
        config_path,
        config_path_source,
        config_file_present,
        entries,
    };
    Ok(LoadResult { config, report })
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn parse_env<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr<Err = String>,
{
    raw.parse::<T>()
        .map_err(|err| anyhow::anyhow!("invalid {key}: {err}"))
}

fn read_config_file(path: &Path, required: bool) -> Result<FileConfig> {
    if !path.exists() {
        if required {
            bail!("config file not found at {}", path.display());
        }
        return Ok(FileConfig::default());
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

fn resolve_path(raw: &str, base_dir: Option<&Path>) -> PathBuf {
    let expanded = shellexpand::tilde(raw);
    let path = PathBuf::from(expanded.as_ref());
    if path.is_absolute() {
        return path;
    }
    match base_dir {
        Some(dir) => dir.join(path),
        None => path,
    }
}

fn expand_path(path: PathBuf) -> PathBuf {
    let path_string = path.to_string_lossy().to_string();
    let expanded = shellexpand::tilde(&path_string);
    PathBuf::from(expanded.as_ref())
}

fn config_path_from_env() -> Result<Option<PathBuf>> {
    match std::env::var_os(CONFIG_ENV_VAR) {
        Some(value) => {
            if value.is_empty() {
                bail!("{CONFIG_ENV_VAR} is set but empty");
            }
            Ok(Some(PathBuf::from(value)))
        }
        None => Ok(None),
    }
}

fn default_config_path() -> Result<PathBuf> {
    let base = dirs::config_dir().context("failed to resolve config directory")?;
    Ok(base.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

fn default_ssh_key_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .context("failed to resolve home directory; specify --ssh-key-dir")?;
    Ok(home.join(".ssh").join("dfe_runner"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::sync::{Mutex, MutexGuard};
    use tempfile::TempDir;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ALL_ENV: [&str; 12] = [
        CONFIG_ENV_VAR,
        env_keys::REDIS_URL,
        env_keys::CHANNEL,
        env_keys::RUNNER_USER,
        env_keys::SSH_KEY_DIR,
        env_keys::JOB_REQUIREMENT,
        env_keys::JOB_QUEUE,
        env_keys::METHOD,
        env_keys::FEATURE_STATS_EXEC,
        env_keys::QSUB_EXEC,
        env_keys::JOB_NAME,
        env_keys::OUTPUT_ROOT,
    ];

    struct EnvVarGuard {
        key: &'static str,
        prev: Option<OsString>,
    }

    impl EnvVarGuard {
        fn set(key: &'static str, value: &str) -> Self {
            let prev = std::env::var_os(key);
            // SAFETY: tests serialize env mutations with ENV_LOCK.
            unsafe {
                std::env::set_var(key, value);
            }
            Self { key, prev }
        }

        fn clear(key: &'static str) -> Self {
            let prev = std::env::var_os(key);
            // SAFETY: tests serialize env mutations with ENV_LOCK.
            unsafe {
                std::env::remove_var(key);
            }
            Self { key, prev }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            match &self.prev {
                Some(value) => {
                    // SAFETY: tests serialize env mutations with ENV_LOCK.
                    unsafe {
                        std::env::set_var(self.key, value);
                    }
                }
                None => {
                    // SAFETY: tests serialize env mutations with ENV_LOCK.
                    unsafe {
                        std::env::remove_var(self.key);
                    }
                }
            }
        }
    }

    /// Lock the environment and clear every variable config reads.
    fn clean_env() -> (MutexGuard<'static, ()>, Vec<EnvVarGuard>) {
        let lock = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let guards = ALL_ENV.iter().map(|key| EnvVarGuard::clear(*key)).collect();
        (lock, guards)
    }

    fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("runnerd.toml");
        fs::write(&path, contents).unwrap();
        path
    }

    fn with_user() -> Overrides {
        Overrides {
            runner_user: Some("dfe".into()),
            ..Overrides::default()
        }
    }

    #[test]
    fn missing_optional_config_file_is_ok() {
        let dir = TempDir::new().unwrap();
        let cfg = read_config_file(&dir.path().join("missing.toml"), false).unwrap();
        assert!(cfg.redis_url.is_none());
        assert!(cfg.submit_hosts.is_none());
    }

    #[test]
    fn missing_required_config_file_errors() {
        let _env = clean_env();
        let dir = TempDir::new().unwrap();
        let err = load_with_report(Some(dir.path().join("missing.toml")), with_user()).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn unknown_config_keys_are_rejected() {
        let _env = clean_env();
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "redis_uri = \"redis://x\"\n");
        let err = load_with_report(Some(path), with_user()).unwrap_err();
        assert!(format!("{err:#}").contains("redis_uri"));
    }

    #[test]
    fn defaults_apply_without_file_or_env() {
        let _env = clean_env();
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "");
        let LoadResult { config, report } = load_with_report(Some(path), with_user()).unwrap();

        assert_eq!(config.redis_url, DEFAULT_REDIS_URL);
        assert_eq!(config.channel, DEFAULT_CHANNEL);
        assert_eq!(config.job_requirement, DEFAULT_JOB_REQUIREMENT);
        assert_eq!(config.job_queue, None);
        assert_eq!(config.method, SubmitMethod::Ssh);
        assert_eq!(config.feature_stats_exec, PathBuf::from(DEFAULT_FEATURE_STATS_EXEC));
        assert_eq!(config.qsub_exec, PathBuf::from(DEFAULT_QSUB_EXEC));
        assert_eq!(config.job_name, DEFAULT_JOB_NAME);
        assert_eq!(config.output_root, None);
        assert_eq!(config.submit_hosts.len(), 5);
        assert_eq!(config.submit_hosts[0], SubmissionHost::new("mentat001.dccn.nl", 22));
        assert_eq!(config.host_key_policy, HostKeyPolicy::AcceptNew);
        assert_eq!(config.workers, DEFAULT_WORKERS);
        assert_eq!(config.queue_depth, DEFAULT_QUEUE_DEPTH);
        assert_eq!(config.ssh_connect_timeout, Duration::from_secs(10));
        assert!(config.ssh_key_dir.ends_with(".ssh/dfe_runner"));
        assert_eq!(report.source_of("redis_url"), Some(ConfigSource::Default));
        assert_eq!(report.source_of("runner_user"), Some(ConfigSource::Override));
    }

    #[test]
    fn file_env_and_flags_layer_in_order() {
        let _env = clean_env();
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "redis_url = \"redis://file:6379/0\"\n\
             channel = \"file-channel\"\n\
             job_requirement = \"walltime=9:00:00\"\n\
             job_queue = \"file-queue\"\n",
        );
        let _url = EnvVarGuard::set(env_keys::REDIS_URL, "redis://env:6379/0");
        let _queue = EnvVarGuard::set(env_keys::JOB_QUEUE, "env-queue");

        let LoadResult { config, report } = load_with_report(
            Some(path),
            Overrides {
                job_queue: Some("flag-queue".into()),
                ..with_user()
            },
        )
        .unwrap();

        assert_eq!(config.channel, "file-channel");
        assert_eq!(config.job_requirement, "walltime=9:00:00");
        assert_eq!(config.redis_url, "redis://env:6379/0");
        assert_eq!(config.job_queue.as_deref(), Some("flag-queue"));
        assert_eq!(report.source_of("channel"), Some(ConfigSource::ConfigFile));
        assert_eq!(report.source_of("redis_url"), Some(ConfigSource::Env));
        assert_eq!(report.source_of("job_queue"), Some(ConfigSource::Override));
    }

    #[test]
    fn reads_cluster_settings_from_file() {
        let _env = clean_env();
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "submit_hosts = [\"login1.example.org\", \"login2.example.org:2222\"]\n\
             known_hosts_path = \"ssh/known_hosts\"\n\
             host_key_policy = \"strict\"\n\
             output_root = \"/project/dfe\"\n\
             workers = 2\n\
             queue_depth = 4\n\
             ssh_connect_timeout_secs = 3\n\
             method = \"qsub\"\n",
        );
        let config = load_with_report(Some(path), with_user()).unwrap().config;

        assert_eq!(
            config.submit_hosts,
            vec![
                SubmissionHost::new("login1.example.org", 22),
                SubmissionHost::new("login2.example.org", 2222),
            ]
        );
        assert_eq!(config.known_hosts_path, Some(dir.path().join("ssh/known_hosts")));
        assert_eq!(config.host_key_policy, HostKeyPolicy::Strict);
        assert_eq!(config.output_root, Some(PathBuf::from("/project/dfe")));
        assert_eq!(config.workers, 2);
        assert_eq!(config.queue_depth, 4);
        assert_eq!(config.ssh_connect_timeout, Duration::from_secs(3));
        assert_eq!(config.method, SubmitMethod::Qsub);
    }

    #[test]
    fn environment_only_settings_are_read() {
        let _env = clean_env();
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "");
        let _exec = EnvVarGuard::set(env_keys::FEATURE_STATS_EXEC, "/usr/local/bin/fstats");
        let _qsub = EnvVarGuard::set(env_keys::QSUB_EXEC, "/usr/bin/qsub");
        let _name = EnvVarGuard::set(env_keys::JOB_NAME, "dfe");
        let _root = EnvVarGuard::set(env_keys::OUTPUT_ROOT, "/scratch/dfe");
        let _method = EnvVarGuard::set(env_keys::METHOD, "local");

        let LoadResult { config, report } = load_with_report(Some(path), with_user()).unwrap();
        assert_eq!(config.feature_stats_exec, PathBuf::from("/usr/local/bin/fstats"));
        assert_eq!(config.qsub_exec, PathBuf::from("/usr/bin/qsub"));
        assert_eq!(config.job_name, "dfe");
        assert_eq!(config.output_root, Some(PathBuf::from("/scratch/dfe")));
        assert_eq!(config.method, SubmitMethod::Local);
        assert_eq!(report.source_of("output_root"), Some(ConfigSource::Env));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let _env = clean_env();
        let dir = TempDir::new().unwrap();

        let path = write_config(&dir, "workers = 0\n");
        assert!(load_with_report(Some(path), with_user()).is_err());

        let path = write_config(&dir, "submit_hosts = [\"host:notaport\"]\n");
        assert!(load_with_report(Some(path), with_user()).is_err());

        let path = write_config(&dir, "submit_hosts = []\n");
        let err = load_with_report(Some(path), with_user()).unwrap_err();
        assert!(err.to_string().contains("submit_hosts"));

        let path = write_config(&dir, "");
        let _method = EnvVarGuard::set(env_keys::METHOD, "slurm");
        let err = load_with_report(Some(path), with_user()).unwrap_err();
        assert!(err.to_string().contains("SUBMIT_METHOD"));
    }

    #[test]
    fn empty_host_list_is_fine_for_local_submission() {
        let _env = clean_env();
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "submit_hosts = []\nmethod = \"local\"\n");
        let config = load_with_report(Some(path), with_user()).unwrap().config;
        assert!(config.submit_hosts.is_empty());
    }

    #[test]
    fn env_config_path_used_when_no_override() {
        let _env = clean_env();
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "channel = \"from-env-file\"\n");
        let _path = EnvVarGuard::set(CONFIG_ENV_VAR, path.to_str().unwrap());

        let LoadResult { config, report } = load_with_report(None, with_user()).unwrap();
        assert_eq!(config.channel, "from-env-file");
        assert_eq!(report.config_path, Some(path));
        assert_eq!(report.config_path_source, Some(ConfigSource::Env));
    }

    #[test]
    fn cli_config_path_takes_precedence_over_env() {
        let _env = clean_env();
        let dir = TempDir::new().unwrap();
        let env_path = dir.path().join("env.toml");
        let cli_path = dir.path().join("cli.toml");
        fs::write(&env_path, "channel = \"env\"\n").unwrap();
        fs::write(&cli_path, "channel = \"cli\"\n").unwrap();
        let _path = EnvVarGuard::set(CONFIG_ENV_VAR, env_path.to_str().unwrap());

        let LoadResult { config, report } =
            load_with_report(Some(cli_path.clone()), with_user()).unwrap();
        assert_eq!(config.channel, "cli");
        assert_eq!(report.config_path, Some(cli_path));
        assert_eq!(report.config_path_source, Some(ConfigSource::Override));
    }

    #[test]
    fn relative_paths_in_file_resolve_against_its_directory() {
        let dir = TempDir::new().unwrap();
        assert_eq!(
            resolve_path("keys/dfe", Some(dir.path())),
            dir.path().join("keys/dfe")
        );
        assert_eq!(resolve_path("/abs", Some(dir.path())), PathBuf::from("/abs"));
    }
}
