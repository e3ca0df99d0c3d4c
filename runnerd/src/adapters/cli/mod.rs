// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::PathBuf;

use clap::{CommandFactory, FromArgMatches, Parser};

use crate::app::types::SubmitMethod;

#[derive(Parser, Debug)]
#[command(
    name = "runnerd",
    version,
    about = "Dispatches feature-extraction payloads from Redis to the Torque cluster",
    long_about = None,
    after_help = "runnerd subscribes to a Redis channel and submits one job per payload.\n\
\n\
Configuration precedence: defaults < config file < environment < command-line flags.\n\
Config path precedence: default location < RUNNERD_CONFIG_PATH < --config.\n\
A missing default config file is OK; a missing explicit one is an error.\n\
Environment: REDIS_URL, REDIS_PAYLOAD_CHANNEL, EXEC_USER, SSH_KEY_DIR, TORQUE_JOB_REQUIREMENT,\n\
TORQUE_JOB_QUEUE, SUBMIT_METHOD, FEATURE_STATS_EXEC, QSUB_EXEC, TORQUE_JOB_NAME, PAYLOAD_OUTPUT_ROOT."
)]
pub struct Opts {
    #[arg(
        long,
        value_name = "PATH",
        help = "Path to a TOML config file. When omitted, runnerd uses RUNNERD_CONFIG_PATH if set, otherwise the default config file location if available."
    )]
    pub config: Option<PathBuf>,
    #[arg(
        short = 'd',
        long,
        value_name = "URL",
        help = "Endpoint url of the Redis server. Overrides REDIS_URL and `redis_url`."
    )]
    pub redis_url: Option<String>,
    #[arg(
        short = 'c',
        long,
        value_name = "CHANNEL",
        help = "Redis channel carrying feature-extraction payloads. Overrides REDIS_PAYLOAD_CHANNEL and `channel`."
    )]
    pub channel: Option<String>,
    #[arg(
        short = 'u',
        long,
        value_name = "USER",
        help = "Run feature-extraction processes and jobs as this user. Overrides EXEC_USER and `runner_user`."
    )]
    pub runner_user: Option<String>,
    #[arg(
        short = 'k',
        long,
        value_name = "PATH",
        help = "Directory in which the SSH key pair is created. Overrides SSH_KEY_DIR and `ssh_key_dir`."
    )]
    pub ssh_key_dir: Option<PathBuf>,
    #[arg(
        short = 'l',
        long,
        value_name = "REQUIREMENT",
        help = "Torque job resource requirement. Overrides TORQUE_JOB_REQUIREMENT and `job_requirement`."
    )]
    pub job_requirement: Option<String>,
    #[arg(
        short = 'q',
        long,
        value_name = "QUEUE",
        help = "Torque job queue. Overrides TORQUE_JOB_QUEUE and `job_queue`."
    )]
    pub job_queue: Option<String>,
    #[arg(
        short = 'm',
        long,
        value_enum,
        value_name = "METHOD",
        help = "How payloads become jobs. Overrides SUBMIT_METHOD and `method`."
    )]
    pub method: Option<SubmitMethod>,
    #[arg(
        short,
        long,
        action = clap::ArgAction::SetTrue,
        help = "Enable debug logging. Overrides `verbose` from the config file."
    )]
    pub verbose: bool,
}

pub struct ParsedOpts {
    pub opts: Opts,
    pub verbose_override: Option<bool>,
}

const HELP_TEMPLATE: &str = r#"{before-help}{about-with-newline}
{usage-heading} {usage}

{all-args}

{after-help}
"#;

pub fn cli_command() -> clap::Command {
    Opts::command().help_template(HELP_TEMPLATE)
}

pub fn parse_opts() -> ParsedOpts {
    parse_from(std::env::args_os())
}

fn parse_from<I, T>(args: I) -> ParsedOpts
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let matches = cli_command().get_matches_from(args);
    let verbose_override = if matches.get_flag("verbose") {
        Some(true)
    } else {
        None
    };
    let opts = Opts::from_arg_matches(&matches).unwrap_or_else(|err| err.exit());
    ParsedOpts {
        opts,
        verbose_override,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        cli_command().debug_assert();
    }

    #[test]
    fn short_flags_map_to_settings() {
        let parsed = parse_from([
            "runnerd", "-d", "redis://cache:6379/2", "-c", "payloads", "-u", "dfe", "-k",
            "/srv/keys", "-l", "walltime=2:00:00", "-q", "long", "-m", "qsub", "-v",
        ]);
        let opts = parsed.opts;
        assert_eq!(opts.redis_url.as_deref(), Some("redis://cache:6379/2"));
        assert_eq!(opts.channel.as_deref(), Some("payloads"));
        assert_eq!(opts.runner_user.as_deref(), Some("dfe"));
        assert_eq!(opts.ssh_key_dir, Some(PathBuf::from("/srv/keys")));
        assert_eq!(opts.job_requirement.as_deref(), Some("walltime=2:00:00"));
        assert_eq!(opts.job_queue.as_deref(), Some("long"));
        assert_eq!(opts.method, Some(SubmitMethod::Qsub));
        assert_eq!(parsed.verbose_override, Some(true));
    }

    #[test]
    fn absent_flags_do_not_override() {
        let parsed = parse_from(["runnerd"]);
        assert!(parsed.opts.redis_url.is_none());
        assert!(parsed.opts.method.is_none());
        assert_eq!(parsed.verbose_override, None);
    }
}
