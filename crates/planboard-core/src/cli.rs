use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::commands::{DEFAULT_COMMAND, expand_command_abbrev, known_command_names};

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "planboard",
    version,
    about = "Planboard: month calendar scheduling for production orders",
    disable_help_subcommand = true,
    arg_required_else_help = false
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    #[arg(long = "data")]
    pub data: Option<PathBuf>,

    /// Act as this role instead of `access.role`.
    #[arg(long = "role")]
    pub role: Option<String>,

    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub rest: Vec<OsString>,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls positional `rc.key=value` tokens out of the argument list.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = rest
                .split_once('=')
                .or_else(|| rest.split_once(':'))
                .map(|(k, v)| (format!("rc.{k}"), v.to_string()));

            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
                continue;
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: String,
    pub command_args: Vec<String>,
}

impl Invocation {
    #[tracing::instrument(skip(rest))]
    pub fn parse(rest: Vec<OsString>) -> anyhow::Result<Self> {
        let tokens: Vec<String> = rest
            .into_iter()
            .map(|arg| arg.to_string_lossy().to_string())
            .collect();

        let Some((first, args)) = tokens.split_first() else {
            debug!(command = DEFAULT_COMMAND, "no explicit command, using default");
            return Ok(Self {
                command: DEFAULT_COMMAND.to_string(),
                command_args: vec![],
            });
        };

        let known = known_command_names();
        if let Some(full) = expand_command_abbrev(first, &known) {
            debug!(token = %first, expanded = %full, "resolved command token");
            return Ok(Self {
                command: full.to_string(),
                command_args: args.to_vec(),
            });
        }

        // `planboard 2025-03` shows that month.
        if looks_like_month(first) {
            return Ok(Self {
                command: DEFAULT_COMMAND.to_string(),
                command_args: tokens.clone(),
            });
        }

        Err(anyhow!(
            "unknown or ambiguous command: {first} (try `planboard help`)"
        ))
    }
}

fn looks_like_month(token: &str) -> bool {
    let Some((year, month)) = token.split_once('-') else {
        return false;
    };
    year.len() == 4
        && year.chars().all(|ch| ch.is_ascii_digit())
        && !month.is_empty()
        && month.len() <= 2
        && month.chars().all(|ch| ch.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use super::{Invocation, preprocess_args};

    fn os(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[test]
    fn positional_rc_overrides_are_extracted() {
        let pre = preprocess_args(&os(&[
            "planboard",
            "rc.access.role=sales",
            "month",
            "rc.color:off",
        ]))
        .expect("preprocess args");

        assert_eq!(pre.cleaned_args, os(&["planboard", "month"]));
        assert_eq!(
            pre.rc_overrides,
            vec![
                ("rc.access.role".to_string(), "sales".to_string()),
                ("rc.color".to_string(), "off".to_string()),
            ]
        );
    }

    #[test]
    fn commands_accept_unambiguous_prefixes() {
        let inv = Invocation::parse(os(&["sched", "OP-1", "2025-03-10"])).expect("parse");
        assert_eq!(inv.command, "schedule");
        assert_eq!(inv.command_args, vec!["OP-1", "2025-03-10"]);

        let default = Invocation::parse(vec![]).expect("parse");
        assert_eq!(default.command, "month");

        let month = Invocation::parse(os(&["2025-03"])).expect("parse");
        assert_eq!(month.command, "month");
        assert_eq!(month.command_args, vec!["2025-03"]);

        let unschedule = Invocation::parse(os(&["u", "OP-1"])).expect("parse");
        assert_eq!(unschedule.command, "unschedule");

        assert!(Invocation::parse(os(&["frobnicate"])).is_err());
    }
}
