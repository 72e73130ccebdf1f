use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::anyhow;
use clap::{ArgAction, Parser};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Global flags that consume the following argument.
const VALUE_FLAGS: &[&str] = &["--rc", "--todorc", "--data"];

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<RcOverride>,
}

/// One config override, `key=value` or `key:value`, with an optional `rc.`
/// prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RcOverride {
    pub key: String,
    pub value: String,
}

impl FromStr for RcOverride {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s.strip_prefix("rc.").unwrap_or(s);
        let (k, v) = body
            .split_once('=')
            .or_else(|| body.split_once(':'))
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;

        let key = k.trim();
        if key.is_empty() {
            return Err(anyhow!("override has an empty key: {s}"));
        }
        Ok(Self {
            key: key.to_string(),
            value: v.trim().to_string(),
        })
    }
}

impl From<RcOverride> for (String, String) {
    fn from(o: RcOverride) -> Self {
        (o.key, o.value)
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "todo",
    version,
    about = "Work and Travel to-do lists",
    disable_help_subcommand = true,
    arg_required_else_help = false
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    pub quiet: u8,

    /// Config override, repeatable.
    #[arg(long = "rc", value_name = "KEY=VALUE", action = ArgAction::Append)]
    pub rc_overrides: Vec<RcOverride>,

    #[arg(long = "todorc")]
    pub todorc: Option<PathBuf>,

    #[arg(long = "data")]
    pub data: Option<PathBuf>,

    /// Answer "Sure" to every confirmation.
    #[arg(short = 'y', long = "yes")]
    pub yes: bool,

    #[arg(value_name = "COMMAND")]
    pub command: Option<String>,

    /// Command arguments; to-do text is taken verbatim.
    #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

fn default_log_level(verbose: u8, quiet: u8) -> &'static str {
    match (quiet, verbose) {
        (2.., _) => "error",
        (1, _) | (0, 0) => "warn",
        (0, 1) => "info",
        (0, 2) => "debug",
        (0, _) => "trace",
    }
}

/// Logs go to stderr so board output on stdout stays clean.
pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_log_level(verbose, quiet)))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls positional `rc.key=value` / `rc.key:value` overrides out of the
/// global section of the command line. Everything from the command token on
/// is left alone, so to-do text is never mistaken for an override.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    let mut flag_value_pending = false;
    let mut command_seen = false;
    for arg in iter {
        if command_seen || flag_value_pending {
            flag_value_pending = false;
            cleaned.push(arg);
            continue;
        }

        let s = arg.to_string_lossy().into_owned();
        if s == "--" {
            command_seen = true;
        } else if s.starts_with('-') {
            flag_value_pending = VALUE_FLAGS.contains(&s.as_str());
        } else if s.starts_with("rc.")
            && let Ok(rc) = s.parse::<RcOverride>()
        {
            debug!(key = %rc.key, value = %rc.value, "captured positional rc override");
            overrides.push(rc);
            continue;
        } else {
            command_seen = true;
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
    #[tracing::instrument(skip(cfg, args))]
    pub fn parse(cfg: &Config, command: Option<&str>, args: Vec<String>) -> anyhow::Result<Self> {
        let Some(first) = command else {
            let cmd = cfg
                .get("default.command")
                .unwrap_or_else(|| "list".to_string());
            debug!(command = %cmd, "no explicit command, using default");
            return Ok(Self {
                command: cmd,
                command_args: args,
            });
        };

        let known = crate::commands::known_command_names();
        let command = crate::commands::expand_command_abbrev(first, &known)
            .ok_or_else(|| anyhow!("unknown or ambiguous command: {first}"))?;
        debug!(token = %first, expanded = %command, "resolved command token");

        Ok(Self {
            command: command.to_string(),
            command_args: args,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use clap::Parser;

    use super::{GlobalCli, Invocation, RcOverride, default_log_level, preprocess_args};
    use crate::config::Config;

    fn os(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn positional_overrides_only_before_the_command() {
        let pre = preprocess_args(&os(&[
            "todo",
            "rc.confirm=off",
            "-v",
            "rc.mode.persist:no",
            "add",
            "rc.plain=text",
        ]))
        .unwrap();

        assert_eq!(pre.cleaned_args, os(&["todo", "-v", "add", "rc.plain=text"]));
        assert_eq!(
            pre.rc_overrides,
            vec![
                RcOverride {
                    key: "confirm".to_string(),
                    value: "off".to_string()
                },
                RcOverride {
                    key: "mode.persist".to_string(),
                    value: "no".to_string()
                },
            ]
        );
    }

    #[test]
    fn todo_text_shaped_like_an_override_is_kept() {
        let raw = os(&["todo", "add", "read", "rc.local:notes"]);
        let pre = preprocess_args(&raw).unwrap();
        assert_eq!(pre.cleaned_args, raw);
        assert!(pre.rc_overrides.is_empty());
    }

    #[test]
    fn flag_values_are_not_mistaken_for_the_command() {
        let pre = preprocess_args(&os(&[
            "todo",
            "--data",
            "/tmp/todo",
            "rc.color=off",
            "list",
        ]))
        .unwrap();
        assert_eq!(pre.cleaned_args, os(&["todo", "--data", "/tmp/todo", "list"]));
        assert_eq!(pre.rc_overrides.len(), 1);
    }

    #[test]
    fn override_parsing() {
        let rc: RcOverride = "rc.data.location=C:/todo".parse().unwrap();
        assert_eq!(rc.key, "data.location");
        assert_eq!(rc.value, "C:/todo");
        assert_eq!("color:off".parse::<RcOverride>().unwrap().value, "off");
        assert!("=off".parse::<RcOverride>().is_err());
        assert!("color".parse::<RcOverride>().is_err());
    }

    #[test]
    fn global_flags_then_command_and_verbatim_args() {
        let cli = GlobalCli::parse_from(os(&[
            "todo", "-vv", "-y", "--rc", "color=off", "add", "Buy", "-milk",
        ]));
        assert_eq!(cli.verbose, 2);
        assert!(cli.yes);
        assert_eq!(cli.rc_overrides[0].key, "color");
        assert_eq!(cli.command.as_deref(), Some("add"));
        assert_eq!(cli.args, strings(&["Buy", "-milk"]));
    }

    #[test]
    fn verbosity_flags_pick_a_level() {
        assert_eq!(default_log_level(0, 0), "warn");
        assert_eq!(default_log_level(1, 0), "info");
        assert_eq!(default_log_level(2, 0), "debug");
        assert_eq!(default_log_level(5, 0), "trace");
        assert_eq!(default_log_level(3, 1), "warn");
        assert_eq!(default_log_level(0, 2), "error");
    }

    #[test]
    fn empty_invocation_uses_default_command() {
        let inv = Invocation::parse(&Config::default(), None, vec![]).unwrap();
        assert_eq!(inv.command, "list");
        assert!(inv.command_args.is_empty());
    }

    #[test]
    fn abbreviations_expand_when_unambiguous() {
        let cfg = Config::default();
        let inv = Invocation::parse(&cfg, Some("tr"), vec![]).unwrap();
        assert_eq!(inv.command, "travel");

        let inv = Invocation::parse(&cfg, Some("ed"), strings(&["12", "new", "text"])).unwrap();
        assert_eq!(inv.command, "edit");
        assert_eq!(inv.command_args, ["12", "new", "text"]);

        assert!(Invocation::parse(&cfg, Some("d"), strings(&["12"])).is_err());
        assert!(Invocation::parse(&cfg, Some("frobnicate"), vec![]).is_err());
    }
}
