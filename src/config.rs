use nix::sys::signal::Signal;

use crate::error::{Result, ShellError};

pub const USAGE: &str = "Usage: esh [-h] [-V] [-c command]
 -h            print this help
 -V            print the version
 -c command    run one command line and exit";

/// Signal numbers the job-control core relies on.
///
/// Every signal the shell sends, catches or distinguishes goes through here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalConfig {
    /// Delivered when a child exits, stops or continues.
    pub child_status: Signal,
    /// Terminal suspend request (Ctrl-Z).
    pub suspend: Signal,
    /// Terminal interrupt request (Ctrl-C).
    pub interrupt: Signal,
    /// Raised when a background process touches the terminal.
    pub background_write: Signal,
    /// Raised when a background process reads from the terminal.
    pub background_read: Signal,
    /// Internal stop: jobs stopped by it are not announced. Also what `stop` sends.
    pub silent_stop: Signal,
    /// What `kill` sends.
    pub terminate: Signal,
    pub resume: Signal,
    /// Sent to stopped jobs when the shell exits.
    pub hangup: Signal,
    /// Kills what already started of a pipeline whose launch failed.
    pub abort: Signal,
}

impl Default for SignalConfig {
    fn default() -> Self {
        SignalConfig {
            child_status: Signal::SIGCHLD,
            suspend: Signal::SIGTSTP,
            interrupt: Signal::SIGINT,
            background_write: Signal::SIGTTOU,
            background_read: Signal::SIGTTIN,
            silent_stop: Signal::SIGSTOP,
            terminate: Signal::SIGTERM,
            resume: Signal::SIGCONT,
            hangup: Signal::SIGHUP,
            abort: Signal::SIGKILL,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ShellConfig {
    /// Fixed prompt from `ESH_PROMPT`; `None` builds one from the working directory.
    pub prompt: Option<String>,
    /// Command line given with `-c`.
    pub command: Option<String>,
    /// Tracing filter directives from `ESH_LOG`.
    pub log_filter: Option<String>,
    pub signals: SignalConfig,
}

/// What the command line asked for.
#[derive(Debug)]
pub enum Invocation {
    Run(ShellConfig),
    Help,
    Version,
}

impl ShellConfig {
    /// Build the configuration from the process arguments and environment.
    pub fn from_env() -> Result<Invocation> {
        Self::parse(
            std::env::args().skip(1),
            |key| std::env::var(key).ok(),
        )
    }

    pub fn parse<I, F>(args: I, env: F) -> Result<Invocation>
    where
        I: IntoIterator<Item = String>,
        F: Fn(&str) -> Option<String>,
    {
        let mut config = ShellConfig {
            prompt: env("ESH_PROMPT").filter(|p| !p.is_empty()),
            log_filter: env("ESH_LOG").filter(|f| !f.is_empty()),
            ..ShellConfig::default()
        };

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-h" | "--help" => return Ok(Invocation::Help),
                "-V" | "--version" => return Ok(Invocation::Version),
                "-c" => match args.next() {
                    Some(line) => config.command = Some(line),
                    None => {
                        return Err(ShellError::InvalidArgument(
                            "-c requires a command argument".to_string(),
                        ));
                    }
                },
                other => {
                    return Err(ShellError::InvalidArgument(format!(
                        "unknown option '{}'\n{}",
                        other, USAGE
                    )));
                }
            }
        }

        Ok(Invocation::Run(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_defaults() {
        let Invocation::Run(config) = ShellConfig::parse(args(&[]), no_env).unwrap() else {
            panic!("expected a run invocation");
        };
        assert!(config.prompt.is_none());
        assert!(config.command.is_none());
        assert_eq!(config.signals.child_status, Signal::SIGCHLD);
        assert_eq!(config.signals.silent_stop, Signal::SIGSTOP);
    }

    #[test]
    fn test_command_flag() {
        let Invocation::Run(config) =
            ShellConfig::parse(args(&["-c", "sleep 1 | cat"]), no_env).unwrap()
        else {
            panic!("expected a run invocation");
        };
        assert_eq!(config.command.as_deref(), Some("sleep 1 | cat"));
    }

    #[test]
    fn test_command_flag_requires_argument() {
        let err = ShellConfig::parse(args(&["-c"]), no_env).unwrap_err();
        assert!(err.to_string().contains("-c requires"));
    }

    #[test]
    fn test_help_and_version() {
        assert!(matches!(
            ShellConfig::parse(args(&["-h"]), no_env).unwrap(),
            Invocation::Help
        ));
        assert!(matches!(
            ShellConfig::parse(args(&["--version"]), no_env).unwrap(),
            Invocation::Version
        ));
    }

    #[test]
    fn test_unknown_flag() {
        let err = ShellConfig::parse(args(&["-p", "plugins"]), no_env).unwrap_err();
        assert!(err.to_string().starts_with("unknown option '-p'"));
    }

    #[test]
    fn test_environment() {
        let env = |key: &str| match key {
            "ESH_PROMPT" => Some("$ ".to_string()),
            "ESH_LOG" => Some("esh=debug".to_string()),
            _ => None,
        };
        let Invocation::Run(config) = ShellConfig::parse(args(&[]), env).unwrap() else {
            panic!("expected a run invocation");
        };
        assert_eq!(config.prompt.as_deref(), Some("$ "));
        assert_eq!(config.log_filter.as_deref(), Some("esh=debug"));
    }
}
