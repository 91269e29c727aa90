use std::io;

use nix::errno::Errno;
use rustyline::error::ReadlineError;
use thiserror::Error;

/// Result type used throughout the shell.
pub type Result<T> = std::result::Result<T, ShellError>;

/// Everything that can go wrong between reading a line and reaping its jobs.
///
/// None of these end the shell on their own; `main` decides which ones are fatal.
#[derive(Debug, Error)]
pub enum ShellError {
    /// A job-control syscall failed (`setpgid`, `tcsetpgrp`, `kill`, ...).
    #[error("{call}: {}", .source.desc())]
    Syscall {
        call: &'static str,
        #[source]
        source: Errno,
    },

    #[error("fork: {0}")]
    Fork(#[source] io::Error),

    #[error("{cmd}: {spec}: no such job")]
    NoSuchJob { cmd: &'static str, spec: String },

    #[error("{cmd}: usage: {usage}")]
    Usage {
        cmd: &'static str,
        usage: &'static str,
    },

    #[error("syntax error near '{0}'")]
    Syntax(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Readline(#[from] ReadlineError),
}

impl ShellError {
    pub fn syscall(call: &'static str, source: Errno) -> Self {
        ShellError::Syscall { call, source }
    }

    pub fn no_such_job(cmd: &'static str, spec: impl Into<String>) -> Self {
        ShellError::NoSuchJob {
            cmd,
            spec: spec.into(),
        }
    }

    /// Exit status a builtin reports for this error.
    pub fn status(&self) -> i32 {
        match self {
            ShellError::Usage { .. } | ShellError::Syntax(_) => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_such_job_message() {
        let err = ShellError::no_such_job("fg", "%3");
        assert_eq!(err.to_string(), "fg: %3: no such job");
        assert_eq!(err.status(), 1);
    }

    #[test]
    fn test_syscall_message_names_the_call() {
        let err = ShellError::syscall("kill", Errno::EPERM);
        assert_eq!(err.to_string(), "kill: Operation not permitted");
    }

    #[test]
    fn test_usage_status() {
        let err = ShellError::Usage {
            cmd: "stop",
            usage: "stop <job_id>",
        };
        assert_eq!(err.to_string(), "stop: usage: stop <job_id>");
        assert_eq!(err.status(), 2);
    }
}
