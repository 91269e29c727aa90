use nix::sys::signal;

use crate::builtins::registry::CommandInfo;
use crate::builtins::report;
use crate::engine::job_control::reap_pending;
use crate::engine::state::{ExecutionResult, ShellState};
use crate::error::{Result, ShellError};
use crate::signals::ChildSignalGuard;

pub const COMMAND_INFO: CommandInfo = CommandInfo {
    name: "stop",
    description: "Suspend a job.",
    usage: "stop <job_id>",
    run: stop_runner,
};

pub fn stop_runner(args: &[String], state: &mut ShellState) -> (ExecutionResult, i32) {
    let code = run(args, state);
    (ExecutionResult::KeepRunning, code)
}

pub fn run(args: &[String], state: &mut ShellState) -> i32 {
    match suspend(args, state) {
        Ok(()) => 0,
        Err(e) => report(e),
    }
}

/// Stops the job with the silent stop signal, so no stop notice follows.
fn suspend(args: &[String], state: &mut ShellState) -> Result<()> {
    let Some(spec) = args.first() else {
        return Err(ShellError::Usage {
            cmd: "stop",
            usage: COMMAND_INFO.usage,
        });
    };

    let _guard = ChildSignalGuard::block(&state.signals)?;
    reap_pending(state);

    let id = state.jobs.resolve("stop", Some(spec.as_str()))?;
    let pgid = state
        .jobs
        .find_by_job_id(id)
        .and_then(|job| job.pgid)
        .ok_or_else(|| ShellError::no_such_job("stop", spec.as_str()))?;

    signal::killpg(pgid, state.signals.silent_stop).map_err(|e| ShellError::syscall("kill", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FORK_LOCK;

    #[test]
    fn test_requires_job_id() {
        let mut state = ShellState::detached();
        assert_eq!(run(&[], &mut state), 2);
        let err = suspend(&[], &mut state).unwrap_err();
        assert_eq!(err.to_string(), "stop: usage: stop <job_id>");
    }

    #[test]
    fn test_unknown_job() {
        let _lock = FORK_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let mut state = ShellState::detached();
        assert_eq!(run(&["1".to_string()], &mut state), 1);
    }
}
