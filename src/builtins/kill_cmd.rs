use nix::sys::signal;

use crate::builtins::registry::CommandInfo;
use crate::builtins::report;
use crate::engine::job_control::reap_pending;
use crate::engine::state::{ExecutionResult, ShellState};
use crate::error::{Result, ShellError};
use crate::signals::ChildSignalGuard;

pub const COMMAND_INFO: CommandInfo = CommandInfo {
    name: "kill",
    description: "Terminate a job.",
    usage: "kill <job_id>",
    run: kill_runner,
};

pub fn kill_runner(args: &[String], state: &mut ShellState) -> (ExecutionResult, i32) {
    let code = run(args, state);
    (ExecutionResult::KeepRunning, code)
}

pub fn run(args: &[String], state: &mut ShellState) -> i32 {
    match terminate(args, state) {
        Ok(()) => 0,
        Err(e) => report(e),
    }
}

fn terminate(args: &[String], state: &mut ShellState) -> Result<()> {
    let Some(spec) = args.first() else {
        return Err(ShellError::Usage {
            cmd: "kill",
            usage: COMMAND_INFO.usage,
        });
    };

    let _guard = ChildSignalGuard::block(&state.signals)?;
    reap_pending(state);

    let id = state.jobs.resolve("kill", Some(spec.as_str()))?;
    let Some(job) = state.jobs.find_by_job_id(id) else {
        return Err(ShellError::no_such_job("kill", spec.as_str()));
    };
    let Some(pgid) = job.pgid else {
        return Err(ShellError::no_such_job("kill", spec.as_str()));
    };

    signal::killpg(pgid, state.signals.terminate).map_err(|e| ShellError::syscall("kill", e))?;
    // A stopped group only sees the termination once it runs again.
    if job.status.is_stopped() {
        signal::killpg(pgid, state.signals.resume).map_err(|e| ShellError::syscall("kill", e))?;
    }
    Ok(())
}
