use nix::sys::signal;

use crate::builtins::registry::CommandInfo;
use crate::builtins::report;
use crate::engine::job::{JobStatus, ProcessState};
use crate::engine::job_control::{reap_pending, wait_for_job};
use crate::engine::state::{ExecutionResult, ShellState};
use crate::error::{Result, ShellError};
use crate::signals::ChildSignalGuard;

pub const COMMAND_INFO: CommandInfo = CommandInfo {
    name: "fg",
    description: "Move job to the foreground.",
    usage: "fg [job_id]\n\nResume the job identified by JOB_ID (or the current job) in the foreground\nand wait for it to finish or stop.",
    run: fg_runner,
};

pub fn fg_runner(args: &[String], state: &mut ShellState) -> (ExecutionResult, i32) {
    let code = run(args, state);
    (ExecutionResult::KeepRunning, code)
}

pub fn run(args: &[String], state: &mut ShellState) -> i32 {
    match foreground(args, state) {
        Ok(code) => code,
        Err(e) => report(e),
    }
}

fn foreground(args: &[String], state: &mut ShellState) -> Result<i32> {
    // Held until the job leaves the foreground.
    let _guard = ChildSignalGuard::block(&state.signals)?;
    reap_pending(state);

    let id = state.jobs.resolve("fg", args.first().map(String::as_str))?;
    let job = state
        .jobs
        .find_by_job_id_mut(id)
        .ok_or_else(|| ShellError::no_such_job("fg", id.to_string()))?;
    let Some(pgid) = job.pgid else {
        return Err(ShellError::no_such_job("fg", id.to_string()));
    };

    job.status = JobStatus::Foreground;
    job.is_background = false;
    job.stop_notified = false;
    for process in &mut job.processes {
        if let ProcessState::Stopped(_) = process.state {
            process.state = ProcessState::Running;
        }
    }
    let modes = job.saved_modes.take();
    println!("{}", job.command_line());

    if let Err(e) = state.terminal.acquire(pgid, modes.as_ref()) {
        eprintln!("esh: {}", e);
    }
    if let Err(e) = signal::killpg(pgid, state.signals.resume) {
        eprintln!("esh: fg: {}", ShellError::syscall("kill", e));
    }

    Ok(wait_for_job(state, id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FORK_LOCK;

    #[test]
    fn test_empty_table_is_no_such_job() {
        let _lock = FORK_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let mut state = ShellState::detached();
        assert_eq!(run(&[], &mut state), 1);
        assert_eq!(run(&["%3".to_string()], &mut state), 1);
        assert!(state.jobs.is_empty());
    }

    #[test]
    fn test_error_message() {
        let _lock = FORK_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let mut state = ShellState::detached();
        let err = foreground(&["2".to_string()], &mut state).unwrap_err();
        assert_eq!(err.to_string(), "fg: 2: no such job");
        let err = foreground(&[], &mut state).unwrap_err();
        assert_eq!(err.to_string(), "fg: current: no such job");
    }
}
