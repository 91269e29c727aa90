use nix::sys::signal;

use crate::builtins::registry::CommandInfo;
use crate::builtins::report;
use crate::engine::job::{JobStatus, Notice, NoticeKind, ProcessState};
use crate::engine::job_control::reap_pending;
use crate::engine::state::{ExecutionResult, ShellState};
use crate::error::{Result, ShellError};
use crate::signals::ChildSignalGuard;

pub const COMMAND_INFO: CommandInfo = CommandInfo {
    name: "bg",
    description: "Move job to the background.",
    usage: "bg [job_id]\n\nResume the job identified by JOB_ID (or the current job) in the background,\nas if it had been started with `&`.",
    run: bg_runner,
};

pub fn bg_runner(args: &[String], state: &mut ShellState) -> (ExecutionResult, i32) {
    let code = run(args, state);
    (ExecutionResult::KeepRunning, code)
}

pub fn run(args: &[String], state: &mut ShellState) -> i32 {
    match background(args, state) {
        Ok(()) => 0,
        Err(e) => report(e),
    }
}

fn background(args: &[String], state: &mut ShellState) -> Result<()> {
    let _guard = ChildSignalGuard::block(&state.signals)?;
    reap_pending(state);

    let id = state.jobs.resolve("bg", args.first().map(String::as_str))?;
    let mark = state.jobs.mark(id);
    let job = state
        .jobs
        .find_by_job_id_mut(id)
        .ok_or_else(|| ShellError::no_such_job("bg", id.to_string()))?;
    let Some(pgid) = job.pgid else {
        return Err(ShellError::no_such_job("bg", id.to_string()));
    };

    job.status = JobStatus::Background;
    job.is_background = true;
    job.stop_notified = false;
    for process in &mut job.processes {
        if let ProcessState::Stopped(_) = process.state {
            process.state = ProcessState::Running;
        }
    }
    let notice = Notice {
        job_id: id,
        mark,
        kind: NoticeKind::Resumed,
        command: job.command_line(),
    };
    println!("{}", notice);

    signal::killpg(pgid, state.signals.resume).map_err(|e| ShellError::syscall("kill", e))
}
