use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use tracing::{debug, trace, warn};

use super::job::{JobStatus, Notice, NoticeKind, ProcessState};
use super::state::ShellState;
use crate::error::ShellError;
use crate::signals::{self, ChildSignalGuard};

/// Apply one child status change to the job table.
///
/// Shared by the reaper path and the job-wait loop, so a status is handled
/// the same way whoever collected it.
pub fn apply_status(state: &mut ShellState, status: WaitStatus) {
    let job = status
        .pid()
        .and_then(|pid| state.jobs.find_by_process_id(pid))
        .map(|(job, _)| job.id);
    trace!(?status, job, "child status");
    match status {
        WaitStatus::Exited(pid, code) => finish(state, pid, code, None),
        WaitStatus::Signaled(pid, sig, _) => finish(state, pid, 128 + sig as i32, Some(sig)),
        WaitStatus::Stopped(pid, sig) => {
            let Some((job, idx)) = state.jobs.find_by_process_id_mut(pid) else {
                return;
            };
            job.processes[idx].state = ProcessState::Stopped(sig);
            let id = job.id;
            debug!(job = id, command = job.processes[idx].name(), signal = ?sig, "stopped");
            settle_stop(state, id, sig);
        }
        WaitStatus::Continued(pid) => resume(state, pid),
        _ => {}
    }
}

fn finish(state: &mut ShellState, pid: Pid, code: i32, signal: Option<Signal>) {
    let Some((job, idx)) = state.jobs.find_by_process_id_mut(pid) else {
        trace!(pid = pid.as_raw(), "status for a child outside the job table");
        return;
    };
    job.processes[idx].state = ProcessState::Done(code);
    let id = job.id;

    if !job.is_done() {
        // The survivors may all be stopped already.
        let stopped_by = job.processes.iter().find_map(|p| match p.state {
            ProcessState::Stopped(sig) => Some(sig),
            _ => None,
        });
        if let Some(sig) = stopped_by.filter(|_| job.is_stopped()) {
            settle_stop(state, id, sig);
        }
        return;
    }

    let mark = state.jobs.mark(id);
    let Some(job) = state.jobs.remove(id) else {
        return;
    };

    if job.status == JobStatus::Foreground {
        state.last_status = job.last_status();
        reclaim_terminal(state);
    } else {
        let kind = match signal {
            Some(sig) => NoticeKind::Signaled(sig),
            None => NoticeKind::Done,
        };
        state.notices.push(Notice {
            job_id: id,
            mark,
            kind,
            command: job.command_line(),
        });
    }
}

/// Move a job whose live processes are all stopped into a stopped state,
/// queueing one notice unless the stop was the silent one.
fn settle_stop(state: &mut ShellState, id: usize, sig: Signal) {
    let silent = sig == state.signals.silent_stop;
    let tty_stop = sig == state.signals.background_read || sig == state.signals.background_write;

    let Some(job) = state.jobs.find_by_job_id_mut(id) else {
        return;
    };
    if !job.is_stopped() || job.status.is_stopped() {
        return;
    }

    let was_foreground = job.status == JobStatus::Foreground;
    job.status = if tty_stop && !was_foreground {
        JobStatus::NeedsTerminal
    } else {
        JobStatus::Stopped
    };
    if was_foreground {
        job.saved_modes = state.terminal.capture_modes();
        state.last_status = 128 + sig as i32;
    }

    let notify = !silent && !job.stop_notified;
    if notify {
        job.stop_notified = true;
        let kind = if job.status == JobStatus::NeedsTerminal {
            NoticeKind::NeedsTerminal
        } else {
            NoticeKind::Stopped
        };
        let command = job.command_line();
        let mark = state.jobs.mark(id);
        state.notices.push(Notice {
            job_id: id,
            mark,
            kind,
            command,
        });
    }

    if was_foreground {
        reclaim_terminal(state);
    }
}

fn resume(state: &mut ShellState, pid: Pid) {
    let Some((job, idx)) = state.jobs.find_by_process_id_mut(pid) else {
        return;
    };
    if matches!(job.processes[idx].state, ProcessState::Stopped(_)) {
        job.processes[idx].state = ProcessState::Running;
    }
    // Continued by someone other than `fg`/`bg`.
    if job.status.is_stopped() && !job.is_stopped() {
        job.status = JobStatus::Background;
        job.is_background = true;
        job.stop_notified = false;
    }
}

fn reclaim_terminal(state: &ShellState) {
    if let Err(e) = state.terminal.give_to_shell() {
        eprintln!("esh: {}", e);
    }
}

/// Apply everything the reaper queued, then sweep for anything it missed.
pub fn reap_pending(state: &mut ShellState) {
    let _guard = match ChildSignalGuard::block(&state.signals) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("esh: {}", e);
            return;
        }
    };

    for status in signals::take_reaped() {
        apply_status(state, status);
    }

    let flags = WaitPidFlag::WNOHANG | WaitPidFlag::WUNTRACED | WaitPidFlag::WCONTINUED;
    loop {
        match waitpid(Pid::from_raw(-1), Some(flags)) {
            Ok(WaitStatus::StillAlive) => break,
            Ok(status) => apply_status(state, status),
            Err(Errno::EINTR) => continue,
            // No children at all: expected, nothing to collect.
            Err(Errno::ECHILD) => break,
            Err(e) => {
                warn!(error = %e, "waitpid sweep failed");
                break;
            }
        }
    }
}

/// Print queued job notices.
pub fn flush_notices(state: &mut ShellState) {
    for notice in state.notices.drain(..) {
        println!("{}", notice);
    }
}

/// Bring the job table up to date and report what changed.
pub fn update_jobs(state: &mut ShellState) {
    reap_pending(state);
    flush_notices(state);
}

/// Block until job `id` is no longer running in the foreground, then take the
/// terminal back. Returns the shell's last status afterwards.
///
/// The caller holds a [`ChildSignalGuard`], so every status change of every
/// child passes through here until the job finishes or stops.
pub fn wait_for_job(state: &mut ShellState, id: usize) -> i32 {
    loop {
        for status in signals::take_reaped() {
            apply_status(state, status);
        }

        match state.jobs.find_by_job_id(id) {
            Some(job) if job.status == JobStatus::Foreground => {}
            _ => break,
        }

        match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WUNTRACED)) {
            Ok(status) => apply_status(state, status),
            Err(Errno::EINTR) => continue,
            Err(Errno::ECHILD) => {
                // Nothing left to wait for; whatever is still marked live is gone.
                abandon(state, id);
                break;
            }
            Err(e) => {
                eprintln!("esh: {}", ShellError::syscall("waitpid", e));
                break;
            }
        }
    }

    reclaim_terminal(state);
    state.last_status
}

fn abandon(state: &mut ShellState, id: usize) {
    let live: Vec<Pid> = match state.jobs.find_by_job_id(id) {
        Some(job) => job
            .processes
            .iter()
            .filter(|p| !p.is_done())
            .filter_map(|p| p.pid)
            .collect(),
        None => return,
    };
    for pid in live {
        finish(state, pid, 0, None);
    }
}

/// Hang up stopped jobs on the way out so none is left stopped and orphaned.
/// Returns how many process groups took the hangup.
pub fn hangup_stopped(state: &ShellState) -> usize {
    if state.jobs.is_empty() {
        return 0;
    }
    let stopped: Vec<Pid> = state
        .jobs
        .iter()
        .filter(|j| j.status.is_stopped())
        .filter_map(|j| j.pgid)
        .collect();
    debug!(stopped = stopped.len(), active = state.jobs.len(), "hanging up stopped jobs");
    let mut delivered = 0;
    for pgid in stopped {
        if let Err(e) = signal::killpg(pgid, state.signals.hangup) {
            warn!(pgid = pgid.as_raw(), error = %e, "hangup not delivered");
            continue;
        }
        delivered += 1;
        if let Err(e) = signal::killpg(pgid, state.signals.resume) {
            warn!(pgid = pgid.as_raw(), error = %e, "continue after hangup not delivered");
        }
    }
    delivered
}
