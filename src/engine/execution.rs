use std::io;
use std::os::unix::process::CommandExt;
use std::process::{ChildStdout, Command, Stdio};

use nix::errno::Errno;
use nix::sys::signal;
use nix::unistd::{self, Pid};
use tracing::debug;

use crate::builtins::registry::Builtin;
use crate::config::SignalConfig;
use crate::error::{Result, ShellError};
use crate::parser::Pipeline;
use crate::signals::{self, ChildSignalGuard};

use super::job::{Job, JobStatus, ProcessState};
use super::job_control::wait_for_job;
use super::redirect::{self, Redirection};
use super::state::{ExecutionResult, ShellState};
use super::terminal::TerminalHandle;

/// How a pipeline is carried out, decided once before anything runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Builtin(Builtin),
    /// Fork and exec every stage.
    External,
}

impl Dispatch {
    /// Builtins only run as a lone command; inside a pipeline the name is
    /// looked up as a program like any other.
    pub fn resolve(pipeline: &Pipeline) -> Self {
        match pipeline.commands.as_slice() {
            [single] => Builtin::resolve(single.name()).map_or(Dispatch::External, Dispatch::Builtin),
            _ => Dispatch::External,
        }
    }
}

/// Run every pipeline of a command line in order.
pub fn execute_list(pipelines: Vec<Pipeline>, state: &mut ShellState) -> ExecutionResult {
    for pipeline in pipelines {
        if let ExecutionResult::Exit = execute(&pipeline, state) {
            return ExecutionResult::Exit;
        }
    }
    ExecutionResult::KeepRunning
}

pub fn execute(pipeline: &Pipeline, state: &mut ShellState) -> ExecutionResult {
    match Dispatch::resolve(pipeline) {
        Dispatch::Builtin(builtin) => {
            let (result, code) = builtin.run(pipeline.commands[0].args(), state);
            state.last_status = code;
            result
        }
        Dispatch::External => {
            state.last_status = match launch(pipeline, state) {
                Ok(code) => code,
                Err(e) => {
                    eprintln!("esh: {}", e);
                    e.status()
                }
            };
            ExecutionResult::KeepRunning
        }
    }
}

// ── Launching ─────────────────────────────────────────────────────────────

/// What a forked child does between fork and exec.
#[derive(Debug, Clone)]
struct ChildSetup {
    /// Group to join; zero makes the child lead a new one.
    pgid: Pid,
    /// Present for foreground jobs of an interactive shell.
    terminal: Option<TerminalHandle>,
    signals: SignalConfig,
    redirect: Redirection,
}

impl ChildSetup {
    fn apply(&self) {
        let pid = unistd::getpid();
        let group = if self.pgid.as_raw() == 0 { pid } else { self.pgid };
        if let Err(e) = unistd::setpgid(pid, group) {
            redirect::report(redirect::stderr(), b"setpgid", e);
        }
        if let Some(terminal) = &self.terminal {
            if let Err(ShellError::Syscall { call, source }) = terminal.hand_over(group, None) {
                redirect::report(redirect::stderr(), call.as_bytes(), source);
            }
        }
        signals::restore_default(&self.signals);
        self.redirect.apply();
    }
}

enum SpawnFailure {
    /// The shell could not create the process at all.
    Fork(io::Error),
    /// The stage never ran; carries its exit status.
    Stage(i32),
}

fn classify(name: &str, err: io::Error) -> SpawnFailure {
    match err.raw_os_error().map(Errno::from_raw) {
        Some(Errno::EAGAIN | Errno::ENOMEM) => return SpawnFailure::Fork(err),
        _ => {}
    }
    match err.kind() {
        io::ErrorKind::NotFound => {
            eprintln!("esh: command not found: {}", name);
            SpawnFailure::Stage(127)
        }
        io::ErrorKind::PermissionDenied => {
            eprintln!("esh: {}: permission denied", name);
            SpawnFailure::Stage(126)
        }
        _ => {
            eprintln!("esh: {}: {}", name, err);
            SpawnFailure::Stage(126)
        }
    }
}

/// Start every stage of `pipeline` as one job.
///
/// Foreground jobs are waited for and their status returned; background jobs
/// are announced as `[id] pgid` and return 0 at once.
pub fn launch(pipeline: &Pipeline, state: &mut ShellState) -> Result<i32> {
    let _guard = ChildSignalGuard::block(&state.signals)?;

    debug_assert!(
        pipeline.background || state.jobs.foreground().is_none(),
        "a second foreground job"
    );
    // In the table before the first fork, so every status has a job to land on.
    let id = state.jobs.next_job_id();
    state.jobs.insert(Job::new(id, pipeline));

    let foreground = !pipeline.background;
    let terminal = if foreground { state.terminal.handle() } else { None };
    let last = pipeline.commands.len() - 1;
    let mut pgid: Option<Pid> = None;
    let mut upstream: Option<ChildStdout> = None;

    for (i, cmd) in pipeline.commands.iter().enumerate() {
        let redirect = match Redirection::for_stage(cmd, i == 0, i == last) {
            Ok(redirect) => redirect,
            Err(e) => {
                eprintln!("esh: {}", e);
                upstream = None;
                mark_stage(state, id, i, ProcessState::Done(1));
                continue;
            }
        };

        let mut command = Command::new(cmd.name());
        command.args(cmd.args());
        if i > 0 {
            // A stage whose predecessor never started reads nothing.
            command.stdin(upstream.take().map_or_else(Stdio::null, Stdio::from));
        }
        if i < last {
            command.stdout(Stdio::piped());
        }

        let setup = ChildSetup {
            pgid: pgid.unwrap_or(Pid::from_raw(0)),
            terminal,
            signals: state.signals,
            redirect,
        };
        unsafe {
            command.pre_exec(move || {
                setup.apply();
                Ok(())
            });
        }

        match command.spawn() {
            Ok(mut child) => {
                let pid = Pid::from_raw(child.id() as i32);
                let group = match pgid {
                    Some(group) => group,
                    None => {
                        debug_assert!(state.jobs.find_by_process_group(pid).is_none());
                        *pgid.insert(pid)
                    }
                };
                // Set from both sides; EACCES means the child already exec'd
                // after joining.
                if let Err(e) = unistd::setpgid(pid, group) {
                    if e != Errno::EACCES {
                        eprintln!("esh: {}", ShellError::syscall("setpgid", e));
                    }
                }
                debug!(job = id, pid = pid.as_raw(), pgid = group.as_raw(), command = cmd.name(), "started");

                if i < last {
                    upstream = child.stdout.take();
                }
                if let Some(job) = state.jobs.find_by_job_id_mut(id) {
                    job.processes[i].pid = Some(pid);
                    job.pgid = Some(group);
                }
            }
            Err(err) => match classify(cmd.name(), err) {
                SpawnFailure::Stage(code) => {
                    upstream = None;
                    mark_stage(state, id, i, ProcessState::Done(code));
                }
                SpawnFailure::Fork(err) => {
                    abort_launch(state, id, pgid);
                    return Err(ShellError::Fork(err));
                }
            },
        }
    }

    let Some(pgid) = pgid else {
        // Nothing started.
        let status = state.jobs.remove(id).map_or(1, |job| job.last_status());
        return Ok(status);
    };

    if foreground {
        if let Err(e) = state.terminal.acquire(pgid, None) {
            eprintln!("esh: {}", e);
        }
        Ok(wait_for_job(state, id))
    } else {
        println!("[{}] {}", id, pgid);
        Ok(0)
    }
}

fn mark_stage(state: &mut ShellState, id: usize, stage: usize, process_state: ProcessState) {
    if let Some(job) = state.jobs.find_by_job_id_mut(id) {
        job.processes[stage].state = process_state;
    }
}

/// Fork failed midway: kill what already started and wait for it, so the job
/// leaves the table the normal way.
fn abort_launch(state: &mut ShellState, id: usize, pgid: Option<Pid>) {
    let Some(job) = state.jobs.find_by_job_id_mut(id) else {
        return;
    };
    for process in job.processes.iter_mut().filter(|p| p.pid.is_none()) {
        process.state = ProcessState::Done(1);
    }
    match pgid {
        Some(pgid) => {
            job.status = JobStatus::Foreground;
            let _ = signal::killpg(pgid, state.signals.abort);
            wait_for_job(state, id);
        }
        None => {
            state.jobs.remove(id);
        }
    }
}
