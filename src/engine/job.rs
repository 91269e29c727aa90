use std::fmt;

use nix::sys::signal::Signal;
use nix::sys::termios::Termios;
use nix::unistd::Pid;

use crate::parser::{ParsedCommand, Pipeline};

/// Where a job stands with respect to the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Holds the terminal; the shell is waiting for it. At most one job at a time.
    Foreground,
    Background,
    Stopped,
    /// Stopped because it tried to use the terminal from the background.
    NeedsTerminal,
}

impl JobStatus {
    pub fn label(&self) -> &'static str {
        match self {
            JobStatus::Foreground | JobStatus::Background => "Running",
            JobStatus::Stopped => "Stopped",
            JobStatus::NeedsTerminal => "Stopped (tty)",
        }
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, JobStatus::Stopped | JobStatus::NeedsTerminal)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    Stopped(Signal),
    /// Exit code, or 128 + signal number for signal deaths.
    Done(i32),
}

/// One forked stage of a job.
#[derive(Debug, Clone)]
pub struct Process {
    pub argv: Vec<String>,
    pub input: Option<String>,
    pub output: Option<String>,
    pub append: bool,
    /// `None` until forked, and for stages that never started.
    pub pid: Option<Pid>,
    pub state: ProcessState,
}

impl Process {
    pub fn new(cmd: &ParsedCommand) -> Self {
        Process {
            argv: cmd.argv.clone(),
            input: cmd.input.clone(),
            output: cmd.output.clone(),
            append: cmd.append,
            pid: None,
            state: ProcessState::Running,
        }
    }

    pub fn name(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or("")
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, ProcessState::Done(_))
    }

    fn command_text(&self) -> String {
        let mut text = self.argv.join(" ");
        if let Some(input) = &self.input {
            text.push_str(" < ");
            text.push_str(input);
        }
        if let Some(output) = &self.output {
            text.push_str(if self.append { " >> " } else { " > " });
            text.push_str(output);
        }
        text
    }
}

/// A pipeline under job control: one job-table entry.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: usize,
    /// Pid of the first started process; shared by every process of the job.
    pub pgid: Option<Pid>,
    pub processes: Vec<Process>,
    pub status: JobStatus,
    /// The user asked for (or `bg` moved it to) background execution.
    pub is_background: bool,
    /// Terminal modes captured when the job last stopped in the foreground.
    pub saved_modes: Option<Termios>,
    /// The current stop has been announced.
    pub stop_notified: bool,
}

impl Job {
    pub fn new(id: usize, pipeline: &Pipeline) -> Self {
        Job {
            id,
            pgid: None,
            processes: pipeline.commands.iter().map(Process::new).collect(),
            status: if pipeline.background {
                JobStatus::Background
            } else {
                JobStatus::Foreground
            },
            is_background: pipeline.background,
            saved_modes: None,
            stop_notified: false,
        }
    }

    /// The command line as the user would have typed it.
    pub fn command_line(&self) -> String {
        let mut line = self
            .processes
            .iter()
            .map(Process::command_text)
            .collect::<Vec<_>>()
            .join(" | ");
        if self.is_background {
            line.push_str(" &");
        }
        line
    }

    pub fn is_done(&self) -> bool {
        self.processes.iter().all(Process::is_done)
    }

    /// Every process still alive is stopped.
    pub fn is_stopped(&self) -> bool {
        let all_suspended = self
            .processes
            .iter()
            .all(|p| matches!(p.state, ProcessState::Stopped(_) | ProcessState::Done(_)));
        let any_stopped = self
            .processes
            .iter()
            .any(|p| matches!(p.state, ProcessState::Stopped(_)));
        all_suspended && any_stopped
    }

    /// Status of the last stage, the way shells report a pipeline's status.
    pub fn last_status(&self) -> i32 {
        match self.processes.last().map(|p| p.state) {
            Some(ProcessState::Done(code)) => code,
            _ => 0,
        }
    }
}

/// What a job status message reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Stopped,
    NeedsTerminal,
    Done,
    Signaled(Signal),
    /// Printed by `bg`.
    Resumed,
}

/// A job status message waiting for the terminal to come back to the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub job_id: usize,
    /// `+` for the current job, `-` for the previous one, blank otherwise.
    pub mark: char,
    pub kind: NoticeKind,
    pub command: String,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.kind {
            NoticeKind::Resumed => {
                return write!(f, "[{}]{} {}", self.job_id, self.mark, self.command);
            }
            NoticeKind::Stopped => JobStatus::Stopped.label(),
            NoticeKind::NeedsTerminal => JobStatus::NeedsTerminal.label(),
            NoticeKind::Done => "Done",
            NoticeKind::Signaled(sig) => signal_label(sig),
        };
        write!(f, "[{}]{}  {:<22}{}", self.job_id, self.mark, label, self.command)
    }
}

/// Short description of a fatal signal, as job notices show it.
pub fn signal_label(sig: Signal) -> &'static str {
    match sig {
        Signal::SIGHUP => "Hangup",
        Signal::SIGINT => "Interrupt",
        Signal::SIGQUIT => "Quit",
        Signal::SIGKILL => "Killed",
        Signal::SIGSEGV => "Segmentation fault",
        Signal::SIGPIPE => "Broken pipe",
        Signal::SIGTERM => "Terminated",
        Signal::SIGABRT => "Aborted",
        other => other.as_str(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_line;

    fn job(line: &str) -> Job {
        let pipelines = parse_line(line).unwrap();
        Job::new(1, &pipelines[0])
    }

    #[test]
    fn test_new_job_status() {
        assert_eq!(job("sleep 5").status, JobStatus::Foreground);
        let bg = job("sleep 5 &");
        assert_eq!(bg.status, JobStatus::Background);
        assert!(bg.is_background);
        assert!(bg.pgid.is_none());
        assert!(bg.processes.iter().all(|p| p.pid.is_none()));
    }

    #[test]
    fn test_command_line() {
        assert_eq!(job("echo hello | tr a-z A-Z").command_line(), "echo hello | tr a-z A-Z");
        assert_eq!(job("sleep 5 &").command_line(), "sleep 5 &");
        assert_eq!(
            job("sort < in | uniq >> out").command_line(),
            "sort < in | uniq >> out"
        );
    }

    #[test]
    fn test_done_and_stopped() {
        let mut j = job("a | b");
        assert!(!j.is_done());
        assert!(!j.is_stopped());

        j.processes[0].state = ProcessState::Done(0);
        j.processes[1].state = ProcessState::Stopped(Signal::SIGTSTP);
        assert!(j.is_stopped());
        assert!(!j.is_done());

        j.processes[1].state = ProcessState::Done(3);
        assert!(j.is_done());
        assert!(!j.is_stopped());
        assert_eq!(j.last_status(), 3);
    }

    #[test]
    fn test_notice_format() {
        let stopped = Notice {
            job_id: 1,
            mark: '+',
            kind: NoticeKind::Stopped,
            command: "sleep 100".to_string(),
        };
        assert_eq!(stopped.to_string(), "[1]+  Stopped               sleep 100");

        let resumed = Notice {
            kind: NoticeKind::Resumed,
            command: "sleep 100 &".to_string(),
            ..stopped.clone()
        };
        assert_eq!(resumed.to_string(), "[1]+ sleep 100 &");

        let killed = Notice {
            kind: NoticeKind::Signaled(Signal::SIGTERM),
            ..stopped
        };
        assert!(killed.to_string().contains("Terminated"));
    }
}
