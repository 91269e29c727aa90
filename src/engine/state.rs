use super::job::Notice;
use super::job_table::JobTable;
use super::terminal::Terminal;
use crate::config::SignalConfig;

/// Everything the shell mutates, owned in one place and passed by reference
/// to the launcher, the builtins and the reaper.
pub struct ShellState {
    pub jobs: JobTable,
    pub terminal: Terminal,
    pub signals: SignalConfig,
    /// Job status messages waiting for the terminal to be back with the shell.
    pub notices: Vec<Notice>,
    /// Status of the last foreground pipeline or builtin.
    pub last_status: i32,
}

impl ShellState {
    pub fn new(terminal: Terminal, signals: SignalConfig) -> Self {
        ShellState {
            jobs: JobTable::new(),
            terminal,
            signals,
            notices: Vec::new(),
            last_status: 0,
        }
    }

    /// State for a shell that does not control a terminal.
    #[cfg(test)]
    pub fn detached() -> Self {
        let signals = SignalConfig::default();
        ShellState::new(Terminal::detached(&signals), signals)
    }
}

pub enum ExecutionResult {
    KeepRunning,
    Exit,
}
