use std::os::fd::{BorrowedFd, RawFd};

use nix::libc;
use nix::sys::signal::{self, SigSet, SigmaskHow, Signal};
use nix::sys::termios::{self, SetArg, Termios};
use nix::unistd::{self, Pid};
use tracing::debug;

use crate::config::SignalConfig;
use crate::error::{Result, ShellError};

/// The bare terminal descriptor plus the signal to hold off while moving it.
///
/// `Copy` and allocation free, so a forked child can use it before exec.
#[derive(Debug, Clone, Copy)]
pub struct TerminalHandle {
    fd: RawFd,
    background_write: Signal,
}

impl TerminalHandle {
    pub fn new(fd: RawFd, background_write: Signal) -> Self {
        TerminalHandle {
            fd,
            background_write,
        }
    }

    /// Make `pgid` the terminal's foreground group and restore `modes` if given.
    ///
    /// The background-write signal stays blocked for the duration, so the caller
    /// is never stopped for touching a terminal it does not own yet.
    pub fn hand_over(&self, pgid: Pid, modes: Option<&Termios>) -> Result<()> {
        let mut block = SigSet::empty();
        block.add(self.background_write);
        let previous = block
            .thread_swap_mask(SigmaskHow::SIG_BLOCK)
            .map_err(|e| ShellError::syscall("sigprocmask", e))?;

        let fd = unsafe { BorrowedFd::borrow_raw(self.fd) };
        let result = unistd::tcsetpgrp(fd, pgid)
            .map_err(|e| ShellError::syscall("tcsetpgrp", e))
            .and_then(|()| match modes {
                Some(modes) => termios::tcsetattr(fd, SetArg::TCSADRAIN, modes)
                    .map_err(|e| ShellError::syscall("tcsetattr", e)),
                None => Ok(()),
            });

        let _ = previous.thread_set_mask();
        result
    }
}

/// Ownership of the controlling terminal.
///
/// When standard input is not a terminal every operation is a no-op and the
/// shell simply runs jobs without handing anything over.
#[derive(Debug)]
pub struct Terminal {
    handle: TerminalHandle,
    shell_pgid: Pid,
    shell_modes: Option<Termios>,
    interactive: bool,
}

impl Terminal {
    /// Take the terminal for the shell, waiting until the shell is in the
    /// foreground first, and capture the modes restored on every return.
    pub fn init(signals: &SignalConfig) -> Result<Self> {
        let fd = libc::STDIN_FILENO;
        let tty = unsafe { BorrowedFd::borrow_raw(fd) };
        if !unistd::isatty(tty).unwrap_or(false) {
            return Ok(Terminal::detached(signals));
        }

        // Started in the background: stop until someone brings us forward.
        loop {
            let group = unistd::getpgrp();
            let owner = unistd::tcgetpgrp(tty).map_err(|e| ShellError::syscall("tcgetpgrp", e))?;
            if owner == group {
                break;
            }
            signal::killpg(group, signals.background_read)
                .map_err(|e| ShellError::syscall("kill", e))?;
        }

        let pid = unistd::getpid();
        if let Err(e) = unistd::setpgid(pid, pid) {
            // A session leader already leads its own group and may not move.
            if unistd::getsid(None).ok() != Some(pid) {
                return Err(ShellError::syscall("setpgid", e));
            }
        }

        let handle = TerminalHandle::new(fd, signals.background_write);
        handle.hand_over(pid, None)?;
        let shell_modes =
            Some(termios::tcgetattr(tty).map_err(|e| ShellError::syscall("tcgetattr", e))?);
        debug!(pgid = pid.as_raw(), "shell owns the terminal");

        Ok(Terminal {
            handle,
            shell_pgid: pid,
            shell_modes,
            interactive: true,
        })
    }

    /// A terminal the shell does not control (input is a pipe or file).
    pub fn detached(signals: &SignalConfig) -> Self {
        Terminal {
            handle: TerminalHandle::new(libc::STDIN_FILENO, signals.background_write),
            shell_pgid: unistd::getpgrp(),
            shell_modes: None,
            interactive: false,
        }
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    /// Handle for children that must take the terminal themselves; `None`
    /// when the shell does not control one.
    pub fn handle(&self) -> Option<TerminalHandle> {
        self.interactive.then_some(self.handle)
    }

    /// Give the terminal to `pgid`, restoring `modes` if supplied.
    pub fn acquire(&self, pgid: Pid, modes: Option<&Termios>) -> Result<()> {
        if !self.interactive {
            return Ok(());
        }
        debug!(pgid = pgid.as_raw(), restore_modes = modes.is_some(), "terminal hand-over");
        self.handle.hand_over(pgid, modes)
    }

    /// Take the terminal back for the shell with its start-up modes.
    pub fn give_to_shell(&self) -> Result<()> {
        self.acquire(self.shell_pgid, self.shell_modes.as_ref())
    }

    /// Current terminal modes, saved on a job that stops in the foreground.
    pub fn capture_modes(&self) -> Option<Termios> {
        if !self.interactive {
            return None;
        }
        let tty = unsafe { BorrowedFd::borrow_raw(self.handle.fd) };
        termios::tcgetattr(tty).ok()
    }
}
