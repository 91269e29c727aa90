//! Signal handling for the shell.
//!
//! Handlers here run at arbitrary points of the main loop, so they only touch
//! atomics and make async-signal-safe calls. Child status changes are reaped in
//! the handler and queued; the main thread applies them to the job table while
//! the child-status signal is blocked.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};

use nix::errno::Errno;
use nix::libc::{self, c_int};
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, SigmaskHow, Signal};
use nix::sys::wait::WaitStatus;
use nix::unistd::{self, Pid};

use crate::config::SignalConfig;
use crate::error::{Result, ShellError};

const REAP_CAPACITY: usize = 64;

struct ReapSlot {
    pid: AtomicI32,
    status: AtomicI32,
}

impl ReapSlot {
    const fn new() -> Self {
        ReapSlot {
            pid: AtomicI32::new(0),
            status: AtomicI32::new(0),
        }
    }
}

// Single producer (the handler), single consumer (the main thread).
static REAPED: [ReapSlot; REAP_CAPACITY] = [const { ReapSlot::new() }; REAP_CAPACITY];
static REAP_HEAD: AtomicUsize = AtomicUsize::new(0);
static REAP_TAIL: AtomicUsize = AtomicUsize::new(0);

static CANCEL_REQUESTED: AtomicBool = AtomicBool::new(false);
static SELF_STOP: AtomicI32 = AtomicI32::new(libc::SIGSTOP);

/// Child-status handler: collect every pending status change without blocking.
extern "C" fn on_child_status(_: c_int) {
    let saved = Errno::last_raw();
    loop {
        let head = REAP_HEAD.load(Ordering::Relaxed);
        if head - REAP_TAIL.load(Ordering::Acquire) >= REAP_CAPACITY {
            // Full; the main thread's own sweep picks up the rest.
            break;
        }
        let mut status: c_int = 0;
        let pid = unsafe {
            libc::waitpid(
                -1,
                &mut status,
                libc::WNOHANG | libc::WUNTRACED | libc::WCONTINUED,
            )
        };
        if pid <= 0 {
            break;
        }
        let slot = &REAPED[head % REAP_CAPACITY];
        slot.pid.store(pid, Ordering::Relaxed);
        slot.status.store(status, Ordering::Relaxed);
        REAP_HEAD.store(head + 1, Ordering::Release);
    }
    Errno::set_raw(saved);
}

/// Interrupt and suspend at the prompt: abandon the line being read.
extern "C" fn on_interactive(_: c_int) {
    CANCEL_REQUESTED.store(true, Ordering::SeqCst);
    let stdout = unsafe { std::os::fd::BorrowedFd::borrow_raw(libc::STDOUT_FILENO) };
    let _ = unistd::write(stdout, b"\n");
}

/// Terminal write from the background: stop the shell rather than let it die.
extern "C" fn on_background_write(_: c_int) {
    let saved = Errno::last_raw();
    let stop = SELF_STOP.load(Ordering::Relaxed);
    unsafe {
        libc::kill(libc::getpid(), stop);
    }
    Errno::set_raw(saved);
}

/// Install the shell's handlers. Called once at startup, after the terminal
/// has been taken.
pub fn install(config: &SignalConfig) -> Result<()> {
    SELF_STOP.store(config.silent_stop as c_int, Ordering::Relaxed);

    // Reaping must not abort the line read; the interactive signals must.
    let reaper = SigAction::new(
        SigHandler::Handler(on_child_status),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    let interactive = SigAction::new(
        SigHandler::Handler(on_interactive),
        SaFlags::empty(),
        SigSet::empty(),
    );
    let background_write = SigAction::new(
        SigHandler::Handler(on_background_write),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    let ignore = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());

    let installs = [
        (config.child_status, &reaper),
        (config.interrupt, &interactive),
        (config.suspend, &interactive),
        (config.background_write, &background_write),
        // Ctrl+\ and background reads never concern the shell itself.
        (Signal::SIGQUIT, &ignore),
        (config.background_read, &ignore),
    ];
    for (sig, action) in installs {
        unsafe { signal::sigaction(sig, action) }
            .map_err(|e| ShellError::syscall("sigaction", e))?;
    }
    Ok(())
}

/// Restore default dispositions and an empty mask in a forked child before
/// exec. Allocation free.
pub fn restore_default(config: &SignalConfig) {
    let default = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    for sig in [
        config.child_status,
        config.interrupt,
        config.suspend,
        config.background_write,
        config.background_read,
        Signal::SIGQUIT,
    ] {
        let _ = unsafe { signal::sigaction(sig, &default) };
    }
    let _ = SigSet::empty().thread_set_mask();
}

/// Blocks the child-status signal for as long as it lives.
///
/// Every read-then-write of the job table from the main thread happens under
/// one of these, so the reaper never interleaves with a half-done update.
/// Guards nest: dropping one restores the mask it found.
#[must_use = "the signal is unblocked again when the guard is dropped"]
pub struct ChildSignalGuard {
    previous: SigSet,
}

impl ChildSignalGuard {
    pub fn block(config: &SignalConfig) -> Result<Self> {
        let mut set = SigSet::empty();
        set.add(config.child_status);
        let previous = set
            .thread_swap_mask(SigmaskHow::SIG_BLOCK)
            .map_err(|e| ShellError::syscall("sigprocmask", e))?;
        Ok(ChildSignalGuard { previous })
    }
}

impl Drop for ChildSignalGuard {
    fn drop(&mut self) {
        let _ = self.previous.thread_set_mask();
    }
}

/// Statuses the handler has reaped since the last call, oldest first.
pub fn take_reaped() -> Vec<WaitStatus> {
    let head = REAP_HEAD.load(Ordering::Acquire);
    let mut tail = REAP_TAIL.load(Ordering::Relaxed);
    let mut reaped = Vec::with_capacity(head - tail);
    while tail < head {
        let slot = &REAPED[tail % REAP_CAPACITY];
        let pid = Pid::from_raw(slot.pid.load(Ordering::Relaxed));
        let status = slot.status.load(Ordering::Relaxed);
        if let Ok(status) = WaitStatus::from_raw(pid, status) {
            reaped.push(status);
        }
        tail += 1;
    }
    REAP_TAIL.store(tail, Ordering::Release);
    reaped
}

/// Whether an interrupt or suspend arrived since the last call; clears the flag.
pub fn take_cancel() -> bool {
    CANCEL_REQUESTED.swap(false, Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FORK_LOCK;
    use std::process::Command;
    use std::time::{Duration, Instant};

    #[test]
    fn test_guard_blocks_and_restores() {
        let config = SignalConfig::default();
        assert!(!SigSet::thread_get_mask().unwrap().contains(Signal::SIGCHLD));
        {
            let _outer = ChildSignalGuard::block(&config).unwrap();
            {
                let _inner = ChildSignalGuard::block(&config).unwrap();
            }
            assert!(
                SigSet::thread_get_mask().unwrap().contains(Signal::SIGCHLD),
                "dropping a nested guard must keep the signal blocked"
            );
        }
        assert!(!SigSet::thread_get_mask().unwrap().contains(Signal::SIGCHLD));
    }

    #[test]
    fn test_handler_queues_exit_status() {
        let _lock = FORK_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let child = Command::new("sh").args(["-c", "exit 7"]).spawn().unwrap();
        let pid = Pid::from_raw(child.id() as i32);

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut seen = Vec::new();
        while Instant::now() < deadline {
            on_child_status(libc::SIGCHLD);
            seen.extend(take_reaped());
            if seen.iter().any(|s| s.pid() == Some(pid)) {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(seen.contains(&WaitStatus::Exited(pid, 7)), "saw {:?}", seen);
        assert!(take_reaped().is_empty());
    }

    #[test]
    fn test_cancel_flag_is_taken_once() {
        on_interactive(libc::SIGINT);
        assert!(take_cancel());
        assert!(!take_cancel());
    }
}
