use std::ffi::{CStr, CString};
use std::os::fd::BorrowedFd;

use nix::errno::Errno;
use nix::fcntl::{self, OFlag};
use nix::libc;
use nix::sys::stat::Mode;
use nix::unistd;

use crate::error::{Result, ShellError};
use crate::parser::ParsedCommand;

/// File redirections for one pipeline stage, prepared in the parent so the
/// forked child can open them without allocating.
#[derive(Debug, Clone, Default)]
pub struct Redirection {
    input: Option<CString>,
    output: Option<CString>,
    append: bool,
}

impl Redirection {
    /// Only the first stage reads from a file and only the last one writes to
    /// one; the stages in between talk through pipes.
    pub fn for_stage(cmd: &ParsedCommand, first: bool, last: bool) -> Result<Self> {
        let input = match &cmd.input {
            Some(path) if first => Some(c_path(path)?),
            _ => None,
        };
        let output = match &cmd.output {
            Some(path) if last => Some(c_path(path)?),
            _ => None,
        };
        Ok(Redirection {
            input,
            output,
            append: cmd.append,
        })
    }

    /// Open the files onto stdin/stdout. Runs in the forked child; on failure
    /// it reports the file and terminates the child.
    pub fn apply(&self) {
        if let Some(path) = &self.input {
            let fd = fcntl::open(path.as_c_str(), OFlag::O_RDONLY | OFlag::O_CLOEXEC, Mode::empty())
                .unwrap_or_else(|e| fail(path, e));
            if let Err(e) = unistd::dup2_stdin(&fd) {
                fail(path, e);
            }
        }

        if let Some(path) = &self.output {
            let mut flags = OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_CLOEXEC;
            flags |= if self.append {
                OFlag::O_APPEND
            } else {
                OFlag::O_TRUNC
            };
            let mode = Mode::S_IRUSR | Mode::S_IWUSR | Mode::S_IRGRP | Mode::S_IWGRP;
            let fd = fcntl::open(path.as_c_str(), flags, mode).unwrap_or_else(|e| fail(path, e));
            if let Err(e) = unistd::dup2_stdout(&fd) {
                fail(path, e);
            }
        }
    }
}

fn c_path(path: &str) -> Result<CString> {
    CString::new(path)
        .map_err(|_| ShellError::InvalidArgument(format!("{}: invalid file name", path)))
}

fn fail(path: &CStr, err: Errno) -> ! {
    report(stderr(), path.to_bytes(), err);
    unsafe { libc::_exit(1) }
}

/// Write `esh: <subject>: <error>` to `fd` without allocating, so it is safe
/// between fork and exec.
pub(super) fn report(fd: BorrowedFd<'_>, subject: &[u8], err: Errno) {
    for part in [
        b"esh: ".as_slice(),
        subject,
        b": ",
        err.desc().as_bytes(),
        b"\n",
    ] {
        let _ = unistd::write(fd, part);
    }
}

pub(super) fn stderr() -> BorrowedFd<'static> {
    unsafe { BorrowedFd::borrow_raw(libc::STDERR_FILENO) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_line;
    use std::fs::File;
    use std::io::Read;
    use std::os::fd::AsFd;

    fn stages(line: &str) -> Vec<Redirection> {
        let pipeline = parse_line(line).unwrap().remove(0);
        let last = pipeline.commands.len() - 1;
        pipeline
            .commands
            .iter()
            .enumerate()
            .map(|(i, cmd)| Redirection::for_stage(cmd, i == 0, i == last).unwrap())
            .collect()
    }

    #[test]
    fn test_single_command_keeps_both() {
        let r = &stages("sort < in > out")[0];
        assert_eq!(r.input.as_deref(), Some(c"in"));
        assert_eq!(r.output.as_deref(), Some(c"out"));
        assert!(!r.append);
    }

    #[test]
    fn test_inner_redirects_are_ignored() {
        let r = stages("cat < a > b | sort < c >> d");
        assert_eq!(r[0].input.as_deref(), Some(c"a"));
        assert!(r[0].output.is_none());
        assert!(r[1].input.is_none());
        assert_eq!(r[1].output.as_deref(), Some(c"d"));
        assert!(r[1].append);
    }

    #[test]
    fn test_report_formats_errno() {
        let (read, write) = unistd::pipe2(OFlag::O_CLOEXEC).unwrap();
        report(write.as_fd(), b"setpgid", Errno::EPERM);
        drop(write);
        let mut message = String::new();
        File::from(read).read_to_string(&mut message).unwrap();
        assert_eq!(message, "esh: setpgid: Operation not permitted\n");
    }

    #[test]
    fn test_middle_stage_has_none() {
        let middle = &stages("a | b > x | c")[1];
        assert!(middle.input.is_none() && middle.output.is_none());
    }
}
