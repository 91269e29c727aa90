pub mod bg;
pub mod fg;
pub mod help;
pub mod jobs;
pub mod kill_cmd;
pub mod registry;
pub mod stop;
pub mod system;

use crate::error::ShellError;

/// Print a builtin's error the way every diagnostic is printed and return its
/// exit status.
pub(crate) fn report(err: ShellError) -> i32 {
    eprintln!("esh: {}", err);
    err.status()
}
