use crate::builtins;
use crate::engine::{ExecutionResult, ShellState};

pub type BuiltinRunner = fn(&[String], &mut ShellState) -> (ExecutionResult, i32);

pub struct CommandInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub usage: &'static str,
    pub run: BuiltinRunner,
}

/// The commands the shell runs itself instead of forking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Jobs,
    Fg,
    Bg,
    Kill,
    Stop,
    Exit,
    Help,
}

impl Builtin {
    pub const ALL: [Builtin; 7] = [
        Builtin::Jobs,
        Builtin::Fg,
        Builtin::Bg,
        Builtin::Kill,
        Builtin::Stop,
        Builtin::Exit,
        Builtin::Help,
    ];

    pub fn resolve(name: &str) -> Option<Builtin> {
        Builtin::ALL.into_iter().find(|b| b.info().name == name)
    }

    pub fn info(self) -> &'static CommandInfo {
        match self {
            Builtin::Jobs => &builtins::jobs::COMMAND_INFO,
            Builtin::Fg => &builtins::fg::COMMAND_INFO,
            Builtin::Bg => &builtins::bg::COMMAND_INFO,
            Builtin::Kill => &builtins::kill_cmd::COMMAND_INFO,
            Builtin::Stop => &builtins::stop::COMMAND_INFO,
            Builtin::Exit => &builtins::system::COMMAND_INFO_EXIT,
            Builtin::Help => &builtins::help::COMMAND_INFO,
        }
    }

    pub fn run(self, args: &[String], state: &mut ShellState) -> (ExecutionResult, i32) {
        (self.info().run)(args, state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_by_name() {
        assert_eq!(Builtin::resolve("jobs"), Some(Builtin::Jobs));
        assert_eq!(Builtin::resolve("kill"), Some(Builtin::Kill));
        assert_eq!(Builtin::resolve("exit"), Some(Builtin::Exit));
        assert_eq!(Builtin::resolve("ls"), None);
        assert_eq!(Builtin::resolve(""), None);
    }

    #[test]
    fn test_names_are_unique() {
        for (i, a) in Builtin::ALL.iter().enumerate() {
            for b in &Builtin::ALL[i + 1..] {
                assert_ne!(a.info().name, b.info().name);
            }
        }
    }
}
