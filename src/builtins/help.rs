use crate::builtins::registry::{Builtin, CommandInfo};
use crate::engine::{ExecutionResult, ShellState};

pub const COMMAND_INFO: CommandInfo = CommandInfo {
    name: "help",
    description: "Display information about builtin commands.",
    usage: "help [name ...]\n\nWithout arguments, list the builtins and their descriptions. With NAME,\nshow that builtin's usage.",
    run: help_runner,
};

pub fn help_runner(args: &[String], _state: &mut ShellState) -> (ExecutionResult, i32) {
    let mut exit_code = 0;

    if args.is_empty() {
        print!("{}", overview());
    } else {
        for arg in args {
            match topic(arg) {
                Some(text) => println!("{}", text),
                None => {
                    eprintln!("esh: help: no help topics match `{}`", arg);
                    exit_code = 1;
                }
            }
        }
    }
    (ExecutionResult::KeepRunning, exit_code)
}

fn overview() -> String {
    let mut help_text = format!("esh, version {}\n", env!("CARGO_PKG_VERSION"));
    help_text.push_str("These shell commands are defined internally. Type `help name` to find out\n");
    help_text.push_str("more about the command `name`.\n\n");

    let max_len = Builtin::ALL
        .iter()
        .map(|b| b.info().name.len())
        .max()
        .unwrap_or(0);
    for builtin in Builtin::ALL {
        let info = builtin.info();
        help_text.push_str(&format!(" {:<width$}  {}\n", info.name, info.description, width = max_len));
    }
    help_text
}

fn topic(name: &str) -> Option<String> {
    let info = Builtin::resolve(name)?.info();
    Some(format!("{}: {}\n{}", info.name, info.description, info.usage))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overview_lists_every_builtin() {
        let text = overview();
        for builtin in Builtin::ALL {
            assert!(text.contains(builtin.info().name), "missing {:?}", builtin);
        }
        assert!(text.contains(" stop  Suspend a job.\n"));
    }

    #[test]
    fn test_topic() {
        assert_eq!(topic("kill").unwrap(), "kill: Terminate a job.\nkill <job_id>");
        assert!(topic("cd").is_none());
    }

    #[test]
    fn test_unknown_topic_fails() {
        let mut state = ShellState::detached();
        let (_, code) = help_runner(&["nope".to_string()], &mut state);
        assert_eq!(code, 1);
    }
}
