use crate::builtins::registry::CommandInfo;
use crate::engine::state::{ExecutionResult, ShellState};

pub const COMMAND_INFO_EXIT: CommandInfo = CommandInfo {
    name: "exit",
    description: "Exit the shell.",
    usage: "exit\n\nExit the shell. Stopped jobs are sent a hangup and resumed first.",
    run: exit_runner,
};

pub fn exit_runner(_args: &[String], _state: &mut ShellState) -> (ExecutionResult, i32) {
    (ExecutionResult::Exit, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_ends_the_loop() {
        let mut state = ShellState::detached();
        let (result, code) = exit_runner(&["ignored".to_string()], &mut state);
        assert!(matches!(result, ExecutionResult::Exit));
        assert_eq!(code, 0);
    }
}
