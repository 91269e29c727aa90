pub mod job;
pub mod job_control;
pub mod job_table;
mod execution;
mod redirect;
pub mod state;
pub mod terminal;

// Re-export the public API so that `main.rs` and `builtins/` can use
// `engine::ShellState`, `engine::ExecutionResult`, etc.
pub use execution::execute_list;
pub use state::{ExecutionResult, ShellState};
pub use terminal::Terminal;

/// Serializes tests that fork or reap: `waitpid(-1)` collects any child of the
/// process, so two such tests must never run at once.
#[cfg(test)]
pub static FORK_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
