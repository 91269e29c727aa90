mod builtins;
mod config;
mod engine;
mod error;
mod parser;
mod signals;

#[cfg(not(unix))]
compile_error!("esh relies on POSIX process groups and terminal control");

use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use rustyline::error::ReadlineError;
use rustyline::{Cmd, DefaultEditor, KeyEvent};
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use config::{Invocation, ShellConfig, USAGE};
use engine::job_control::{hangup_stopped, update_jobs};
use engine::{ExecutionResult, ShellState, Terminal};
use error::{Result, ShellError};

fn main() -> ExitCode {
    let config = match ShellConfig::from_env() {
        Ok(Invocation::Run(config)) => config,
        Ok(Invocation::Help) => {
            println!("{}", USAGE);
            return ExitCode::SUCCESS;
        }
        Ok(Invocation::Version) => {
            println!("esh {}", env!("CARGO_PKG_VERSION"));
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("esh: {}", e);
            return ExitCode::from(2);
        }
    };

    init_tracing(config.log_filter.as_deref());

    match run(&config) {
        Ok(code) => ExitCode::from((code & 0xff) as u8),
        Err(e) => {
            eprintln!("esh: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Diagnostics go to stderr, filtered by `ESH_LOG`; silent by default.
fn init_tracing(directives: Option<&str>) {
    let (filter, invalid) = match EnvFilter::try_new(directives.unwrap_or("off")) {
        Ok(filter) => (filter, None),
        Err(e) => (EnvFilter::new("off"), Some(e)),
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
    if let Some(e) = invalid {
        eprintln!("esh: ESH_LOG: {}", e);
    }
}

fn run(config: &ShellConfig) -> Result<i32> {
    let terminal = Terminal::init(&config.signals)?;
    signals::install(&config.signals)?;
    let mut state = ShellState::new(terminal, config.signals);
    debug!(interactive = state.terminal.is_interactive(), "shell started");

    if let Some(line) = &config.command {
        execute_line(line, &mut state);
        hangup_stopped(&state);
        return Ok(state.last_status);
    }

    let mut rl = DefaultEditor::new()?;
    // Ctrl-Z at the prompt abandons the line, like Ctrl-C.
    let _ = rl.bind_sequence(KeyEvent::ctrl('Z'), Cmd::Interrupt);

    'repl: loop {
        update_jobs(&mut state);
        if let Err(e) = state.terminal.give_to_shell() {
            eprintln!("esh: {}", e);
        }
        // Anything raised before the prompt concerns no line.
        signals::take_cancel();

        let line = match rl.readline(&prompt(config, &state)) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => continue 'repl,
            Err(ReadlineError::Eof) => {
                if state.terminal.is_interactive() {
                    println!("exit");
                }
                break 'repl;
            }
            Err(_) if signals::take_cancel() => continue 'repl,
            Err(e) => {
                eprintln!("esh: {}", ShellError::from(e));
                break 'repl;
            }
        };
        if signals::take_cancel() {
            continue 'repl;
        }

        if let ExecutionResult::Exit = execute_line(&line, &mut state) {
            break 'repl;
        }
    }

    hangup_stopped(&state);
    Ok(0)
}

fn execute_line(line: &str, state: &mut ShellState) -> ExecutionResult {
    match parser::parse_line(line) {
        Ok(pipelines) => engine::execute_list(pipelines, state),
        Err(e) => {
            eprintln!("esh: {}", e);
            state.last_status = e.status();
            ExecutionResult::KeepRunning
        }
    }
}

fn prompt(config: &ShellConfig, state: &ShellState) -> String {
    if !state.terminal.is_interactive() {
        return String::new();
    }
    if let Some(prompt) = &config.prompt {
        return prompt.clone();
    }
    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    format!("esh {}> ", display_path(&cwd, dirs::home_dir().as_deref()))
}

/// `cwd` with the home directory shortened to `~`.
fn display_path(cwd: &Path, home: Option<&Path>) -> String {
    match home.map(|home| cwd.strip_prefix(home)) {
        Some(Ok(relative)) if relative.as_os_str().is_empty() => "~".to_string(),
        Some(Ok(relative)) => format!("~/{}", relative.display()),
        _ => cwd.display().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_path() {
        let home = Path::new("/home/ada");
        assert_eq!(display_path(Path::new("/home/ada"), Some(home)), "~");
        assert_eq!(display_path(Path::new("/home/ada/src/esh"), Some(home)), "~/src/esh");
        assert_eq!(display_path(Path::new("/home/adam"), Some(home)), "/home/adam");
        assert_eq!(display_path(Path::new("/tmp"), None), "/tmp");
    }

    #[test]
    fn test_no_prompt_without_terminal() {
        let config = ShellConfig {
            prompt: Some("$ ".to_string()),
            ..ShellConfig::default()
        };
        assert_eq!(prompt(&config, &ShellState::detached()), "");
    }

    #[test]
    fn test_syntax_error_sets_status() {
        let mut state = ShellState::detached();
        assert!(matches!(
            execute_line("| wc", &mut state),
            ExecutionResult::KeepRunning
        ));
        assert_eq!(state.last_status, 2);
    }

    #[test]
    fn test_exit_line() {
        let mut state = ShellState::detached();
        assert!(matches!(execute_line("exit", &mut state), ExecutionResult::Exit));
    }
}
