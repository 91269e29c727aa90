use crate::builtins::registry::CommandInfo;
use crate::engine::job_control::{flush_notices, reap_pending};
use crate::engine::job_table::JobTable;
use crate::engine::state::{ExecutionResult, ShellState};

pub const COMMAND_INFO: CommandInfo = CommandInfo {
    name: "jobs",
    description: "Display status of jobs.",
    usage: "jobs\n\nLists the active jobs. The current job is marked `+`, the previous one `-`.",
    run: jobs_runner,
};

pub fn jobs_runner(_args: &[String], state: &mut ShellState) -> (ExecutionResult, i32) {
    let code = run(state);
    (ExecutionResult::KeepRunning, code)
}

pub fn run(state: &mut ShellState) -> i32 {
    // Report finished jobs first so they are not listed as running.
    reap_pending(state);
    flush_notices(state);
    for line in listing(&state.jobs) {
        println!("{}", line);
    }
    0
}

/// One line per active job, oldest first.
pub fn listing(jobs: &JobTable) -> Vec<String> {
    jobs.iter()
        .map(|job| {
            format!(
                "[{}]{}  {:<22}{}",
                job.id,
                jobs.mark(job.id),
                job.status.label(),
                job.command_line()
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::job::{Job, JobStatus};
    use crate::parser::parse_line;

    fn add(jobs: &mut JobTable, line: &str, status: JobStatus) {
        let pipeline = parse_line(line).unwrap().remove(0);
        let id = jobs.next_job_id();
        let mut job = Job::new(id, &pipeline);
        job.status = status;
        jobs.insert(job);
    }

    #[test]
    fn test_empty_table_lists_nothing() {
        assert!(listing(&JobTable::new()).is_empty());
    }

    #[test]
    fn test_listing_marks_and_labels() {
        let mut jobs = JobTable::new();
        add(&mut jobs, "sleep 100 &", JobStatus::Background);
        add(&mut jobs, "vim notes", JobStatus::Stopped);
        add(&mut jobs, "cat | wc -l &", JobStatus::NeedsTerminal);

        assert_eq!(
            listing(&jobs),
            vec![
                "[1]   Running               sleep 100 &",
                "[2]-  Stopped               vim notes",
                "[3]+  Stopped (tty)         cat | wc -l &",
            ]
        );
    }

    #[test]
    fn test_listing_shows_redirects() {
        let mut jobs = JobTable::new();
        add(&mut jobs, "sort < in | uniq >> out &", JobStatus::Background);
        assert_eq!(
            listing(&jobs),
            vec!["[1]+  Running               sort < in | uniq >> out &"]
        );
    }
}
