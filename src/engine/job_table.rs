use nix::unistd::Pid;

use super::job::{Job, JobStatus, Process};
use crate::error::{Result, ShellError};

/// Registry of active jobs, oldest first.
///
/// The most recently inserted job still present is the current job (`+`),
/// the one before it the previous job (`-`).
#[derive(Debug, Default)]
pub struct JobTable {
    jobs: Vec<Job>,
    last_id: usize,
}

impl JobTable {
    pub fn new() -> Self {
        JobTable::default()
    }

    /// Allocate a fresh job id. Numbering restarts at 1 once the table empties.
    pub fn next_job_id(&mut self) -> usize {
        self.last_id += 1;
        self.last_id
    }

    pub fn insert(&mut self, job: Job) {
        debug_assert!(self.find_by_job_id(job.id).is_none());
        self.jobs.push(job);
    }

    pub fn remove(&mut self, id: usize) -> Option<Job> {
        let idx = self.jobs.iter().position(|j| j.id == id)?;
        let job = self.jobs.remove(idx);
        if self.jobs.is_empty() {
            self.last_id = 0;
        }
        Some(job)
    }

    pub fn find_by_job_id(&self, id: usize) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == id)
    }

    pub fn find_by_job_id_mut(&mut self, id: usize) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|j| j.id == id)
    }

    pub fn find_by_process_id(&self, pid: Pid) -> Option<(&Job, &Process)> {
        self.jobs.iter().find_map(|job| {
            job.processes
                .iter()
                .find(|p| p.pid == Some(pid))
                .map(|p| (job, p))
        })
    }

    /// Like [`find_by_process_id`](Self::find_by_process_id), returning the
    /// process by index so the caller can update both.
    pub fn find_by_process_id_mut(&mut self, pid: Pid) -> Option<(&mut Job, usize)> {
        self.jobs.iter_mut().find_map(|job| {
            let idx = job.processes.iter().position(|p| p.pid == Some(pid))?;
            Some((job, idx))
        })
    }

    pub fn find_by_process_group(&self, pgid: Pid) -> Option<&Job> {
        self.jobs.iter().find(|j| j.pgid == Some(pgid))
    }

    pub fn current(&self) -> Option<&Job> {
        self.jobs.last()
    }

    pub fn previous(&self) -> Option<&Job> {
        self.jobs.iter().rev().nth(1)
    }

    pub fn foreground(&self) -> Option<&Job> {
        self.jobs.iter().find(|j| j.status == JobStatus::Foreground)
    }

    /// `+`, `-` or blank, as `jobs` and job notices show it.
    pub fn mark(&self, id: usize) -> char {
        if self.current().is_some_and(|j| j.id == id) {
            '+'
        } else if self.previous().is_some_and(|j| j.id == id) {
            '-'
        } else {
            ' '
        }
    }

    /// Resolve a builtin's job argument: `N`, `%N`, or the current job when absent.
    pub fn resolve(&self, cmd: &'static str, spec: Option<&str>) -> Result<usize> {
        let Some(spec) = spec else {
            return self
                .current()
                .map(|j| j.id)
                .ok_or_else(|| ShellError::no_such_job(cmd, "current"));
        };

        spec.strip_prefix('%')
            .unwrap_or(spec)
            .parse::<usize>()
            .ok()
            .and_then(|id| self.find_by_job_id(id))
            .map(|j| j.id)
            .ok_or_else(|| ShellError::no_such_job(cmd, spec))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_line;

    fn add(table: &mut JobTable, line: &str, first_pid: i32) -> usize {
        let pipelines = parse_line(line).unwrap();
        let id = table.next_job_id();
        let mut job = Job::new(id, &pipelines[0]);
        for (i, p) in job.processes.iter_mut().enumerate() {
            p.pid = Some(Pid::from_raw(first_pid + i as i32));
        }
        job.pgid = Some(Pid::from_raw(first_pid));
        table.insert(job);
        id
    }

    #[test]
    fn test_ids_increase_while_non_empty() {
        let mut table = JobTable::new();
        let a = add(&mut table, "sleep 1 &", 100);
        let b = add(&mut table, "sleep 2 &", 200);
        assert_eq!((a, b), (1, 2));

        table.remove(a);
        let c = add(&mut table, "sleep 3 &", 300);
        assert_eq!(c, 3, "ids are not reused while the table is non-empty");
    }

    #[test]
    fn test_ids_reset_when_empty() {
        let mut table = JobTable::new();
        let a = add(&mut table, "sleep 1 &", 100);
        let b = add(&mut table, "sleep 2 &", 200);
        table.remove(a);
        table.remove(b);
        assert!(table.is_empty());
        assert_eq!(add(&mut table, "sleep 3 &", 300), 1);
    }

    #[test]
    fn test_lookups() {
        let mut table = JobTable::new();
        add(&mut table, "sleep 1 | cat &", 100);
        let b = add(&mut table, "yes | head &", 200);

        let (job, process) = table.find_by_process_id(Pid::from_raw(201)).unwrap();
        assert_eq!(job.id, b);
        assert_eq!(process.name(), "head");

        assert_eq!(table.find_by_process_group(Pid::from_raw(100)).unwrap().id, 1);
        assert!(table.find_by_process_group(Pid::from_raw(101)).is_none());
        assert!(table.find_by_process_id(Pid::from_raw(999)).is_none());
        assert!(table.find_by_job_id(7).is_none());

        let (job, idx) = table.find_by_process_id_mut(Pid::from_raw(101)).unwrap();
        assert_eq!((job.id, idx), (1, 1));
    }

    #[test]
    fn test_current_and_previous() {
        let mut table = JobTable::new();
        assert!(table.current().is_none());
        let a = add(&mut table, "sleep 1 &", 100);
        let b = add(&mut table, "sleep 2 &", 200);
        let c = add(&mut table, "sleep 3 &", 300);

        assert_eq!(table.current().unwrap().id, c);
        assert_eq!(table.previous().unwrap().id, b);
        assert_eq!(table.mark(c), '+');
        assert_eq!(table.mark(b), '-');
        assert_eq!(table.mark(a), ' ');

        table.remove(c);
        assert_eq!(table.mark(b), '+');
        assert_eq!(table.mark(a), '-');
    }

    #[test]
    fn test_resolve() {
        let mut table = JobTable::new();
        assert_eq!(
            table.resolve("fg", None).unwrap_err().to_string(),
            "fg: current: no such job"
        );

        add(&mut table, "sleep 1 &", 100);
        add(&mut table, "sleep 2 &", 200);
        assert_eq!(table.resolve("fg", None).unwrap(), 2);
        assert_eq!(table.resolve("bg", Some("1")).unwrap(), 1);
        assert_eq!(table.resolve("bg", Some("%1")).unwrap(), 1);
        assert_eq!(
            table.resolve("kill", Some("5")).unwrap_err().to_string(),
            "kill: 5: no such job"
        );
        assert!(table.resolve("kill", Some("abc")).is_err());
    }

    #[test]
    fn test_foreground() {
        let mut table = JobTable::new();
        add(&mut table, "sleep 1 &", 100);
        assert!(table.foreground().is_none());
        let id = add(&mut table, "sleep 2", 200);
        assert_eq!(table.foreground().unwrap().id, id);
    }
}
