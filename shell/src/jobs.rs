//! Background job table.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

struct Job {
    command: String,
    token: CancellationToken,
    started: DateTime<Utc>,
}

/// Snapshot of a running job, as listed by `ps`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInfo {
    pub id: u64,
    pub command: String,
    pub started: DateTime<Utc>,
}

/// Running background jobs. Ids are never reused.
pub struct JobTable {
    next_id: AtomicU64,
    jobs: Mutex<BTreeMap<u64, Job>>,
}

impl Default for JobTable {
    fn default() -> Self {
        Self::new()
    }
}

impl JobTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            jobs: Mutex::new(BTreeMap::new()),
        }
    }

    fn jobs(&self) -> MutexGuard<'_, BTreeMap<u64, Job>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate an id and a token for a new job.
    pub fn register(&self, command: impl Into<String>) -> (u64, CancellationToken) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let command = command.into();
        tracing::info!(job = id, %command, "job started");
        self.jobs().insert(
            id,
            Job {
                command,
                token: token.clone(),
                started: Utc::now(),
            },
        );
        (id, token)
    }

    /// Drop a finished job. Returns false when it was already killed.
    pub fn finish(&self, id: u64) -> bool {
        let removed = self.jobs().remove(&id).is_some();
        if removed {
            tracing::info!(job = id, "job finished");
        }
        removed
    }

    /// Cancel and forget a job. Unknown ids return false.
    pub fn kill(&self, id: u64) -> bool {
        let Some(job) = self.jobs().remove(&id) else {
            return false;
        };
        job.token.cancel();
        tracing::info!(job = id, command = %job.command, "job killed");
        true
    }

    #[must_use]
    pub fn contains(&self, id: u64) -> bool {
        self.jobs().contains_key(&id)
    }

    #[must_use]
    pub fn list(&self) -> Vec<JobInfo> {
        self.jobs()
            .iter()
            .map(|(id, job)| JobInfo {
                id: *id,
                command: job.command.clone(),
                started: job.started,
            })
            .collect()
    }

    pub fn cancel_all(&self) {
        let jobs = std::mem::take(&mut *self.jobs());
        for (id, job) in jobs {
            tracing::debug!(job = id, "cancelling job");
            job.token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic() {
        let table = JobTable::new();
        let (a, _) = table.register("sleep 1");
        let (b, _) = table.register("sleep 2");
        assert!(b > a);
        table.finish(b);
        let (c, _) = table.register("sleep 3");
        assert!(c > b);
    }

    #[test]
    fn kill_cancels_and_removes() {
        let table = JobTable::new();
        let (id, token) = table.register("sleep 10");
        assert!(table.kill(id));
        assert!(token.is_cancelled());
        assert!(table.list().is_empty());
        assert!(!table.kill(id));
        assert!(!table.finish(id));
    }

    #[test]
    fn cancel_all_empties_table() {
        let table = JobTable::new();
        let (_, t1) = table.register("a");
        let (_, t2) = table.register("b");
        table.cancel_all();
        assert!(t1.is_cancelled() && t2.is_cancelled());
        assert!(table.list().is_empty());
    }
}
