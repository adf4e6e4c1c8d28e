//! Registry of recurring digest deliveries: one job per subscribed conversation
//! and one broadcast job, each under its own `JobKey`.
//!
//! Operations:
//!
//! - `JobRegistry::start_job(key, task, schedule)`: cancel any job already
//!   registered for `key`, then schedule and store the new one.
//! - `JobRegistry::stop_job(key)`: cancel and remove the job for `key`; a missing
//!   key is a no-op.
//! - `JobRegistry::stop_all()`: cancel every job, clear the registry and close it:
//!   later `start_job` calls fail with `AgentError::RegistryClosed` (shutdown).
//!
//! Invariants:
//! - At most one live timer per key. Replacement happens under a single lock
//!   acquisition, so no other caller can observe or insert between cancel-old and
//!   insert-new.
//! - The key set is exactly the set of recurring deliveries. The broadcast job is
//!   keyed `JobKey::Broadcast` whatever its destination, so no conversation
//!   command can replace or stop it.
//! - Timers are cancelled synchronously inside the call that removes them.

use crate::model::scheduler::{Scheduler, Task, TimerHandle};
use digest_common::{AgentError, Result};
use log::info;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Identity of a recurring job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKey {
    /// Subscription of one conversation, started by `/start`.
    Conversation(i64),
    /// The auto-post to the broadcast channel.
    Broadcast,
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKey::Conversation(id) => write!(f, "conversation {}", id),
            JobKey::Broadcast => write!(f, "broadcast"),
        }
    }
}

/// When a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobSchedule {
    /// Interval between recurring runs.
    pub period: Duration,
    /// Optional extra one-shot run, independent of the recurring schedule.
    pub first_run: Option<Duration>,
}

impl JobSchedule {
    /// Recurring every `period`, first run after one period.
    pub fn every(period: Duration) -> Self {
        Self {
            period,
            first_run: None,
        }
    }

    /// Add a one-shot run after `delay`.
    pub fn with_first_run(mut self, delay: Duration) -> Self {
        self.first_run = Some(delay);
        self
    }
}

/// A scheduled job. Dropping it releases both timers.
struct RecurringJob {
    schedule: JobSchedule,
    timer: TimerHandle,
    first_run: Option<TimerHandle>,
}

impl RecurringJob {
    fn cancel(&mut self) {
        self.timer.cancel();
        if let Some(handle) = self.first_run.as_mut() {
            handle.cancel();
        }
    }
}

#[derive(Default)]
struct Jobs {
    by_key: HashMap<JobKey, RecurringJob>,
    closed: bool,
}

/// Owns every recurring job of the process.
pub struct JobRegistry {
    scheduler: Arc<dyn Scheduler>,
    jobs: Mutex<Jobs>,
}

impl JobRegistry {
    /// Create an empty registry backed by `scheduler`.
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            scheduler,
            jobs: Mutex::new(Jobs::default()),
        }
    }

    /// Start (or restart) the job for `key`. Returns `true` if an existing job was
    /// replaced.
    pub fn start_job(&self, key: JobKey, task: Task, schedule: JobSchedule) -> Result<bool> {
        let mut jobs = self.jobs.lock()?;
        if jobs.closed {
            return Err(AgentError::RegistryClosed);
        }

        let replaced = match jobs.by_key.remove(&key) {
            Some(mut old) => {
                old.cancel();
                info!("Removed existing job for {}", key);
                true
            }
            None => false,
        };

        let first_run = schedule
            .first_run
            .map(|delay| self.scheduler.schedule_once(delay, Arc::clone(&task)));
        let timer = self.scheduler.schedule_periodic(schedule.period, task);
        jobs.by_key.insert(
            key,
            RecurringJob {
                schedule,
                timer,
                first_run,
            },
        );

        info!(
            "Job for {} scheduled every {:?} (first run: {:?})",
            key, schedule.period, schedule.first_run
        );
        Ok(replaced)
    }

    /// Cancel the job for `key`. Returns `false` if there was none.
    pub fn stop_job(&self, key: &JobKey) -> Result<bool> {
        let mut jobs = self.jobs.lock()?;
        match jobs.by_key.remove(key) {
            Some(mut job) => {
                job.cancel();
                info!("Job for {} stopped", key);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Cancel every job, clear and close the registry. Returns the number of jobs
    /// stopped.
    pub fn stop_all(&self) -> Result<usize> {
        let mut jobs = self.jobs.lock()?;
        jobs.closed = true;
        let count = jobs.by_key.len();
        for (_, mut job) in jobs.by_key.drain() {
            job.cancel();
        }
        Ok(count)
    }

    /// Whether `key` currently has a job.
    #[cfg(test)]
    pub fn contains(&self, key: &JobKey) -> Result<bool> {
        Ok(self.jobs.lock()?.by_key.contains_key(key))
    }

    /// Schedule of the job registered for `key`.
    #[cfg(test)]
    pub fn schedule_of(&self, key: &JobKey) -> Result<Option<JobSchedule>> {
        Ok(self.jobs.lock()?.by_key.get(key).map(|job| job.schedule))
    }

    /// Registered keys, in no particular order.
    pub fn keys(&self) -> Result<Vec<JobKey>> {
        Ok(self.jobs.lock()?.by_key.keys().copied().collect())
    }

    /// Number of registered jobs.
    #[cfg(test)]
    pub fn len(&self) -> Result<usize> {
        Ok(self.jobs.lock()?.by_key.len())
    }

    /// `true` when no job is registered.
    #[cfg(test)]
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.jobs.lock()?.by_key.is_empty())
    }
}
