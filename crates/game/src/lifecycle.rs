//! Job lifecycle transitions.
//!
//! ```text
//! Idle --accept(index)--> Working --complete(job_id)--> Idle
//! ```
//!
//! Both transitions are pure: they validate against the current state and mutate the
//! in-memory profile/pool only on success. Persisting the result and running the
//! completion timer are infrastructure concerns.

use chrono::{DateTime, Utc};
use thiserror::Error;

use dbtc_core::JobId;

use crate::job::{Job, Reward, RewardScaling};
use crate::profile::{Assignment, Profile};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("no job id provided")]
    MissingJobId,

    #[error("'{0}' is not a valid job id")]
    InvalidJobId(String),

    #[error("job id {index} is out of range ({available} jobs available)")]
    OutOfRange { index: usize, available: usize },

    #[error("already working on '{name}'")]
    AlreadyWorking { job_id: JobId, name: String },

    #[error("no active job")]
    NotWorking,

    #[error("active job is {active}, not {expected}")]
    JobMismatch { expected: JobId, active: JobId },
}

/// Parse the `<job ID>` argument of `!jobs start`.
///
/// Only non-negative integers are accepted; range is checked against the pool later.
pub fn parse_job_index(arg: Option<&str>) -> Result<usize, JobError> {
    let raw = arg.map(str::trim).filter(|s| !s.is_empty()).ok_or(JobError::MissingJobId)?;
    raw.parse::<usize>()
        .map_err(|_| JobError::InvalidJobId(raw.to_string()))
}

/// Result of a successful `accept`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acceptance {
    pub job: Job,
    pub reward: Reward,
}

/// Result of a successful `complete`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub job: Job,
    pub payout: i64,
    pub balance: i64,
}

impl Profile {
    /// `Idle --accept(index)--> Working`.
    ///
    /// Removes the offer at `index` from `pool` and makes it the active job, recording
    /// when it started and when it is due. On error neither the profile nor the pool is
    /// touched.
    pub fn accept_offer(
        &mut self,
        pool: &mut Vec<Job>,
        index: usize,
        scaling: &dyn RewardScaling,
        now: DateTime<Utc>,
    ) -> Result<Acceptance, JobError> {
        if let Some(active) = &self.active_job {
            return Err(JobError::AlreadyWorking {
                job_id: active.id,
                name: active.name.clone(),
            });
        }
        if index >= pool.len() {
            return Err(JobError::OutOfRange {
                index,
                available: pool.len(),
            });
        }

        let job = pool.remove(index);
        let reward = scaling.scale(&job, self);
        self.active_job = Some(job.clone());
        self.assignment = Some(Assignment {
            started_at: now,
            due_at: now
                .checked_add_signed(reward.duration)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            payout: reward.payout,
        });

        Ok(Acceptance { job, reward })
    }

    /// `Working --complete(job_id)--> Idle`.
    ///
    /// Pays `payout` and clears the active job, but only if `job_id` is still the
    /// active job. Completing twice is therefore a `NotWorking` error, never a double pay.
    pub fn complete_job(&mut self, job_id: JobId, payout: i64) -> Result<Completion, JobError> {
        let active = self.active_job.as_ref().ok_or(JobError::NotWorking)?;
        if active.id != job_id {
            return Err(JobError::JobMismatch {
                expected: job_id,
                active: active.id,
            });
        }

        let job = self.active_job.take().ok_or(JobError::NotWorking)?;
        self.assignment = None;
        self.credit(payout);

        Ok(Completion {
            job,
            payout,
            balance: self.balance,
        })
    }

    /// The active job and what it pays, if it should have completed by `now`.
    ///
    /// Records without an assignment fall back to the job's own expiry and payout.
    pub fn overdue_job(&self, now: DateTime<Utc>) -> Option<(JobId, i64)> {
        let job = self.active_job.as_ref()?;
        let (due_at, payout) = match &self.assignment {
            Some(assignment) => (assignment.due_at, assignment.payout),
            None => (job.expires_at, job.payout),
        };
        (due_at <= now).then_some((job.id, payout))
    }
}
