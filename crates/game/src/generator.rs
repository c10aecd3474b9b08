//! Randomized job offers.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use dbtc_core::{DomainError, DomainResult, JobId};

use crate::job::Job;
use crate::profile::Profile;

const VERBS: &[&str] = &[
    "Deliver", "Guard", "Find", "Fix", "Collect", "Clean", "Escort", "Investigate", "Paint",
    "Recover", "Sell", "Walk",
];

const NOUNS: &[&str] = &[
    "the Package",
    "the Cat",
    "the Car",
    "the Warehouse",
    "the Mayor",
    "the Briefcase",
    "the Parrot",
    "the Fence",
    "the Rumor",
    "the Debt",
    "the Neighbor's Dog",
    "the Lost Shipment",
];

/// Longest job a config may ask for, in hours.
pub const MAX_JOB_HOURS: i64 = 30 * 24;

/// Bounds for generated offers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobGenerationConfig {
    /// Offers per regenerated pool.
    pub pool_size: usize,
    pub min_payout: i64,
    pub max_payout: i64,
    pub min_duration: Duration,
    pub max_duration: Duration,
}

impl Default for JobGenerationConfig {
    fn default() -> Self {
        Self {
            pool_size: 10,
            min_payout: 50,
            max_payout: 1000,
            min_duration: Duration::hours(24),
            max_duration: Duration::hours(48),
        }
    }
}

impl JobGenerationConfig {
    pub fn validate(&self) -> DomainResult<()> {
        if self.pool_size == 0 {
            return Err(DomainError::validation("pool_size must be at least 1"));
        }
        if self.min_payout < 0 || self.min_payout > self.max_payout {
            return Err(DomainError::validation(format!(
                "invalid payout range [{}, {}]",
                self.min_payout, self.max_payout
            )));
        }
        if self.min_duration < Duration::zero() || self.min_duration > self.max_duration {
            return Err(DomainError::validation(format!(
                "invalid duration range [{}s, {}s]",
                self.min_duration.num_seconds(),
                self.max_duration.num_seconds()
            )));
        }
        if self.max_duration > Duration::hours(MAX_JOB_HOURS) {
            return Err(DomainError::validation(format!(
                "max duration {}h exceeds the {MAX_JOB_HOURS}h limit",
                self.max_duration.num_hours()
            )));
        }
        Ok(())
    }
}

/// Generates job offers from a fixed verb × noun vocabulary.
///
/// Deterministic for a given random source and `now`; it never touches storage.
#[derive(Debug, Clone, Default)]
pub struct JobGenerator {
    config: JobGenerationConfig,
}

impl JobGenerator {
    pub fn new(config: JobGenerationConfig) -> DomainResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &JobGenerationConfig {
        &self.config
    }

    /// A full pool of `config.pool_size` offers.
    pub fn pool<R: Rng + ?Sized>(
        &self,
        profile: &Profile,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> DomainResult<Vec<Job>> {
        self.generate(profile, self.config.pool_size, now, rng)
    }

    /// `count` fresh offers, all created at `now`.
    ///
    /// The profile is accepted so offers can later be tailored to the user; today it is
    /// unused. Fails only if an expiry falls outside the representable time range.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        _profile: &Profile,
        count: usize,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> DomainResult<Vec<Job>> {
        let min_secs = self.config.min_duration.num_seconds();
        let max_secs = self.config.max_duration.num_seconds();

        (0..count)
            .map(|_| -> DomainResult<Job> {
                let verb = VERBS[rng.gen_range(0..VERBS.len())];
                let noun = NOUNS[rng.gen_range(0..NOUNS.len())];
                let payout = rng.gen_range(self.config.min_payout..=self.config.max_payout);
                let secs = rng.gen_range(min_secs..=max_secs);
                let expires_at = now.checked_add_signed(Duration::seconds(secs)).ok_or_else(|| {
                    DomainError::invariant(format!("job expiry overflows: {now} + {secs}s"))
                })?;

                Ok(Job {
                    id: JobId::new(),
                    name: format!("{verb} {noun}"),
                    description: format!(
                        "Somebody needs a hand. {verb} {} and get paid.",
                        noun.to_lowercase()
                    ),
                    payout,
                    created_at: now,
                    expires_at,
                })
            })
            .collect()
    }
}
