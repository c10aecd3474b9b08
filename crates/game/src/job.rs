use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use dbtc_core::JobId;

use crate::profile::Profile;

/// A job offer, or the job a user is currently working.
///
/// Jobs are plain data. Anything that depends on who takes the job (reward, time to
/// complete) is computed by a [`RewardScaling`] at acceptance time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    pub description: String,
    pub payout: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Job {
    /// Time to complete once the job is active.
    pub fn duration(&self) -> Duration {
        self.expires_at - self.created_at
    }

    /// One line of the job listing shown in chat.
    pub fn info_line(&self, index: usize) -> String {
        format!(
            "[{index}] {} - {} | {} credits | {}h",
            self.name,
            self.description,
            self.payout,
            self.duration().num_hours()
        )
    }
}

/// What a user actually earns for a job, and how long it takes them.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Reward {
    pub payout: i64,
    pub duration: Duration,
}

impl Reward {
    /// Duration as a timer delay. Negative durations complete immediately.
    pub fn delay(&self) -> std::time::Duration {
        self.duration.to_std().unwrap_or(std::time::Duration::ZERO)
    }
}

/// Per-profile reward scaling seam.
///
/// Must be a pure function of its inputs so that replays and retries agree.
pub trait RewardScaling: Send + Sync {
    fn scale(&self, job: &Job, profile: &Profile) -> Reward;
}

/// Pays exactly what the offer says, in exactly the offered time.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct FlatRewards;

impl RewardScaling for FlatRewards {
    fn scale(&self, job: &Job, _profile: &Profile) -> Reward {
        Reward {
            payout: job.payout,
            duration: job.duration(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbtc_core::UserId;

    fn job(hours: i64) -> Job {
        let created_at = Utc::now();
        Job {
            id: JobId::new(),
            name: "Deliver the Package".to_string(),
            description: "Somebody needs to deliver the package.".to_string(),
            payout: 120,
            created_at,
            expires_at: created_at + Duration::hours(hours),
        }
    }

    #[test]
    fn duration_is_expiry_minus_creation() {
        assert_eq!(job(30).duration(), Duration::hours(30));
    }

    #[test]
    fn info_line_contains_index_and_payout() {
        let line = job(24).info_line(3);
        assert!(line.starts_with("[3] Deliver the Package"));
        assert!(line.contains("120 credits"));
        assert!(line.ends_with("24h"));
    }

    #[test]
    fn flat_rewards_pass_the_offer_through() {
        let j = job(25);
        let reward = FlatRewards.scale(&j, &Profile::new(UserId::new("u")));
        assert_eq!(reward.payout, 120);
        assert_eq!(reward.delay(), std::time::Duration::from_secs(25 * 3600));
    }

    #[test]
    fn negative_duration_has_zero_delay() {
        let reward = Reward {
            payout: 1,
            duration: Duration::seconds(-5),
        };
        assert_eq!(reward.delay(), std::time::Duration::ZERO);
    }
}
