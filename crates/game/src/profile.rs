use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use dbtc_core::UserId;

use crate::job::Job;

/// The inventory record nested in every profile.
///
/// No command reads or writes it yet; it is carried field for field so stored records
/// survive a rewrite unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub balance: i64,
    #[serde(default)]
    pub demerits: i64,
}

/// Terms of the active job, fixed when it was accepted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub started_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub payout: i64,
}

/// Persistent per-user game state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    #[serde(default)]
    pub inventory: Inventory,
    #[serde(default)]
    pub balance: i64,
    /// Present iff the user is working.
    #[serde(rename = "current_job", default)]
    pub active_job: Option<Job>,
    /// Set and cleared together with `active_job`; absent on older records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment: Option<Assignment>,
}

impl Profile {
    /// A fresh profile: zero balance, not working.
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            inventory: Inventory::default(),
            balance: 0,
            active_job: None,
            assignment: None,
        }
    }

    pub fn is_working(&self) -> bool {
        self.active_job.is_some()
    }

    pub fn credit(&mut self, amount: i64) {
        self.balance = self.balance.saturating_add(amount);
    }
}
