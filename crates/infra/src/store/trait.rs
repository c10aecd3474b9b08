use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use dbtc_core::{ExpectedVersion, UserId};
use dbtc_game::{Job, Profile};

/// Everything stored for one user, read together at one revision.
///
/// An absent profile is reported as a fresh [`Profile::new`]; an absent pool as empty.
/// Neither case writes anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSnapshot {
    pub profile: Profile,
    pub jobs: Vec<Job>,
    pub revision: u64,
}

/// Writes to apply in one [`ProfileStore::commit`]. `None` leaves that record alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserChanges {
    pub profile: Option<Profile>,
    pub jobs: Option<Vec<Job>>,
}

impl UserChanges {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn profile(profile: Profile) -> Self {
        Self {
            profile: Some(profile),
            jobs: None,
        }
    }

    pub fn jobs(jobs: Vec<Job>) -> Self {
        Self {
            profile: None,
            jobs: Some(jobs),
        }
    }

    pub fn both(profile: Profile, jobs: Vec<Job>) -> Self {
        Self {
            profile: Some(profile),
            jobs: Some(jobs),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.profile.is_none() && self.jobs.is_none()
    }
}

/// Profile store operation error.
///
/// These are **infrastructure errors** (storage, encoding, concurrency) as opposed to
/// game rule violations, which live in `dbtc_game::JobError`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("revision conflict for user {user}: expected {expected:?}, found {actual}")]
    Conflict {
        user: UserId,
        expected: ExpectedVersion,
        actual: u64,
    },

    #[error("record encoding failed: {0}")]
    Serialization(String),

    #[error("store backend error: {0}")]
    Backend(String),

    #[error("store state poisoned")]
    Poisoned,
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        StoreError::Serialization(value.to_string())
    }
}

/// Durable per-user storage of profiles and job pools.
///
/// Keys: `profile:<user>`, `jobs:<user>` and a revision counter `rev:<user>` that
/// covers both records.
///
/// ## Write discipline
///
/// - `put` / `set_available` are unconditional overwrites (last writer wins), but still
///   advance the revision so optimistic writers observe them.
/// - `commit` is the compare-and-set primitive: it applies all of its changes and
///   advances the revision by exactly one, or fails with [`StoreError::Conflict`] and
///   writes nothing.
///
/// Every mutation made by the game goes through `commit`; the unconditional operations
/// exist for tooling and tests.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Stored profile, creating a zero-value one if absent.
    ///
    /// Creation is create-if-absent, so concurrent first accesses converge on one record.
    /// Creating does not advance the revision: the created record is indistinguishable
    /// from what `load` reports for an absent one.
    async fn get(&self, user: &UserId) -> Result<Profile, StoreError>;

    async fn put(&self, profile: &Profile) -> Result<(), StoreError>;

    /// The user's job pool; an absent pool is empty, not an error.
    async fn get_available(&self, user: &UserId) -> Result<Vec<Job>, StoreError>;

    async fn set_available(&self, user: &UserId, jobs: &[Job]) -> Result<(), StoreError>;

    async fn load(&self, user: &UserId) -> Result<UserSnapshot, StoreError>;

    /// Apply `changes` iff the user's revision matches `expected`. Returns the new revision.
    async fn commit(
        &self,
        user: &UserId,
        expected: ExpectedVersion,
        changes: UserChanges,
    ) -> Result<u64, StoreError>;
}

#[async_trait]
impl<S> ProfileStore for Arc<S>
where
    S: ProfileStore + ?Sized,
{
    async fn get(&self, user: &UserId) -> Result<Profile, StoreError> {
        (**self).get(user).await
    }

    async fn put(&self, profile: &Profile) -> Result<(), StoreError> {
        (**self).put(profile).await
    }

    async fn get_available(&self, user: &UserId) -> Result<Vec<Job>, StoreError> {
        (**self).get_available(user).await
    }

    async fn set_available(&self, user: &UserId, jobs: &[Job]) -> Result<(), StoreError> {
        (**self).set_available(user, jobs).await
    }

    async fn load(&self, user: &UserId) -> Result<UserSnapshot, StoreError> {
        (**self).load(user).await
    }

    async fn commit(
        &self,
        user: &UserId,
        expected: ExpectedVersion,
        changes: UserChanges,
    ) -> Result<u64, StoreError> {
        (**self).commit(user, expected, changes).await
    }
}

/// Shared, type-erased store handle.
pub type SharedProfileStore = Arc<dyn ProfileStore>;
