use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use dbtc_core::{ExpectedVersion, UserId};
use dbtc_game::{Job, Profile};

use super::r#trait::{ProfileStore, StoreError, UserChanges, UserSnapshot};

#[derive(Debug, Clone, Default)]
struct UserRecord {
    profile: Option<Profile>,
    jobs: Option<Vec<Job>>,
    revision: u64,
}

/// In-memory profile store.
///
/// Intended for tests/dev. Same revision semantics as the Redis store; no IO.
#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    users: RwLock<HashMap<UserId, UserRecord>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current revision of a user (0 if never written).
    pub fn revision(&self, user: &UserId) -> u64 {
        self.users
            .read()
            .map(|u| u.get(user).map_or(0, |r| r.revision))
            .unwrap_or(0)
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn get(&self, user: &UserId) -> Result<Profile, StoreError> {
        let mut users = self.users.write().map_err(|_| StoreError::Poisoned)?;
        let record = users.entry(user.clone()).or_default();
        Ok(record
            .profile
            .get_or_insert_with(|| Profile::new(user.clone()))
            .clone())
    }

    async fn put(&self, profile: &Profile) -> Result<(), StoreError> {
        let mut users = self.users.write().map_err(|_| StoreError::Poisoned)?;
        let record = users.entry(profile.id.clone()).or_default();
        record.profile = Some(profile.clone());
        record.revision += 1;
        Ok(())
    }

    async fn get_available(&self, user: &UserId) -> Result<Vec<Job>, StoreError> {
        let users = self.users.read().map_err(|_| StoreError::Poisoned)?;
        Ok(users
            .get(user)
            .and_then(|r| r.jobs.clone())
            .unwrap_or_default())
    }

    async fn set_available(&self, user: &UserId, jobs: &[Job]) -> Result<(), StoreError> {
        let mut users = self.users.write().map_err(|_| StoreError::Poisoned)?;
        let record = users.entry(user.clone()).or_default();
        record.jobs = Some(jobs.to_vec());
        record.revision += 1;
        Ok(())
    }

    async fn load(&self, user: &UserId) -> Result<UserSnapshot, StoreError> {
        let users = self.users.read().map_err(|_| StoreError::Poisoned)?;
        let record = users.get(user).cloned().unwrap_or_default();
        Ok(UserSnapshot {
            profile: record.profile.unwrap_or_else(|| Profile::new(user.clone())),
            jobs: record.jobs.unwrap_or_default(),
            revision: record.revision,
        })
    }

    async fn commit(
        &self,
        user: &UserId,
        expected: ExpectedVersion,
        changes: UserChanges,
    ) -> Result<u64, StoreError> {
        let mut users = self.users.write().map_err(|_| StoreError::Poisoned)?;
        let record = users.entry(user.clone()).or_default();

        if !expected.matches(record.revision) {
            return Err(StoreError::Conflict {
                user: user.clone(),
                expected,
                actual: record.revision,
            });
        }

        if let Some(profile) = changes.profile {
            record.profile = Some(profile);
        }
        if let Some(jobs) = changes.jobs {
            record.jobs = Some(jobs);
        }
        record.revision += 1;

        Ok(record.revision)
    }
}
