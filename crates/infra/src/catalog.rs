//! Job offers per user: generation and pool storage.

use std::sync::Mutex;

use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;

use dbtc_core::{DomainResult, UserId};
use dbtc_game::{Job, JobGenerator, Profile};

use crate::dispatcher::{Decision, DispatchError, ProfileDispatcher};
use crate::store::{ProfileStore, StoreError, UserChanges};

/// A user's pool as returned by [`JobCatalog::ensure_available`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub jobs: Vec<Job>,
    /// The pool was empty and has just been regenerated.
    pub generated: bool,
}

/// Generates offers and keeps each user's pool.
///
/// Pools are regenerated wholesale, only when found empty or on explicit refresh.
#[derive(Debug)]
pub struct JobCatalog<S> {
    dispatcher: ProfileDispatcher<S>,
    generator: JobGenerator,
    rng: Mutex<StdRng>,
}

impl<S> JobCatalog<S>
where
    S: ProfileStore,
{
    pub fn new(dispatcher: ProfileDispatcher<S>, generator: JobGenerator) -> Self {
        Self {
            dispatcher,
            generator,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic titles and payouts, for tests.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn generator(&self) -> &JobGenerator {
        &self.generator
    }

    /// `count` fresh offers created now. Touches no storage.
    pub fn generate(&self, profile: &Profile, count: usize) -> DomainResult<Vec<Job>> {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        self.generator.generate(profile, count, Utc::now(), &mut *rng)
    }

    pub async fn get_available(&self, user: &UserId) -> Result<Vec<Job>, StoreError> {
        self.dispatcher.store().get_available(user).await
    }

    pub async fn set_available(&self, user: &UserId, jobs: &[Job]) -> Result<(), StoreError> {
        self.dispatcher.store().set_available(user, jobs).await
    }

    /// The user's pool, regenerating it first if it is empty.
    ///
    /// Also creates the user's profile on first contact.
    pub async fn ensure_available(&self, user: &UserId) -> Result<Listing, DispatchError> {
        self.dispatcher.store().get(user).await?;

        let pool_size = self.generator.config().pool_size;
        let listing = self
            .dispatcher
            .mutate(user, |snapshot| {
                if !snapshot.jobs.is_empty() {
                    return Ok(Decision::unchanged(Listing {
                        jobs: snapshot.jobs,
                        generated: false,
                    }));
                }
                let jobs = self.generate(&snapshot.profile, pool_size)?;
                Ok(Decision::write(
                    UserChanges::jobs(jobs.clone()),
                    Listing {
                        jobs,
                        generated: true,
                    },
                ))
            })
            .await?;

        if listing.generated {
            info!(%user, count = listing.jobs.len(), "job pool regenerated");
        }
        Ok(listing)
    }

    /// Replace the user's pool with fresh offers, whatever it holds now.
    pub async fn refresh(&self, user: &UserId) -> Result<Vec<Job>, DispatchError> {
        self.dispatcher.store().get(user).await?;

        let pool_size = self.generator.config().pool_size;
        let jobs = self
            .dispatcher
            .mutate(user, |snapshot| {
                let jobs = self.generate(&snapshot.profile, pool_size)?;
                Ok(Decision::write(UserChanges::jobs(jobs.clone()), jobs))
            })
            .await?;

        info!(%user, count = jobs.len(), "job pool refreshed");
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Duration;
    use dbtc_game::JobGenerationConfig;

    use crate::store::InMemoryProfileStore;

    fn test_user_id() -> UserId {
        UserId::new("U1")
    }

    fn catalog() -> (Arc<InMemoryProfileStore>, JobCatalog<Arc<InMemoryProfileStore>>) {
        let store = Arc::new(InMemoryProfileStore::new());
        let catalog = JobCatalog::new(ProfileDispatcher::new(store.clone()), JobGenerator::default())
            .with_seed(11);
        (store, catalog)
    }

    #[tokio::test]
    async fn empty_pool_is_generated_and_persisted() {
        let (store, catalog) = catalog();
        let user = test_user_id();

        let listing = catalog.ensure_available(&user).await.unwrap();

        assert!(listing.generated);
        assert_eq!(listing.jobs.len(), 10);
        assert_eq!(store.get_available(&user).await.unwrap(), listing.jobs);
    }

    #[tokio::test]
    async fn non_empty_pool_is_not_regenerated() {
        let (_store, catalog) = catalog();
        let user = test_user_id();

        let first = catalog.ensure_available(&user).await.unwrap();
        let second = catalog.ensure_available(&user).await.unwrap();

        assert!(!second.generated);
        assert_eq!(second.jobs, first.jobs);
    }

    #[tokio::test]
    async fn first_contact_creates_the_profile() {
        let (store, catalog) = catalog();
        let user = test_user_id();

        catalog.ensure_available(&user).await.unwrap();

        let snapshot = store.load(&user).await.unwrap();
        assert_eq!(snapshot.profile, Profile::new(user));
    }

    #[tokio::test]
    async fn refresh_replaces_the_whole_pool() {
        let (store, catalog) = catalog();
        let user = test_user_id();
        let before = catalog.ensure_available(&user).await.unwrap().jobs;

        let after = catalog.refresh(&user).await.unwrap();

        assert_eq!(after.len(), 10);
        assert!(after.iter().all(|j| before.iter().all(|b| b.id != j.id)));
        assert_eq!(store.get_available(&user).await.unwrap(), after);
    }

    #[tokio::test]
    async fn pool_size_follows_config() {
        let store = Arc::new(InMemoryProfileStore::new());
        let generator = JobGenerator::new(JobGenerationConfig {
            pool_size: 4,
            min_duration: Duration::hours(1),
            max_duration: Duration::hours(2),
            ..Default::default()
        })
        .unwrap();
        let catalog = JobCatalog::new(ProfileDispatcher::new(store), generator);

        let listing = catalog.ensure_available(&test_user_id()).await.unwrap();
        assert_eq!(listing.jobs.len(), 4);
    }

    #[tokio::test]
    async fn set_then_get_available() {
        let (_store, catalog) = catalog();
        let user = test_user_id();
        let jobs = catalog.generate(&Profile::new(user.clone()), 3).unwrap();

        catalog.set_available(&user, &jobs).await.unwrap();

        assert_eq!(catalog.get_available(&user).await.unwrap(), jobs);
    }
}
