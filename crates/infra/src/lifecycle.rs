//! Job acceptance and timed completion.
//!
//! Accepting a job commits the `Idle → Working` transition and spawns a completion
//! task. After the job's duration the task re-loads the user and commits
//! `Working → Idle` with the payout, through the same optimistic dispatcher as command
//! handlers use. Store failures are retried with backoff. A job whose task never ran
//! is completed by [`JobLifecycle::settle`] the next time the user shows up.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use dbtc_core::{JobId, UserId};
use dbtc_events::ReplyTarget;
use dbtc_game::{Acceptance, Completion, JobError, Reward, RewardScaling};

use crate::dispatcher::{Decision, DispatchError, ProfileDispatcher};
use crate::store::{ProfileStore, UserChanges};

/// A completion task that paid out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionNotice {
    pub user: UserId,
    pub completion: Completion,
    /// Where the job was accepted from, if known.
    pub target: Option<ReplyTarget>,
}

/// Receives completion notices (e.g. to tell the user in chat).
#[async_trait]
pub trait CompletionSink: Send + Sync + 'static {
    async fn job_completed(&self, notice: CompletionNotice);
}

/// Discards notices.
#[derive(Debug, Default, Copy, Clone)]
pub struct NoopCompletionSink;

#[async_trait]
impl CompletionSink for NoopCompletionSink {
    async fn job_completed(&self, _notice: CompletionNotice) {}
}

/// In-memory sink for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryCompletionSink {
    inner: Mutex<Vec<CompletionNotice>>,
}

impl InMemoryCompletionSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<CompletionNotice> {
        self.inner
            .lock()
            .map(|notices| notices.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CompletionSink for InMemoryCompletionSink {
    async fn job_completed(&self, notice: CompletionNotice) {
        if let Ok(mut notices) = self.inner.lock() {
            notices.push(notice);
        }
    }
}

/// An accepted job and its running completion task.
#[derive(Debug)]
pub struct StartedJob {
    pub acceptance: Acceptance,
    pub completion: JoinHandle<()>,
}

/// Backoff between attempts of a completion that failed on a store error.
///
/// Completions are retried until they commit or turn out to be stale; there is no
/// attempt limit, since giving up would leave the user working forever.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CompletionRetry {
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for CompletionRetry {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(300),
        }
    }
}

impl CompletionRetry {
    /// Exponential backoff for a 1-indexed attempt, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Drives the `Idle → Working → Idle` cycle.
pub struct JobLifecycle<S> {
    dispatcher: ProfileDispatcher<S>,
    scaling: Arc<dyn RewardScaling>,
    sink: Arc<dyn CompletionSink>,
    retry: CompletionRetry,
}

impl<S> std::fmt::Debug for JobLifecycle<S>
where
    S: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobLifecycle")
            .field("dispatcher", &self.dispatcher)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl<S> JobLifecycle<S>
where
    S: ProfileStore + Clone + 'static,
{
    pub fn new(
        dispatcher: ProfileDispatcher<S>,
        scaling: Arc<dyn RewardScaling>,
        sink: Arc<dyn CompletionSink>,
    ) -> Self {
        Self {
            dispatcher,
            scaling,
            sink,
            retry: CompletionRetry::default(),
        }
    }

    pub fn with_retry(mut self, retry: CompletionRetry) -> Self {
        self.retry = retry;
        self
    }

    /// `Idle --accept(index)--> Working`, then schedule completion.
    ///
    /// Profile and pool are committed together; the timer is only started once that
    /// commit has landed. Rejections (already working, index out of range) write nothing.
    pub async fn accept(
        &self,
        user: &UserId,
        index: usize,
        target: Option<ReplyTarget>,
    ) -> Result<StartedJob, DispatchError> {
        let scaling = self.scaling.clone();
        let now = Utc::now();
        let acceptance = self
            .dispatcher
            .mutate(user, |mut snapshot| {
                let acceptance = snapshot.profile.accept_offer(
                    &mut snapshot.jobs,
                    index,
                    scaling.as_ref(),
                    now,
                )?;
                Ok(Decision::write(
                    UserChanges::both(snapshot.profile, snapshot.jobs),
                    acceptance,
                ))
            })
            .await?;

        info!(
            %user,
            job_id = %acceptance.job.id,
            job = %acceptance.job.name,
            payout = acceptance.reward.payout,
            seconds = acceptance.reward.delay().as_secs(),
            "job started"
        );

        let completion = self.schedule(user.clone(), acceptance.job.id, acceptance.reward, target);
        Ok(StartedJob {
            acceptance,
            completion,
        })
    }

    /// `Working --complete(job_id)--> Idle`: pay and clear, if `job_id` is still active.
    pub async fn complete(
        &self,
        user: &UserId,
        job_id: JobId,
        payout: i64,
    ) -> Result<Completion, DispatchError> {
        complete_job(&self.dispatcher, user, job_id, payout).await
    }

    /// Complete the user's active job if it is already overdue.
    ///
    /// Covers jobs whose timer never fired, e.g. because the process restarted.
    pub async fn settle(
        &self,
        user: &UserId,
        target: Option<ReplyTarget>,
    ) -> Result<Option<Completion>, DispatchError> {
        self.settle_at(user, Utc::now(), target).await
    }

    pub async fn settle_at(
        &self,
        user: &UserId,
        now: DateTime<Utc>,
        target: Option<ReplyTarget>,
    ) -> Result<Option<Completion>, DispatchError> {
        let completion = self
            .dispatcher
            .mutate(user, |mut snapshot| {
                let Some((job_id, payout)) = snapshot.profile.overdue_job(now) else {
                    return Ok(Decision::unchanged(None));
                };
                let completion = snapshot.profile.complete_job(job_id, payout)?;
                Ok(Decision::write(
                    UserChanges::profile(snapshot.profile),
                    Some(completion),
                ))
            })
            .await?;

        if let Some(completion) = &completion {
            info!(%user, job_id = %completion.job.id, "overdue job settled");
            notify(self.sink.as_ref(), user.clone(), completion.clone(), target).await;
        }
        Ok(completion)
    }

    fn schedule(
        &self,
        user: UserId,
        job_id: JobId,
        reward: Reward,
        target: Option<ReplyTarget>,
    ) -> JoinHandle<()> {
        let dispatcher = self.dispatcher.clone();
        let sink = self.sink.clone();
        let retry = self.retry;

        tokio::spawn(async move {
            tokio::time::sleep(reward.delay()).await;

            let mut attempt = 0;
            loop {
                attempt += 1;
                match complete_job(&dispatcher, &user, job_id, reward.payout).await {
                    Ok(completion) => {
                        notify(sink.as_ref(), user, completion, target).await;
                        return;
                    }
                    Err(DispatchError::Rejected(
                        err @ (JobError::NotWorking | JobError::JobMismatch { .. }),
                    )) => {
                        info!(%user, %job_id, reason = %err, "completion skipped");
                        return;
                    }
                    Err(err) if err.is_transient() => {
                        let delay = retry.delay_for_attempt(attempt);
                        warn!(
                            %user,
                            %job_id,
                            attempt,
                            retry_in_ms = delay.as_millis() as u64,
                            error = %err,
                            "completion failed; retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    Err(err) => {
                        error!(%user, %job_id, error = %err, "completion abandoned");
                        return;
                    }
                }
            }
        })
    }
}

async fn notify(
    sink: &dyn CompletionSink,
    user: UserId,
    completion: Completion,
    target: Option<ReplyTarget>,
) {
    info!(
        %user,
        job_id = %completion.job.id,
        payout = completion.payout,
        balance = completion.balance,
        "job completed"
    );
    sink.job_completed(CompletionNotice {
        user,
        completion,
        target,
    })
    .await;
}

async fn complete_job<S>(
    dispatcher: &ProfileDispatcher<S>,
    user: &UserId,
    job_id: JobId,
    payout: i64,
) -> Result<Completion, DispatchError>
where
    S: ProfileStore,
{
    dispatcher
        .mutate(user, |mut snapshot| {
            let completion = snapshot.profile.complete_job(job_id, payout)?;
            Ok(Decision::write(UserChanges::profile(snapshot.profile), completion))
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use dbtc_core::ExpectedVersion;
    use dbtc_game::{FlatRewards, JobGenerator, Profile};

    use crate::catalog::JobCatalog;
    use crate::store::{InMemoryProfileStore, StoreError, UserSnapshot};

    fn test_user_id() -> UserId {
        UserId::new("U1")
    }

    struct Harness {
        store: Arc<InMemoryProfileStore>,
        catalog: JobCatalog<Arc<InMemoryProfileStore>>,
        lifecycle: JobLifecycle<Arc<InMemoryProfileStore>>,
        sink: Arc<InMemoryCompletionSink>,
    }

    fn harness() -> Harness {
        let store = Arc::new(InMemoryProfileStore::new());
        let dispatcher = ProfileDispatcher::new(store.clone());
        let sink = Arc::new(InMemoryCompletionSink::new());
        Harness {
            store: store.clone(),
            catalog: JobCatalog::new(dispatcher.clone(), JobGenerator::default()).with_seed(5),
            lifecycle: JobLifecycle::new(dispatcher, Arc::new(FlatRewards), sink.clone()),
            sink,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn accept_then_timer_pays_and_clears() {
        let h = harness();
        let user = test_user_id();
        let pool = h.catalog.ensure_available(&user).await.unwrap().jobs;
        let offer = pool[0].clone();

        let started = h.lifecycle.accept(&user, 0, None).await.unwrap();

        let snapshot = h.store.load(&user).await.unwrap();
        assert_eq!(snapshot.profile.active_job.as_ref(), Some(&offer));
        assert_eq!(snapshot.jobs.len(), 9);
        assert!(snapshot.jobs.iter().all(|j| j.id != offer.id));

        // Not yet.
        tokio::time::sleep(offer.duration().to_std().unwrap() - Duration::from_secs(1)).await;
        assert_eq!(h.store.get(&user).await.unwrap().balance, 0);

        started.completion.await.unwrap();

        let profile = h.store.get(&user).await.unwrap();
        assert_eq!(profile.balance, offer.payout);
        assert!(profile.active_job.is_none());

        let notices = h.sink.all();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].completion.job.id, offer.id);
    }

    #[tokio::test(start_paused = true)]
    async fn cannot_accept_while_working() {
        let h = harness();
        let user = test_user_id();
        h.catalog.ensure_available(&user).await.unwrap();
        h.lifecycle.accept(&user, 0, None).await.unwrap();
        let before = h.store.load(&user).await.unwrap();

        let err = h.lifecycle.accept(&user, 0, None).await.unwrap_err();

        assert!(matches!(err, DispatchError::Rejected(JobError::AlreadyWorking { .. })));
        let after = h.store.load(&user).await.unwrap();
        assert_eq!(after, before);
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_range_changes_nothing() {
        let h = harness();
        let user = test_user_id();
        h.catalog.ensure_available(&user).await.unwrap();
        let before = h.store.load(&user).await.unwrap();

        let err = h.lifecycle.accept(&user, 10, None).await.unwrap_err();

        assert!(matches!(
            err,
            DispatchError::Rejected(JobError::OutOfRange { index: 10, available: 10 })
        ));
        assert_eq!(h.store.load(&user).await.unwrap(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_pool_rejects_any_index() {
        let h = harness();
        let err = h.lifecycle.accept(&test_user_id(), 0, None).await.unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Rejected(JobError::OutOfRange { available: 0, .. })
        ));
    }

    #[tokio::test]
    async fn completion_is_idempotent() {
        let h = harness();
        let user = test_user_id();
        h.catalog.ensure_available(&user).await.unwrap();
        let snapshot = h.store.load(&user).await.unwrap();
        let mut profile = snapshot.profile.clone();
        let mut jobs = snapshot.jobs.clone();
        let accepted = profile.accept_offer(&mut jobs, 2, &FlatRewards, Utc::now()).unwrap();
        h.store.put(&profile).await.unwrap();

        h.lifecycle.complete(&user, accepted.job.id, 70).await.unwrap();
        let err = h.lifecycle.complete(&user, accepted.job.id, 70).await.unwrap_err();

        assert!(matches!(err, DispatchError::Rejected(JobError::NotWorking)));
        assert_eq!(h.store.get(&user).await.unwrap().balance, 70);
    }

    /// A new `start` racing the completion of the previous job: both writes land.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn start_racing_completion_loses_nothing() {
        for _ in 0..25 {
            let h = harness();
            let user = test_user_id();

            // Previous job, already due.
            let mut previous = h.catalog.generate(&Profile::new(user.clone()), 1).unwrap().remove(0);
            previous.expires_at = previous.created_at;
            let mut profile = h.store.get(&user).await.unwrap();
            profile.balance = 5;
            profile.active_job = Some(previous.clone());
            h.store.put(&profile).await.unwrap();
            let pool = h.catalog.ensure_available(&user).await.unwrap().jobs;

            let completion = {
                let lifecycle = &h.lifecycle;
                let user = user.clone();
                async move { lifecycle.complete(&user, previous.id, previous.payout).await }
            };
            let start = h.lifecycle.accept(&user, 0, None);
            let (completed, started) = tokio::join!(completion, start);
            let completed = completed.unwrap();

            let snapshot = h.store.load(&user).await.unwrap();
            assert_eq!(snapshot.profile.balance, 5 + completed.payout);
            match started {
                // Start saw the completed state.
                Ok(started) => {
                    assert_eq!(snapshot.profile.active_job.as_ref(), Some(&pool[0]));
                    assert_eq!(snapshot.jobs.len(), 9);
                    started.completion.abort();
                }
                // Start saw the previous job still active and was rejected.
                Err(err) => {
                    assert!(matches!(err, DispatchError::Rejected(JobError::AlreadyWorking { .. })));
                    assert!(snapshot.profile.active_job.is_none());
                    assert_eq!(snapshot.jobs, pool);
                }
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stale_timer_after_manual_completion_is_skipped() {
        let h = harness();
        let user = test_user_id();
        h.catalog.ensure_available(&user).await.unwrap();
        let started = h.lifecycle.accept(&user, 1, None).await.unwrap();
        let job = started.acceptance.job.clone();

        h.lifecycle.complete(&user, job.id, job.payout).await.unwrap();
        started.completion.await.unwrap();

        assert_eq!(h.store.get(&user).await.unwrap().balance, job.payout);
        assert!(h.sink.all().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn completion_notice_carries_the_reply_target() {
        let h = harness();
        let user = test_user_id();
        h.catalog.ensure_available(&user).await.unwrap();
        let target = ReplyTarget {
            channel_id: "c-1".to_string(),
            thread_id: None,
            message_id: "m-1".to_string(),
        };

        let started = h.lifecycle.accept(&user, 0, Some(target.clone())).await.unwrap();
        started.completion.await.unwrap();

        assert_eq!(h.sink.all()[0].target.as_ref(), Some(&target));
    }

    #[test]
    fn completion_backoff_doubles_up_to_the_cap() {
        let retry = CompletionRetry {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        };
        assert_eq!(retry.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(retry.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(retry.delay_for_attempt(4), Duration::from_secs(8));
        assert_eq!(retry.delay_for_attempt(5), Duration::from_secs(10));
        assert_eq!(retry.delay_for_attempt(u32::MAX), Duration::from_secs(10));
    }

    /// In-memory store whose next `commit`s fail with a backend error when armed.
    #[derive(Debug, Default)]
    struct FlakyStore {
        inner: InMemoryProfileStore,
        failing_commits: AtomicU32,
    }

    impl FlakyStore {
        fn fail_next_commits(&self, count: u32) {
            self.failing_commits.store(count, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl ProfileStore for FlakyStore {
        async fn get(&self, user: &UserId) -> Result<Profile, StoreError> {
            self.inner.get(user).await
        }

        async fn put(&self, profile: &Profile) -> Result<(), StoreError> {
            self.inner.put(profile).await
        }

        async fn get_available(&self, user: &UserId) -> Result<Vec<dbtc_game::Job>, StoreError> {
            self.inner.get_available(user).await
        }

        async fn set_available(
            &self,
            user: &UserId,
            jobs: &[dbtc_game::Job],
        ) -> Result<(), StoreError> {
            self.inner.set_available(user, jobs).await
        }

        async fn load(&self, user: &UserId) -> Result<UserSnapshot, StoreError> {
            self.inner.load(user).await
        }

        async fn commit(
            &self,
            user: &UserId,
            expected: ExpectedVersion,
            changes: UserChanges,
        ) -> Result<u64, StoreError> {
            let armed = self
                .failing_commits
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if armed {
                return Err(StoreError::Backend("connection reset".to_string()));
            }
            self.inner.commit(user, expected, changes).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn completion_retries_after_a_store_failure() {
        let store = Arc::new(FlakyStore::default());
        let dispatcher = ProfileDispatcher::new(store.clone());
        let sink = Arc::new(InMemoryCompletionSink::new());
        let catalog = JobCatalog::new(dispatcher.clone(), JobGenerator::default()).with_seed(5);
        let lifecycle = JobLifecycle::new(dispatcher, Arc::new(FlatRewards), sink.clone())
            .with_retry(CompletionRetry {
                base_delay: Duration::from_millis(10),
                max_delay: Duration::from_secs(1),
            });
        let user = test_user_id();
        catalog.ensure_available(&user).await.unwrap();

        let started = lifecycle.accept(&user, 0, None).await.unwrap();
        let job = started.acceptance.job.clone();
        store.fail_next_commits(2);
        started.completion.await.unwrap();

        let profile = store.get(&user).await.unwrap();
        assert_eq!(profile.balance, job.payout);
        assert!(!profile.is_working());
        assert!(profile.assignment.is_none());
        assert_eq!(sink.all().len(), 1);

        // Idle again: the next accept goes through.
        lifecycle.accept(&user, 0, None).await.unwrap().completion.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn overdue_job_without_a_timer_is_settled() {
        let h = harness();
        let user = test_user_id();
        h.catalog.ensure_available(&user).await.unwrap();
        let started = h.lifecycle.accept(&user, 0, None).await.unwrap();
        // Timer lost, as after a restart.
        started.completion.abort();
        let job = started.acceptance.job.clone();

        let early = h.lifecycle.settle_at(&user, Utc::now(), None).await.unwrap();
        assert!(early.is_none());
        assert!(h.store.get(&user).await.unwrap().is_working());

        let later = Utc::now() + job.duration() + chrono::Duration::seconds(1);
        let settled = h.lifecycle.settle_at(&user, later, None).await.unwrap().unwrap();

        assert_eq!(settled.job.id, job.id);
        let profile = h.store.get(&user).await.unwrap();
        assert_eq!(profile.balance, job.payout);
        assert!(!profile.is_working());
        assert_eq!(h.sink.all().len(), 1);

        // Nothing left to settle.
        assert!(h.lifecycle.settle_at(&user, later, None).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn timer_after_settle_is_skipped() {
        let h = harness();
        let user = test_user_id();
        h.catalog.ensure_available(&user).await.unwrap();
        let started = h.lifecycle.accept(&user, 0, None).await.unwrap();
        let job = started.acceptance.job.clone();

        let later = Utc::now() + job.duration() + chrono::Duration::seconds(1);
        h.lifecycle.settle_at(&user, later, None).await.unwrap();
        started.completion.await.unwrap();

        assert_eq!(h.store.get(&user).await.unwrap().balance, job.payout);
        assert_eq!(h.sink.all().len(), 1);
    }
}
