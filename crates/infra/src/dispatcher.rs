//! Optimistic read-decide-commit pipeline for per-user state.
//!
//! ## Execution Flow
//!
//! ```text
//! mutate(user, decide)
//!   ↓
//! 1. Load snapshot (profile + pool + revision)
//!   ↓
//! 2. decide(snapshot) → changes + output (pure, no IO)
//!   ↓
//! 3. Commit changes expecting the loaded revision
//!   ↓
//! 4. On revision conflict: reload and decide again (bounded)
//! ```
//!
//! Command handlers and completion timers both go through here, so two writers racing on
//! the same user both land: the loser of the compare-and-set re-decides against the
//! winner's state instead of overwriting it.

use dbtc_core::{DomainError, ExpectedVersion, UserId};
use dbtc_game::JobError;
use tracing::debug;

use crate::store::{ProfileStore, StoreError, UserChanges, UserSnapshot};

/// Default number of commit attempts before giving up on a contended user.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 8;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Every attempt lost the revision race.
    #[error("gave up after repeated revision conflicts: {0}")]
    Concurrency(String),

    /// The game rules rejected the mutation.
    #[error(transparent)]
    Rejected(#[from] JobError),

    /// A pure rule failed outside the player's control (e.g. generating offers).
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(StoreError),
}

impl DispatchError {
    /// Worth trying again later: the store failed or the user was too contended.
    pub fn is_transient(&self) -> bool {
        matches!(self, DispatchError::Concurrency(_) | DispatchError::Store(_))
    }
}

impl From<StoreError> for DispatchError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict { .. } => DispatchError::Concurrency(value.to_string()),
            other => DispatchError::Store(other),
        }
    }
}

/// What a decision wants written, plus what it hands back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision<T> {
    pub changes: UserChanges,
    pub output: T,
}

impl<T> Decision<T> {
    pub fn write(changes: UserChanges, output: T) -> Self {
        Self { changes, output }
    }

    /// Nothing to persist.
    pub fn unchanged(output: T) -> Self {
        Self {
            changes: UserChanges::none(),
            output,
        }
    }
}

/// Runs mutations of one user's state under optimistic concurrency.
#[derive(Debug, Clone)]
pub struct ProfileDispatcher<S> {
    store: S,
    max_attempts: u32,
}

impl<S> ProfileDispatcher<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S> ProfileDispatcher<S>
where
    S: ProfileStore,
{
    /// Load, decide, commit; retry the whole cycle on a revision conflict.
    ///
    /// `decide` may run more than once and must be free of side effects other than
    /// building its `Decision`. A rejection from `decide` ends the mutation immediately.
    pub async fn mutate<T, F>(&self, user: &UserId, mut decide: F) -> Result<T, DispatchError>
    where
        T: Send,
        F: FnMut(UserSnapshot) -> Result<Decision<T>, DispatchError> + Send,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;

            // 1) Load
            let snapshot = self.store.load(user).await?;
            let expected = ExpectedVersion::Exact(snapshot.revision);

            // 2) Decide
            let Decision { changes, output } = decide(snapshot)?;
            if changes.is_empty() {
                return Ok(output);
            }

            // 3) Commit against the loaded revision
            match self.store.commit(user, expected, changes).await {
                Ok(revision) => {
                    debug!(%user, revision, attempt, "user state committed");
                    return Ok(output);
                }
                Err(StoreError::Conflict { actual, .. }) if attempt < self.max_attempts => {
                    debug!(%user, attempt, ?expected, actual, "revision conflict; retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}
