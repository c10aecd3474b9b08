//! Redis-backed profile store.
//!
//! Records are JSON strings under `profile:<user>` and `jobs:<user>`; `rev:<user>` is an
//! integer counter. Every write that has to be atomic across keys runs as one Lua script,
//! so the revision check and the writes it guards cannot interleave with another client.

use std::sync::Arc;

use async_trait::async_trait;
use redis::FromRedisValue;
use redis::aio::MultiplexedConnection;
use tokio::sync::Mutex;

use dbtc_core::{ExpectedVersion, UserId};
use dbtc_game::{Job, Profile};

use super::r#trait::{ProfileStore, StoreError, UserChanges, UserSnapshot};

const PROFILE_PREFIX: &str = "profile:";
const JOBS_PREFIX: &str = "jobs:";
const REVISION_PREFIX: &str = "rev:";

const GET_OR_CREATE_SCRIPT: &str = r#"
local existing = redis.call("GET", KEYS[1])
if existing then
  return existing
end
redis.call("SET", KEYS[1], ARGV[1])
return ARGV[1]
"#;

const OVERWRITE_SCRIPT: &str = r#"
redis.call("SET", KEYS[1], ARGV[1])
return redis.call("INCR", KEYS[2])
"#;

// ARGV[1]: expected revision, or -1 for any.
// ARGV[2], ARGV[3]: profile / jobs payloads, empty string to leave the key alone.
const COMMIT_SCRIPT: &str = r#"
local current = tonumber(redis.call("GET", KEYS[3]) or "0")
local expected = tonumber(ARGV[1])
if expected >= 0 and current ~= expected then
  return {0, current}
end
if ARGV[2] ~= "" then
  redis.call("SET", KEYS[1], ARGV[2])
end
if ARGV[3] ~= "" then
  redis.call("SET", KEYS[2], ARGV[3])
end
return {1, redis.call("INCR", KEYS[3])}
"#;

fn profile_key(user: &UserId) -> String {
    format!("{PROFILE_PREFIX}{user}")
}

fn jobs_key(user: &UserId) -> String {
    format!("{JOBS_PREFIX}{user}")
}

fn revision_key(user: &UserId) -> String {
    format!("{REVISION_PREFIX}{user}")
}

/// Whether a command may be sent again when its outcome is unknown.
///
/// Reads and the create-if-absent script converge no matter how often they run. Writes
/// that advance the revision are sent once: a lost reply may still have been applied,
/// and the caller's next optimistic round trip is what resolves that.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Replay {
    Safe,
    Once,
}

impl Replay {
    fn max_attempts(self) -> u32 {
        match self {
            Replay::Safe => 2,
            Replay::Once => 1,
        }
    }
}

/// Profile store over a shared multiplexed Redis connection.
///
/// The connection is opened lazily and dropped after a failed command, so the next
/// command reconnects.
#[derive(Debug, Clone)]
pub struct RedisProfileStore {
    client: redis::Client,
    connection: Arc<Mutex<Option<MultiplexedConnection>>>,
}

impl RedisProfileStore {
    pub fn new(redis_url: impl AsRef<str>) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| StoreError::Backend(format!("invalid redis url: {e}")))?;
        Ok(Self {
            client,
            connection: Arc::new(Mutex::new(None)),
        })
    }

    /// A handle on the shared connection. The lock is held only to read or open it.
    async fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
        let mut guard = self.connection.lock().await;
        if let Some(connection) = guard.as_ref() {
            return Ok(connection.clone());
        }
        let connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::Backend(format!("failed to open redis connection: {e}")))?;
        tracing::debug!("profile store redis connection established");
        *guard = Some(connection.clone());
        Ok(connection)
    }

    async fn reset(&self) {
        *self.connection.lock().await = None;
    }

    async fn run_command<T, F>(
        &self,
        operation: &'static str,
        replay: Replay,
        build: F,
    ) -> Result<T, StoreError>
    where
        T: FromRedisValue + Send,
        F: Fn() -> redis::Cmd,
    {
        let max_attempts = replay.max_attempts();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut connection = self.connection().await?;
            let result: redis::RedisResult<T> = build().query_async(&mut connection).await;
            let error = match result {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            self.reset().await;
            if attempt >= max_attempts {
                tracing::warn!(
                    operation,
                    attempt,
                    error = %error,
                    "profile store redis command failed"
                );
                return Err(StoreError::Backend(format!("{operation}: {error}")));
            }
            tracing::warn!(
                operation,
                attempt,
                error = %error,
                "profile store redis command failed; reconnecting"
            );
        }
    }

    async fn overwrite(&self, key: String, payload: String, user: &UserId) -> Result<(), StoreError> {
        let rev_key = revision_key(user);
        let _: i64 = self
            .run_command("overwrite", Replay::Once, || {
                let mut cmd = redis::cmd("EVAL");
                cmd.arg(OVERWRITE_SCRIPT)
                    .arg(2)
                    .arg(&key)
                    .arg(&rev_key)
                    .arg(&payload);
                cmd
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for RedisProfileStore {
    async fn get(&self, user: &UserId) -> Result<Profile, StoreError> {
        let key = profile_key(user);
        let fresh = serde_json::to_string(&Profile::new(user.clone()))?;
        let raw: String = self
            .run_command("get_profile", Replay::Safe, || {
                let mut cmd = redis::cmd("EVAL");
                cmd.arg(GET_OR_CREATE_SCRIPT).arg(1).arg(&key).arg(&fresh);
                cmd
            })
            .await?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn put(&self, profile: &Profile) -> Result<(), StoreError> {
        let payload = serde_json::to_string(profile)?;
        self.overwrite(profile_key(&profile.id), payload, &profile.id)
            .await
    }

    async fn get_available(&self, user: &UserId) -> Result<Vec<Job>, StoreError> {
        let key = jobs_key(user);
        let raw: Option<String> = self
            .run_command("get_jobs", Replay::Safe, || {
                let mut cmd = redis::cmd("GET");
                cmd.arg(&key);
                cmd
            })
            .await?;
        match raw {
            Some(payload) => Ok(serde_json::from_str(&payload)?),
            None => Ok(Vec::new()),
        }
    }

    async fn set_available(&self, user: &UserId, jobs: &[Job]) -> Result<(), StoreError> {
        let payload = serde_json::to_string(jobs)?;
        self.overwrite(jobs_key(user), payload, user).await
    }

    async fn load(&self, user: &UserId) -> Result<UserSnapshot, StoreError> {
        let keys = [profile_key(user), jobs_key(user), revision_key(user)];
        let (profile, jobs, revision): (Option<String>, Option<String>, Option<u64>) = self
            .run_command("load", Replay::Safe, || {
                let mut cmd = redis::cmd("MGET");
                cmd.arg(&keys[..]);
                cmd
            })
            .await?;

        let profile = match profile {
            Some(payload) => serde_json::from_str(&payload)?,
            None => Profile::new(user.clone()),
        };
        let jobs = match jobs {
            Some(payload) => serde_json::from_str(&payload)?,
            None => Vec::new(),
        };

        Ok(UserSnapshot {
            profile,
            jobs,
            revision: revision.unwrap_or(0),
        })
    }

    async fn commit(
        &self,
        user: &UserId,
        expected: ExpectedVersion,
        changes: UserChanges,
    ) -> Result<u64, StoreError> {
        let expected_arg: i64 = match expected {
            ExpectedVersion::Any => -1,
            ExpectedVersion::Exact(v) => i64::try_from(v)
                .map_err(|_| StoreError::Backend(format!("revision {v} out of range")))?,
        };
        let profile = changes
            .profile
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?
            .unwrap_or_default();
        let jobs = changes
            .jobs
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?
            .unwrap_or_default();
        let keys = [profile_key(user), jobs_key(user), revision_key(user)];

        let (applied, revision): (i64, u64) = self
            .run_command("commit", Replay::Once, || {
                let mut cmd = redis::cmd("EVAL");
                cmd.arg(COMMIT_SCRIPT)
                    .arg(3)
                    .arg(&keys[..])
                    .arg(expected_arg)
                    .arg(&profile)
                    .arg(&jobs);
                cmd
            })
            .await?;

        if applied == 0 {
            return Err(StoreError::Conflict {
                user: user.clone(),
                expected,
                actual: revision,
            });
        }
        Ok(revision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_follow_the_documented_layout() {
        let user = UserId::new("123");
        assert_eq!(profile_key(&user), "profile:123");
        assert_eq!(jobs_key(&user), "jobs:123");
        assert_eq!(revision_key(&user), "rev:123");
    }

    #[test]
    fn rejects_invalid_url() {
        assert!(matches!(
            RedisProfileStore::new("not a url"),
            Err(StoreError::Backend(_))
        ));
    }

    #[test]
    fn opening_a_client_does_not_connect() {
        assert!(RedisProfileStore::new("redis://127.0.0.1:1/").is_ok());
    }

    #[test]
    fn revision_writes_are_never_replayed() {
        assert_eq!(Replay::Once.max_attempts(), 1);
        assert_eq!(Replay::Safe.max_attempts(), 2);
    }

    #[tokio::test]
    async fn unreachable_server_fails_without_caching_a_connection() {
        let store = RedisProfileStore::new("redis://127.0.0.1:1/").unwrap();
        let err = store
            .commit(&UserId::new("123"), ExpectedVersion::Any, UserChanges::none())
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Backend(_)));
        assert!(store.connection.lock().await.is_none());
    }
}
