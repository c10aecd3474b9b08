//! Per-user profile and job pool storage.
//!
//! One revision counter per user guards both records, which is what lets a command
//! handler and a completion timer mutate the same user without losing either write.

pub mod in_memory;
#[cfg(feature = "redis")]
pub mod redis_store;
pub mod r#trait;

pub use in_memory::InMemoryProfileStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisProfileStore;
pub use r#trait::{ProfileStore, SharedProfileStore, StoreError, UserChanges, UserSnapshot};
