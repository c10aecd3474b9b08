//! Infrastructure layer: profile storage, optimistic dispatch, job scheduling, Redis.

pub mod catalog;
pub mod dispatcher;
pub mod event_bus;
pub mod lifecycle;
pub mod store;

pub use catalog::{JobCatalog, Listing};
pub use dispatcher::{Decision, DispatchError, ProfileDispatcher};
pub use lifecycle::{
    CompletionNotice, CompletionRetry, CompletionSink, InMemoryCompletionSink, JobLifecycle,
    NoopCompletionSink, StartedJob,
};
pub use store::{
    InMemoryProfileStore, ProfileStore, SharedProfileStore, StoreError, UserChanges, UserSnapshot,
};
