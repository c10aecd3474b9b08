//! Game domain module.
//!
//! Profiles, job offers and the job lifecycle state machine, implemented purely as
//! deterministic domain logic (no IO, no async, no storage). Randomness is always
//! injected by the caller.

pub mod generator;
pub mod job;
pub mod lifecycle;
pub mod profile;
pub mod work;

pub use generator::{JobGenerationConfig, JobGenerator};
pub use job::{FlatRewards, Job, Reward, RewardScaling};
pub use lifecycle::{Acceptance, Completion, JobError, parse_job_index};
pub use profile::{Assignment, Inventory, Profile};
pub use work::WorkPolicy;
