//! `dbtc-core`: shared building blocks for the game crates.
//!
//! This crate contains **pure** primitives (no IO, no async).

pub mod error;
pub mod id;
pub mod version;

pub use error::{DomainError, DomainResult};
pub use id::{JobId, UserId};
pub use version::ExpectedVersion;
