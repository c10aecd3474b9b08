//! Process-wide tracing setup shared by the game binaries.

pub mod tracing;

pub use self::tracing::{LogFormat, init, init_with};
