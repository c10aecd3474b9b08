//! Revision expectations for optimistic concurrency.
//!
//! Every successful write of a user's records advances their revision by one; a
//! revision of `0` means nothing has been written yet.

/// Optimistic concurrency expectation for a write.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking (unconditional overwrite, last writer wins).
    Any,
    /// Require the record to be at an exact revision.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }
}
