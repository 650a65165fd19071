use async_trait::async_trait;

use crate::{CoordError, DeleteOutcome, Revision, WriteOutcome};

/// Session to a store that supports revision-checked writes.
///
/// Paths are hierarchical strings such as `/ns/service/echo/0`. Values are
/// opaque bytes.
#[async_trait]
pub trait CoordClient: Send + Sync {
    /// Write `value` at `path` if the key is currently at `expected`.
    ///
    /// Passing [`Revision::NONE`] requires the key to be absent.
    ///
    /// # Errors
    /// Returns [`CoordError`] for every failure other than a revision mismatch.
    async fn set(
        &self,
        path: &str,
        expected: Revision,
        value: &[u8],
    ) -> Result<WriteOutcome, CoordError>;

    /// Delete `path` if the key is currently at `expected`.
    ///
    /// # Errors
    /// Returns [`CoordError`] for every failure other than a revision mismatch.
    async fn delete(&self, path: &str, expected: Revision) -> Result<DeleteOutcome, CoordError>;
}
