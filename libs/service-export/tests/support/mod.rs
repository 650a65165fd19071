#![allow(dead_code, clippy::unwrap_used)]

use async_trait::async_trait;
use coord_client::{
    CoordClient, CoordError, DeleteOutcome, InMemoryCoordClient, Revision, WriteOutcome,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

/// In-memory store with injectable failures and call accounting.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: InMemoryCoordClient,
    failing_sets: AtomicU32,
    failing_deletes: AtomicU32,
    deletes: AtomicU32,
    last_value: Mutex<Option<String>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` writes with a non-conflict error.
    pub fn fail_next_sets(&self, n: u32) {
        self.failing_sets.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` deletes with a non-conflict error.
    pub fn fail_next_deletes(&self, n: u32) {
        self.failing_deletes.store(n, Ordering::SeqCst);
    }

    /// Deletes that reached the backing store.
    pub fn delete_calls(&self) -> u32 {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Value of the most recent write attempt, failed or not.
    pub fn last_value(&self) -> Option<String> {
        self.last_value.lock().clone()
    }

    pub fn value(&self, path: &str) -> Option<String> {
        self.inner
            .get(path)
            .map(|(v, _)| String::from_utf8_lossy(&v).into_owned())
    }

    /// Occupy a slot as if another process had claimed it.
    pub async fn occupy(&self, path: &str, value: &str) {
        let outcome = self
            .inner
            .set(path, Revision::NONE, value.as_bytes())
            .await
            .unwrap();
        assert!(matches!(outcome, WriteOutcome::Applied(_)));
    }
}

fn take_failure(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl CoordClient for FlakyStore {
    async fn set(
        &self,
        path: &str,
        expected: Revision,
        value: &[u8],
    ) -> Result<WriteOutcome, CoordError> {
        *self.last_value.lock() = Some(String::from_utf8_lossy(value).into_owned());
        if take_failure(&self.failing_sets) {
            return Err(CoordError::Rejected("injected write failure".to_owned()));
        }
        self.inner.set(path, expected, value).await
    }

    async fn delete(&self, path: &str, expected: Revision) -> Result<DeleteOutcome, CoordError> {
        if take_failure(&self.failing_deletes) {
            return Err(CoordError::Rejected("injected delete failure".to_owned()));
        }
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(path, expected).await
    }
}
