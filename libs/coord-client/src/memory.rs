//! Process-local coordination store.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;

use crate::{CoordClient, CoordError, DeleteOutcome, Revision, WriteOutcome};

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    mod_revision: Revision,
}

#[derive(Debug, Default)]
struct State {
    /// Store-wide counter; every mutation takes the next value.
    revision: i64,
    entries: BTreeMap<String, Entry>,
}

impl State {
    fn next_revision(&mut self) -> Revision {
        self.revision += 1;
        Revision::new(self.revision)
    }

    fn current(&self, path: &str) -> Revision {
        self.entries
            .get(path)
            .map_or(Revision::NONE, |e| e.mod_revision)
    }
}

/// In-memory store with the same conditional semantics as the etcd session.
///
/// Share it through an `Arc` to let several exporters race on it.
#[derive(Debug, Default)]
pub struct InMemoryCoordClient {
    state: Mutex<State>,
}

impl InMemoryCoordClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Value and mod revision stored at `path`, if any.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<(Vec<u8>, Revision)> {
        self.state
            .lock()
            .entries
            .get(path)
            .map(|e| (e.value.clone(), e.mod_revision))
    }

    /// All keys starting with `prefix`, in lexicographic order.
    #[must_use]
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.state
            .lock()
            .entries
            .range(prefix.to_owned()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Latest revision handed out by the store.
    #[must_use]
    pub fn revision(&self) -> Revision {
        Revision::new(self.state.lock().revision)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }
}

#[async_trait]
impl CoordClient for InMemoryCoordClient {
    async fn set(
        &self,
        path: &str,
        expected: Revision,
        value: &[u8],
    ) -> Result<WriteOutcome, CoordError> {
        let mut state = self.state.lock();
        if state.current(path) != expected {
            return Ok(WriteOutcome::Conflict);
        }

        let revision = state.next_revision();
        state.entries.insert(
            path.to_owned(),
            Entry {
                value: value.to_vec(),
                mod_revision: revision,
            },
        );
        Ok(WriteOutcome::Applied(revision))
    }

    async fn delete(&self, path: &str, expected: Revision) -> Result<DeleteOutcome, CoordError> {
        let mut state = self.state.lock();
        // Deleting an absent key at NONE would be a no-op, not a delete.
        if expected.is_none() || state.current(path) != expected {
            return Ok(DeleteOutcome::Conflict);
        }

        state.entries.remove(path);
        state.next_revision();
        Ok(DeleteOutcome::Deleted)
    }
}
