use crate::error::FetchError;
use crate::source::{FetchedWork, MetadataFetcher};
use async_trait::async_trait;
use citegraph_core::model::Identifier;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

struct ScriptedFailure {
    error: FetchError,
    /// `None` fails forever.
    remaining: Option<usize>,
}

#[derive(Default)]
struct MockState {
    catalog: HashMap<Identifier, FetchedWork>,
    failures: HashMap<Identifier, ScriptedFailure>,
    calls: Vec<Identifier>,
}

/// In-memory fetcher with scripted failures and a call log.
#[derive(Default)]
pub struct MockFetcher {
    state: Mutex<MockState>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, work: FetchedWork) {
        self.state()
            .catalog
            .insert(work.paper.identifier.clone(), work);
    }

    /// Fail the next `times` lookups of `id` with `error`.
    pub fn fail_times(&self, id: &Identifier, error: FetchError, times: usize) {
        self.state().failures.insert(
            id.clone(),
            ScriptedFailure {
                error,
                remaining: Some(times),
            },
        );
    }

    pub fn fail_always(&self, id: &Identifier, error: FetchError) {
        self.state().failures.insert(
            id.clone(),
            ScriptedFailure {
                error,
                remaining: None,
            },
        );
    }

    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    pub fn call_count(&self) -> usize {
        self.state().calls.len()
    }

    pub fn calls_for(&self, id: &Identifier) -> usize {
        self.state().calls.iter().filter(|call| *call == id).count()
    }

    pub fn calls(&self) -> Vec<Identifier> {
        self.state().calls.clone()
    }

    pub fn reset_calls(&self) {
        self.state().calls.clear();
    }
}

#[async_trait]
impl MetadataFetcher for MockFetcher {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch(&self, id: &Identifier) -> Result<FetchedWork, FetchError> {
        let mut state = self.state();
        state.calls.push(id.clone());

        if let Some(failure) = state.failures.get_mut(id) {
            match failure.remaining {
                None => return Err(failure.error.clone()),
                Some(0) => {}
                Some(ref mut left) => {
                    *left -= 1;
                    return Err(failure.error.clone());
                }
            }
        }

        state
            .catalog
            .get(id)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(id.clone()))
    }
}
