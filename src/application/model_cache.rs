// SPDX-License-Identifier: MPL-2.0
//! Memoizing model loader with single-flight semantics.
//!
//! [`ModelCache::get_or_load`] guarantees at most one in-flight load per
//! [`ModelId`]. Callers arriving while a load is pending await the same
//! shared future and observe the same handle or the same error.
//!
//! Successful loads are kept until [`ModelCache::clear`]. Failures are not
//! kept: the next request starts a fresh load.
//!
//! The internal lock is never held across an `.await`.

use crate::application::port::{AIError, Backend, ModelHandle, ModelProvider};
use crate::domain::processing::{ModelId, ModelState};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type SharedLoad = Shared<BoxFuture<'static, Result<ModelHandle, AIError>>>;

struct PendingLoad {
    /// Distinguishes this load from a later one for the same id.
    ticket: u64,
    future: SharedLoad,
}

#[derive(Default)]
struct CacheState {
    ready: HashMap<ModelId, ModelHandle>,
    loading: HashMap<ModelId, PendingLoad>,
    failed: HashSet<ModelId>,
    next_ticket: u64,
}

/// Owns every loaded model of a worker.
pub struct ModelCache {
    provider: Arc<dyn ModelProvider>,
    state: Mutex<CacheState>,
}

impl std::fmt::Debug for ModelCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("ModelCache")
            .field("ready", &state.ready.keys().collect::<Vec<_>>())
            .field("loading", &state.loading.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl ModelCache {
    /// Creates an empty cache loading through `provider`.
    #[must_use]
    pub fn new(provider: Arc<dyn ModelProvider>) -> Self {
        Self {
            provider,
            state: Mutex::new(CacheState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Backend of the underlying provider.
    #[must_use]
    pub fn backend(&self) -> Backend {
        self.provider.backend()
    }

    /// Returns the ready handle for `id`, loading it if necessary.
    ///
    /// # Errors
    ///
    /// Returns the provider's error if the load fails. The failure is not
    /// memoized.
    pub async fn get_or_load(&self, id: ModelId) -> Result<ModelHandle, AIError> {
        let (ticket, future) = {
            let mut state = self.lock();
            if let Some(handle) = state.ready.get(&id) {
                tracing::debug!(model = %id, "model cache hit");
                return Ok(Arc::clone(handle));
            }
            if let Some(pending) = state.loading.get(&id) {
                tracing::debug!(model = %id, "joining in-flight model load");
                (pending.ticket, pending.future.clone())
            } else {
                let ticket = state.next_ticket;
                state.next_ticket += 1;
                tracing::info!(model = %id, "loading model");
                let future = self.provider.load(id).shared();
                state.failed.remove(&id);
                state.loading.insert(
                    id,
                    PendingLoad {
                        ticket,
                        future: future.clone(),
                    },
                );
                (ticket, future)
            }
        };

        let result = future.await;

        let mut state = self.lock();
        // Only the first waiter of this exact load settles it; a `clear`
        // in between drops the entry and the result is not memoized.
        if state
            .loading
            .get(&id)
            .is_some_and(|pending| pending.ticket == ticket)
        {
            state.loading.remove(&id);
            match &result {
                Ok(handle) => {
                    state.ready.insert(id, Arc::clone(handle));
                }
                Err(err) => {
                    tracing::warn!(model = %id, %err, "model load failed");
                    state.failed.insert(id);
                }
            }
        }
        result
    }

    /// Lifecycle state of `id`.
    #[must_use]
    pub fn state(&self, id: ModelId) -> ModelState {
        let state = self.lock();
        if state.ready.contains_key(&id) {
            ModelState::Ready
        } else if state.loading.contains_key(&id) {
            ModelState::Loading
        } else if state.failed.contains(&id) {
            ModelState::Failed
        } else {
            ModelState::Unloaded
        }
    }

    /// Number of memoized handles.
    #[must_use]
    pub fn ready_count(&self) -> usize {
        self.lock().ready.len()
    }

    /// Releases every ready model and forgets pending loads.
    ///
    /// Returns the number of released models. Safe to call on an empty cache.
    pub fn clear(&self) -> usize {
        let released: Vec<(ModelId, ModelHandle)> = {
            let mut state = self.lock();
            state.loading.clear();
            state.failed.clear();
            state.ready.drain().collect()
        };
        for (id, handle) in &released {
            tracing::debug!(model = %id, "releasing model");
            handle.release();
        }
        released.len()
    }
}
