// Copyright 2024-2026 couponlm Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-process registry of loaded sessions, keyed by model name.
//!
//! Concurrent loads of one name collapse into a single load: the first caller
//! spawns it, later callers await the same shared future. The spawned task
//! updates the registry before any caller observes the result.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;

use super::loader::LoadError;
use crate::engine::InferenceSession;
use crate::telemetry;

type SessionResult = Result<Arc<dyn InferenceSession>, LoadError>;
type PendingLoad = Shared<BoxFuture<'static, SessionResult>>;

enum Slot {
    Loading { id: u64, load: PendingLoad },
    Ready(Arc<dyn InferenceSession>),
}

enum Lookup {
    Hit(Arc<dyn InferenceSession>),
    Pending(PendingLoad),
}

/// Thread-safe `name → session` registry.
pub struct ModelCache {
    slots: Arc<Mutex<HashMap<String, Slot>>>,
    next_load_id: AtomicU64,
}

impl ModelCache {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            next_load_id: AtomicU64::new(1),
        }
    }

    /// Return the cached session for `name`, or run `load` exactly once to
    /// create it.
    ///
    /// `load` is only invoked when neither a ready session nor an in-flight
    /// load exists. A failed load leaves no trace; the next call retries.
    pub async fn get_or_load<F, Fut>(&self, name: &str, load: F) -> SessionResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SessionResult> + Send + 'static,
    {
        let lookup = {
            let mut slots = self.slots.lock();
            match slots.get(name) {
                Some(Slot::Ready(session)) if !session.is_released() => {
                    Lookup::Hit(Arc::clone(session))
                }
                Some(Slot::Loading { load, .. }) => Lookup::Pending(load.clone()),
                _ => {
                    let id = self.next_load_id.fetch_add(1, Ordering::Relaxed);
                    let pending = self.spawn_load(name.to_string(), id, load());
                    slots.insert(name.to_string(), Slot::Loading { id, load: pending.clone() });
                    Lookup::Pending(pending)
                }
            }
        };

        match lookup {
            Lookup::Hit(session) => {
                tracing::debug!(model = %name, "model cache hit");
                telemetry::record_cache_hit(name);
                Ok(session)
            }
            Lookup::Pending(pending) => pending.await,
        }
    }

    fn spawn_load<Fut>(&self, name: String, id: u64, load: Fut) -> PendingLoad
    where
        Fut: Future<Output = SessionResult> + Send + 'static,
    {
        let slots = Arc::clone(&self.slots);
        let task = tokio::spawn(async move {
            let result = load.await;
            let mut slots = slots.lock();
            let still_owned =
                matches!(slots.get(&name), Some(Slot::Loading { id: current, .. }) if *current == id);

            match result {
                Ok(session) if still_owned => {
                    slots.insert(name, Slot::Ready(Arc::clone(&session)));
                    Ok(session)
                }
                Ok(session) => {
                    tracing::debug!(model = %name, "model unloaded while loading, releasing session");
                    session.release();
                    Err(LoadError::Cancelled(name))
                }
                Err(e) => {
                    if still_owned {
                        slots.remove(&name);
                    }
                    Err(e)
                }
            }
        });

        async move {
            task.await
                .unwrap_or_else(|e| Err(LoadError::ModelCreation(format!("load task failed: {}", e))))
        }
        .boxed()
        .shared()
    }

    /// The ready session for `name`, if any. Never starts a load.
    pub fn get(&self, name: &str) -> Option<Arc<dyn InferenceSession>> {
        match self.slots.lock().get(name) {
            Some(Slot::Ready(session)) if !session.is_released() => Some(Arc::clone(session)),
            _ => None,
        }
    }

    /// True if a ready session is cached under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// True while a load for `name` is in flight.
    pub fn is_loading(&self, name: &str) -> bool {
        matches!(self.slots.lock().get(name), Some(Slot::Loading { .. }))
    }

    /// Release and forget `name`. Returns false if nothing was there.
    ///
    /// An in-flight load is detached: its callers still get a result but the
    /// session is released instead of cached.
    pub fn unload(&self, name: &str) -> bool {
        let removed = self.slots.lock().remove(name);
        match removed {
            Some(Slot::Ready(session)) => {
                session.release();
                tracing::info!(model = %name, "model unloaded");
                true
            }
            Some(Slot::Loading { .. }) => {
                tracing::info!(model = %name, "pending model load detached");
                true
            }
            None => false,
        }
    }

    /// Release every cached session and detach every pending load.
    pub fn unload_all(&self) {
        let drained: Vec<(String, Slot)> = self.slots.lock().drain().collect();
        let count = drained.len();
        for (_, slot) in drained {
            if let Slot::Ready(session) = slot {
                session.release();
            }
        }
        if count > 0 {
            tracing::info!(count, "all models unloaded");
        }
    }

    /// Number of ready sessions.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(s) if !s.is_released()))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of ready sessions, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .slots
            .lock()
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Ready(s) if !s.is_released()))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

impl Default for ModelCache {
    fn default() -> Self {
        Self::new()
    }
}
