//! Background workers for generation jobs and risk analyses.
//!
//! All spawned work goes through the [`TaskRegistry`] so that a given job or
//! analysis has at most one live worker at a time and can be aborted on
//! cancellation. Workers persist their outcome to the database; the registry
//! itself holds no state worth recovering.

pub mod generation;
pub mod risk;

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::task::AbortHandle;

/// Identity of one background task. Generation jobs and risk analyses have
/// independent id spaces, so the key carries the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKey {
    /// Keyed by generation job id.
    Generation(i64),
    /// Keyed by submission id.
    Risk(i64),
}

/// In-process registry of live background tasks.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    live: Arc<Mutex<HashMap<TaskKey, AbortHandle>>>,
}

impl TaskRegistry {
    /// Spawns `fut` as a registered task unless one is already live for
    /// `key`. Returns whether a new task was started. The entry is removed
    /// when the task finishes.
    pub fn spawn_guarded<F>(&self, key: TaskKey, fut: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut live = self.live.lock().expect("Task registry lock poisoned");
        if live.contains_key(&key) {
            return false;
        }

        let registry = self.clone();
        let handle = tokio::spawn(async move {
            fut.await;
            registry.remove(key);
        });
        live.insert(key, handle.abort_handle());
        true
    }

    /// Aborts the live task for `key`, if any. Returns whether one existed.
    pub fn abort(&self, key: TaskKey) -> bool {
        let mut live = self.live.lock().expect("Task registry lock poisoned");
        match live.remove(&key) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_live(&self, key: TaskKey) -> bool {
        self.live
            .lock()
            .expect("Task registry lock poisoned")
            .contains_key(&key)
    }

    fn remove(&self, key: TaskKey) {
        self.live
            .lock()
            .expect("Task registry lock poisoned")
            .remove(&key);
    }
}
