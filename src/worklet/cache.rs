use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use boa_engine::JsObject;

use crate::runtime::{CompiledFunctionHandle, EnvId, Environment};

/// At most one materialized function per environment.
///
/// Entries are only added, until they are removed explicitly or drained when
/// the owning invoker is disposed. The lock is never held while a function
/// is being materialized.
#[derive(Debug, Default)]
pub struct CompiledFunctionCache {
    entries: Mutex<HashMap<EnvId, CompiledFunctionHandle>>,
}

/// A cache hit or a fresh materialization, resolved on the environment's
/// thread.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub function: JsObject,
    pub fallback: Option<String>,
    /// False when the function came from the cache.
    pub created: bool,
}

impl Resolved {
    fn from_handle(handle: &CompiledFunctionHandle, created: bool) -> Option<Self> {
        Some(Self {
            function: handle.function()?,
            fallback: handle.fallback_reason().map(str::to_owned),
            created,
        })
    }
}

impl CompiledFunctionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The function cached for `env`, creating it with `materialize` on a
    /// miss.
    ///
    /// Returns `None` only if the cached handle for `env` belongs to another
    /// thread, which means the environment id was reused across threads.
    pub fn get_or_create<F>(&self, env: &mut Environment, materialize: F) -> Option<Resolved>
    where
        F: FnOnce(&mut Environment) -> CompiledFunctionHandle,
    {
        let id = env.id();
        if let Some(handle) = self.lock().get(&id) {
            return Resolved::from_handle(handle, false);
        }

        let handle = materialize(env);
        let mut entries = self.lock();
        // A reentrant call during materialization may have filled the slot
        // first; keep that entry so the function stays stable.
        let handle = entries.entry(id).or_insert(handle);
        Resolved::from_handle(handle, true)
    }

    pub fn contains(&self, env: EnvId) -> bool {
        self.lock().contains_key(&env)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn remove(&self, env: EnvId) -> Option<CompiledFunctionHandle> {
        self.lock().remove(&env)
    }

    pub fn drain(&self) -> Vec<CompiledFunctionHandle> {
        self.lock().drain().map(|(_, handle)| handle).collect()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<EnvId, CompiledFunctionHandle>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
