use std::{
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

use boa_engine::{Context, JsValue};

use crate::{
    context::ExecutionContext,
    error::WorkletError,
    marshal,
    runtime::{CompiledFunctionHandle, EnvId, Environment},
    worklet::{
        WorkletDescriptor,
        cache::{CompiledFunctionCache, Resolved},
        invoke::invoke,
        materialize::materialize,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokerState {
    NotMaterialized,
    Materialized,
    Disposed,
}

/// Callable handle for one worklet, usable from any environment.
///
/// The first call in an environment evaluates the worklet's source there;
/// later calls in the same environment reuse that function. Environments
/// never share a materialized function.
///
/// [`WorkletInvoker::call`] never fails: errors are logged and yield
/// `undefined`. [`WorkletInvoker::try_call`] reports them instead.
pub struct WorkletInvoker {
    descriptor: WorkletDescriptor,
    cache: CompiledFunctionCache,
    disposed: AtomicBool,
    materializations: AtomicUsize,
}

impl WorkletInvoker {
    pub fn new(descriptor: WorkletDescriptor) -> Self {
        Self {
            descriptor,
            cache: CompiledFunctionCache::new(),
            disposed: AtomicBool::new(false),
            materializations: AtomicUsize::new(0),
        }
    }

    /// Parses `value` as a decorated function; a function without worklet
    /// metadata is [`WorkletError::NotAWorklet`].
    pub fn from_value(context: &mut Context, value: &JsValue) -> Result<Self, WorkletError> {
        WorkletDescriptor::from_value(context, value)?
            .map(Self::new)
            .ok_or(WorkletError::NotAWorklet)
    }

    pub fn descriptor(&self) -> &WorkletDescriptor {
        &self.descriptor
    }

    pub fn state(&self) -> InvokerState {
        if self.disposed.load(Ordering::Acquire) {
            InvokerState::Disposed
        } else if self.cache.is_empty() {
            InvokerState::NotMaterialized
        } else {
            InvokerState::Materialized
        }
    }

    /// How many times the source has been evaluated, across all environments.
    pub fn materializations(&self) -> usize {
        self.materializations.load(Ordering::Relaxed)
    }

    pub fn is_materialized_in(&self, env: EnvId) -> bool {
        self.cache.contains(env)
    }

    /// Invokes the worklet in `env`, returning `undefined` on any failure.
    pub fn call(&self, env: &mut Environment, this: &JsValue, args: &[JsValue]) -> JsValue {
        match self.try_call(env, this, args) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(
                    location = %self.descriptor.location(),
                    env = %env.id(),
                    error = %err,
                    "worklet call failed; returning undefined"
                );
                JsValue::undefined()
            }
        }
    }

    pub fn try_call(
        &self,
        env: &mut Environment,
        this: &JsValue,
        args: &[JsValue],
    ) -> Result<JsValue, WorkletError> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(WorkletError::Disposed);
        }
        let resolved = self.resolve(env)?;
        if let Some(reason) = resolved.fallback {
            return Err(self.materialization_error(reason));
        }

        tracing::trace!(location = %self.descriptor.location(), env = %env.id(), "invoking worklet");
        let context = env.context_mut();
        let closure = match self.descriptor.closure() {
            Some(snapshot) => marshal::unwrap(snapshot, context),
            None => JsValue::undefined(),
        };
        let encoding = self.descriptor.encoding();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            invoke(context, &resolved.function, encoding, &closure, this, args)
        }));
        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(self.invocation_error(err.to_string())),
            Err(_) => Err(self.invocation_error(String::from("worklet invocation panicked"))),
        }
    }

    fn resolve(&self, env: &mut Environment) -> Result<Resolved, WorkletError> {
        let resolved = self.cache.get_or_create(env, |env| {
            self.materializations.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                location = %self.descriptor.location(),
                env = %env.id(),
                "materializing worklet"
            );
            let owner = ExecutionContext::current_for(env);
            let materialized = materialize(env.context_mut(), &self.descriptor);
            CompiledFunctionHandle::new(
                materialized.function,
                env.id(),
                owner,
                materialized.fallback,
            )
        });
        let resolved = resolved.ok_or_else(|| {
            self.materialization_error(String::from(
                "cached function belongs to another thread",
            ))
        })?;
        // A concurrent `dispose` may have drained the cache while this
        // entry was being materialized.
        if self.disposed.load(Ordering::Acquire) {
            self.release_environment(env.id());
            return Err(WorkletError::Disposed);
        }
        Ok(resolved)
    }

    /// Drops the function materialized for `env`, on `env`'s thread. Returns
    /// false when there was none.
    pub fn release_environment(&self, env: EnvId) -> bool {
        match self.cache.remove(env) {
            Some(handle) => {
                handle.dispose();
                true
            }
            None => false,
        }
    }

    /// Releases every materialized function, each on its owning thread.
    /// Later calls return `undefined` (or [`WorkletError::Disposed`]).
    pub fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::AcqRel) {
            tracing::debug!(location = %self.descriptor.location(), "disposing worklet invoker");
        }
        for handle in self.cache.drain() {
            handle.dispose();
        }
    }

    fn materialization_error(&self, reason: String) -> WorkletError {
        WorkletError::Materialization {
            name: self.descriptor.name().to_owned(),
            location: self.descriptor.location().to_owned(),
            reason,
        }
    }

    fn invocation_error(&self, reason: String) -> WorkletError {
        WorkletError::Invocation {
            name: self.descriptor.name().to_owned(),
            location: self.descriptor.location().to_owned(),
            reason,
        }
    }
}

impl Drop for WorkletInvoker {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for WorkletInvoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkletInvoker")
            .field("descriptor", &self.descriptor)
            .field("state", &self.state())
            .field("materializations", &self.materializations())
            .finish()
    }
}
