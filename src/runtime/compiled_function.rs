use std::{fmt, sync::Arc};

use boa_engine::JsObject;

use crate::{
    context::ExecutionContext,
    runtime::{EnvId, ThreadBound, leak_detector},
};

/// A materialized worklet function inside one environment.
///
/// The handle may travel between threads (it lives in a shared cache), but
/// the function inside is only reachable on the environment's thread and is
/// released there: [`CompiledFunctionHandle::dispose`] ships the handle back
/// to its owning context before dropping it.
pub struct CompiledFunctionHandle {
    function: ThreadBound<JsObject>,
    env: EnvId,
    owner: Option<Arc<ExecutionContext>>,
    fallback: Option<String>,
}

impl CompiledFunctionHandle {
    /// `fallback` carries the reason when `function` is the no-op stand-in
    /// for a worklet whose source failed to evaluate.
    pub fn new(
        function: JsObject,
        env: EnvId,
        owner: Option<Arc<ExecutionContext>>,
        fallback: Option<String>,
    ) -> Self {
        leak_detector::record_materialized();
        Self {
            function: ThreadBound::new(function),
            env,
            owner,
            fallback,
        }
    }

    pub fn env(&self) -> EnvId {
        self.env
    }

    pub fn owner(&self) -> Option<&Arc<ExecutionContext>> {
        self.owner.as_ref()
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    pub fn fallback_reason(&self) -> Option<&str> {
        self.fallback.as_deref()
    }

    /// The function, when asked for on the environment's thread.
    pub fn function(&self) -> Option<JsObject> {
        self.function.get().cloned()
    }

    /// Releases the handle on the thread that owns its environment.
    ///
    /// Handles of context-owned environments are queued on that context.
    /// Handles of standalone environments are released in place when already
    /// on their thread and otherwise queued on the default context.
    pub fn dispose(self) {
        let target = match self.owner.clone() {
            Some(owner) => Ok(owner),
            None if self.function.is_owner_thread() => {
                drop(self);
                return;
            }
            None => ExecutionContext::default_context(),
        };
        let env = self.env;
        match target {
            Ok(context) => {
                if let Err(err) = context.run_on_own_thread(move |_| drop(self)) {
                    tracing::warn!(%env, error = %err, "could not schedule compiled function release");
                }
            }
            Err(err) => {
                tracing::warn!(%env, error = %err, "no context available to release compiled function");
                drop(self);
            }
        }
    }
}

impl fmt::Debug for CompiledFunctionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledFunctionHandle")
            .field("env", &self.env)
            .field("owner", &self.owner.as_ref().map(|ctx| ctx.name()))
            .field("fallback", &self.fallback)
            .finish()
    }
}
