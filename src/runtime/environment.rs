use std::{
    fmt,
    path::Path,
    sync::atomic::{AtomicU64, Ordering},
    thread::{self, ThreadId},
};

use boa_engine::{Context, JsObject, JsResult, JsValue, Source};

use crate::{context::ContextId, error::WorkletError, marshal::shared_cell};

static NEXT_ENV_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an [`Environment`]. Ids are never reused, so a
/// cache keyed by `EnvId` cannot confuse a new environment with a dead one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnvId(u64);

impl EnvId {
    fn next() -> Self {
        Self(NEXT_ENV_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EnvId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "env#{}", self.0)
    }
}

/// An isolated script engine instance with its own global scope.
///
/// Not `Send`: an environment lives and dies on the thread that created it.
/// Environments owned by an [`ExecutionContext`](crate::ExecutionContext)
/// report that context through [`Environment::owner`]; standalone ones
/// report `None`.
///
/// Every environment starts with a global `createSharedValue(initial)`
/// that returns a [`SharedCell`](crate::SharedCell) view.
pub struct Environment {
    id: EnvId,
    owner: Option<ContextId>,
    thread: ThreadId,
    context: Context,
}

impl Environment {
    /// A standalone environment bound to the calling thread.
    pub fn new() -> Result<Self, WorkletError> {
        Self::bootstrap(None)
    }

    pub(crate) fn owned_by(owner: ContextId) -> Result<Self, WorkletError> {
        Self::bootstrap(Some(owner))
    }

    fn bootstrap(owner: Option<ContextId>) -> Result<Self, WorkletError> {
        let mut context = Context::default();
        shared_cell::install_factory(&mut context)
            .map_err(|err| WorkletError::Engine(err.to_string()))?;
        let env = Self {
            id: EnvId::next(),
            owner,
            thread: thread::current().id(),
            context,
        };
        tracing::trace!(env = %env.id, owner = ?owner, "environment created");
        Ok(env)
    }

    pub fn id(&self) -> EnvId {
        self.id
    }

    pub fn owner(&self) -> Option<ContextId> {
        self.owner
    }

    pub fn thread(&self) -> ThreadId {
        self.thread
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    pub fn global_object(&self) -> JsObject {
        self.context.global_object()
    }

    /// Evaluates `source` as a script; `origin` names it in stack traces.
    pub fn eval(&mut self, source: &str, origin: &str) -> JsResult<JsValue> {
        let source = Source::from_bytes(source.as_bytes()).with_path(Path::new(origin));
        self.context.eval(source)
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("thread", &self.thread)
            .finish_non_exhaustive()
    }
}
