//! Execution contexts: one environment plus the thread that owns it.
//!
//! A context runs submitted tasks one at a time, in submission order, on its
//! dedicated thread. The environment is created on that thread at spawn time
//! and never leaves it; tasks receive it as `&mut Environment`.

mod current;

use std::{
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak,
        atomic::{AtomicU64, Ordering},
        mpsc,
    },
    thread::{self, JoinHandle, ThreadId},
};

use crate::{
    config::{ContextConfig, DEFAULT_CONTEXT_NAME},
    error::ContextError,
    runtime::Environment,
};

pub use current::current;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);
static DEFAULT_CONTEXT: OnceLock<Arc<ExecutionContext>> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    fn next() -> Self {
        Self(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

type Task = Box<dyn FnOnce(&mut Environment) + Send + 'static>;

pub struct ExecutionContext {
    id: ContextId,
    name: String,
    queue: Mutex<Option<mpsc::Sender<Task>>>,
    thread: OnceLock<ThreadId>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ExecutionContext {
    /// Starts the context thread and waits until its environment is ready.
    pub fn spawn(config: ContextConfig) -> Result<Arc<Self>, ContextError> {
        let (sender, receiver) = mpsc::channel::<Task>();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), String>>(1);
        let context = Arc::new(Self {
            id: ContextId::next(),
            name: config.name.clone(),
            queue: Mutex::new(Some(sender)),
            thread: OnceLock::new(),
            worker: Mutex::new(None),
        });

        let weak = Arc::downgrade(&context);
        let (id, name) = (context.id, context.name.clone());
        let worker = thread::Builder::new()
            .name(config.name.clone())
            .stack_size(config.stack_size)
            .spawn(move || run_loop(weak, id, name, receiver, ready_tx))
            .map_err(|source| ContextError::Spawn {
                name: config.name.clone(),
                source,
            })?;
        let _ = context.thread.set(worker.thread().id());
        *lock(&context.worker) = Some(worker);

        match ready_rx.recv() {
            Ok(Ok(())) => {
                tracing::debug!(context = %context.name, id = %context.id, "execution context started");
                Ok(context)
            }
            Ok(Err(reason)) => {
                context.shutdown();
                Err(ContextError::Startup {
                    name: config.name,
                    reason,
                })
            }
            Err(_) => Err(ContextError::Startup {
                name: config.name,
                reason: String::from("context thread exited during startup"),
            }),
        }
    }

    /// The shared host context, spawned on first use.
    pub fn default_context() -> Result<Arc<Self>, ContextError> {
        if let Some(context) = DEFAULT_CONTEXT.get() {
            return Ok(Arc::clone(context));
        }
        let spawned = Self::spawn(ContextConfig {
            name: String::from(DEFAULT_CONTEXT_NAME),
            ..ContextConfig::from_env()
        })?;
        let winner = DEFAULT_CONTEXT.get_or_init(|| Arc::clone(&spawned));
        if !Arc::ptr_eq(winner, &spawned) {
            spawned.shutdown();
        }
        Ok(Arc::clone(winner))
    }

    /// The context whose thread is executing the caller, if any.
    pub fn current() -> Option<Arc<Self>> {
        current::current()
    }

    /// The context that owns `env`, when `env` is owned by a context and the
    /// caller is on that context's thread.
    pub fn current_for(env: &Environment) -> Option<Arc<Self>> {
        let owner = env.owner()?;
        current::current().filter(|context| context.id == owner)
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_default(&self) -> bool {
        DEFAULT_CONTEXT
            .get()
            .is_some_and(|context| context.id == self.id)
    }

    pub fn is_current_thread(&self) -> bool {
        self.thread.get() == Some(&thread::current().id())
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.queue).is_none()
    }

    /// Enqueues `task`; it runs after every task submitted before it.
    pub fn run_on_own_thread<F>(&self, task: F) -> Result<(), ContextError>
    where
        F: FnOnce(&mut Environment) + Send + 'static,
    {
        // Clone the sender out so a rejected task is dropped without the lock
        // held; its destructor may schedule onto this same context.
        let sender = lock(&self.queue).clone();
        let Some(sender) = sender else {
            return Err(self.closed());
        };
        sender.send(Box::new(task)).map_err(|_| self.closed())
    }

    /// Enqueues `task` on the default context.
    pub fn run_on_host_thread<F>(task: F) -> Result<(), ContextError>
    where
        F: FnOnce(&mut Environment) + Send + 'static,
    {
        Self::default_context()?.run_on_own_thread(task)
    }

    /// Runs `task` on this context and blocks until it returns.
    pub fn run_sync<F, R>(&self, task: F) -> Result<R, ContextError>
    where
        F: FnOnce(&mut Environment) -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_current_thread() {
            return Err(ContextError::WouldDeadlock {
                name: self.name.clone(),
            });
        }
        let (tx, rx) = mpsc::sync_channel(1);
        self.run_on_own_thread(move |env| {
            let _ = tx.send(task(env));
        })?;
        rx.recv().map_err(|_| ContextError::TaskPanicked {
            name: self.name.clone(),
        })
    }

    /// Stops accepting tasks. Already queued tasks still run; the call then
    /// waits for the thread to finish unless made from that thread.
    pub fn shutdown(&self) {
        let sender = lock(&self.queue).take();
        if sender.is_none() {
            return;
        }
        drop(sender);
        tracing::debug!(context = %self.name, "execution context shutting down");

        if self.is_current_thread() {
            return;
        }
        let worker = lock(&self.worker).take();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                tracing::error!(context = %self.name, "execution context thread panicked");
            }
        }
    }

    fn closed(&self) -> ContextError {
        ContextError::Closed {
            name: self.name.clone(),
        }
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn run_loop(
    context: Weak<ExecutionContext>,
    id: ContextId,
    name: String,
    receiver: mpsc::Receiver<Task>,
    ready: mpsc::SyncSender<Result<(), String>>,
) {
    let mut env = match Environment::owned_by(id) {
        Ok(env) => env,
        Err(err) => {
            tracing::error!(context = %name, error = %err, "failed to create environment");
            let _ = ready.send(Err(err.to_string()));
            return;
        }
    };
    current::enter(context);
    let _ = ready.send(Ok(()));
    drop(ready);

    while let Ok(task) = receiver.recv() {
        if panic::catch_unwind(AssertUnwindSafe(|| task(&mut env))).is_err() {
            tracing::error!(context = %name, env = %env.id(), "task panicked");
        }
    }

    current::leave();
    tracing::debug!(context = %name, env = %env.id(), "execution context stopped");
}
