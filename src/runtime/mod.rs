//! Script environments and the engine values pinned to them.
//!
//! # Owning-Thread Invariant
//! Every engine value (`JsValue`, `JsObject`) belongs to the environment that
//! created it, and every environment belongs to exactly one thread.
//!
//! The invariant is:
//! - Engine values are created, read, called and released only on the thread
//!   of their environment.
//! - Engine values that must be stored in `Send` structures (such as a
//!   per-environment function cache) are wrapped in [`ThreadBound`], which
//!   refuses access from other threads and leaks rather than releasing there.
//! - Releasing a cached function is dispatched to the owning execution
//!   context instead of happening on whichever thread drops the last owner.
//!
//! Values that cross environments do so as [`Snapshot`](crate::marshal::Snapshot)s,
//! never as engine values.
pub mod compiled_function;
pub mod environment;
pub mod leak_detector;
pub mod thread_bound;

pub use compiled_function::CompiledFunctionHandle;
pub use environment::{EnvId, Environment};
pub use thread_bound::ThreadBound;
