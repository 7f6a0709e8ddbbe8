pub mod config;
pub mod context;
pub mod error;
pub mod marshal;
pub mod runtime;
pub mod worklet;

pub use context::ExecutionContext;
pub use error::{ContextError, ValidationError, WorkletError};
pub use marshal::{SharedCell, Snapshot};
pub use runtime::environment::{EnvId, Environment};
pub use worklet::{EncodingVariant, InvokerState, WorkletDescriptor, WorkletInvoker};
