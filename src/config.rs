//! Crate-wide defaults and execution context configuration.

use std::env;

/// Display name used when a captured function has no usable `name`.
pub const DEFAULT_WORKLET_NAME: &str = "fn";

/// Origin reported for worklets that carry no location metadata.
pub const UNKNOWN_LOCATION: &str = "(unknown)";

/// Trimmed source text of this length or shorter is rejected.
pub const MIN_SOURCE_LEN: usize = 3;

/// Maximum nesting followed when wrapping a value tree.
pub const MAX_MARSHAL_DEPTH: usize = 64;

/// Name of the host/default execution context.
pub const DEFAULT_CONTEXT_NAME: &str = "default";

/// Stack size for context threads. Script evaluation recurses on the native
/// stack, so the std default of 2 MiB is too tight for deep worklets.
pub const DEFAULT_STACK_SIZE: usize = 8 * 1024 * 1024;

/// Environment variable overriding [`DEFAULT_STACK_SIZE`], in bytes.
pub const STACK_SIZE_ENV: &str = "WORKLETS_STACK_SIZE";

/// Settings for spawning an [`ExecutionContext`](crate::context::ExecutionContext).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextConfig {
    /// Context name; also used as the thread name.
    pub name: String,
    /// Stack size of the dedicated thread in bytes.
    pub stack_size: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            name: String::from("worklet"),
            stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

impl ContextConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Defaults, with the stack size taken from `WORKLETS_STACK_SIZE` when it
    /// holds a positive integer.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(size) = env::var(STACK_SIZE_ENV)
            .ok()
            .and_then(|raw| parse_stack_size(&raw))
        {
            config.stack_size = size;
        }
        config
    }

    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }
}

fn parse_stack_size(raw: &str) -> Option<usize> {
    raw.trim().parse::<usize>().ok().filter(|size| *size > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_keeps_default_stack_size() {
        let config = ContextConfig::named("camera");
        assert_eq!(config.name, "camera");
        assert_eq!(config.stack_size, DEFAULT_STACK_SIZE);
    }

    #[test]
    fn stack_size_parsing_rejects_garbage() {
        assert_eq!(parse_stack_size(" 4096 "), Some(4096));
        assert_eq!(parse_stack_size("0"), None);
        assert_eq!(parse_stack_size("-1"), None);
        assert_eq!(parse_stack_size("big"), None);
    }
}
