//! Runtime configuration for a bridge registry.

use bitflags::bitflags;

bitflags! {
    /// Interop events forwarded to the registry's [`InteropTracer`](crate::InteropTracer).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TraceEvents: u8 {
        /// `queryInterface` issued by the host on a bridged object.
        const HOST_QUERIES = 1 << 0;
        /// `queryInterface` issued by plugin code on a host object.
        const PLUGIN_QUERIES = 1 << 1;
        /// Enter/exit of trampolined calls.
        const CALLS = 1 << 2;
    }
}

impl TraceEvents {
    /// Parses a comma separated list: `host`, `plugin`, `calls`, `all`.
    ///
    /// Unknown words are logged and skipped.
    pub fn parse_list(text: &str) -> Self {
        let mut events = TraceEvents::empty();
        for word in text.split(',').map(str::trim).filter(|w| !w.is_empty()) {
            match word.to_ascii_lowercase().as_str() {
                "host" => events |= TraceEvents::HOST_QUERIES,
                "plugin" => events |= TraceEvents::PLUGIN_QUERIES,
                "calls" => events |= TraceEvents::CALLS,
                "all" => events |= TraceEvents::all(),
                "none" | "off" => {}
                other => tracing::warn!(value = other, "ignoring unknown trace event"),
            }
        }
        events
    }
}

/// Environment variable holding the initial pool size.
pub const ENV_POOL_SIZE: &str = "OPENVST3_BRIDGE_POOL";
/// Environment variable holding the trace event list.
pub const ENV_TRACE: &str = "OPENVST3_BRIDGE_TRACE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Identity objects allocated up front when the registry is built.
    pub initial_pool_size: usize,
    /// Which interop events reach the tracer.
    pub trace: TraceEvents,
}

impl BridgeConfig {
    /// Default number of pre-allocated identity objects.
    pub const DEFAULT_POOL_SIZE: usize = 16;

    pub const fn new() -> Self {
        Self {
            initial_pool_size: Self::DEFAULT_POOL_SIZE,
            trace: TraceEvents::empty(),
        }
    }

    pub const fn with_pool_size(mut self, size: usize) -> Self {
        self.initial_pool_size = size;
        self
    }

    pub const fn with_trace(mut self, trace: TraceEvents) -> Self {
        self.trace = trace;
        self
    }

    /// Defaults overridden by `OPENVST3_BRIDGE_POOL` and `OPENVST3_BRIDGE_TRACE`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::new();
        if let Some(raw) = lookup(ENV_POOL_SIZE) {
            match raw.trim().parse::<usize>() {
                Ok(size) => config.initial_pool_size = size,
                Err(err) => tracing::warn!(%err, value = %raw, "ignoring invalid {ENV_POOL_SIZE}"),
            }
        }
        if let Some(raw) = lookup(ENV_TRACE) {
            config.trace = TraceEvents::parse_list(&raw);
        }
        config
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::new()
    }
}
