//! Interop tracing: a pluggable observer of queries and calls crossing the
//! bridge. Tracing never affects control flow.

use std::ffi::c_void;

use openvst3_abi::{is_success, result_name, tresult, Tuid};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// The host called into a bridged Rust object.
    HostToPlugin,
    /// Rust code called into an interface owned by the host.
    PluginToHost,
}

#[derive(Debug, Clone, Copy)]
pub struct CallEvent<'a> {
    pub direction: Direction,
    /// Interface pointer the call went through.
    pub pointer: *const c_void,
    pub interface: &'a str,
    pub method: &'a str,
}

pub trait InteropTracer: Send + Sync {
    /// A `queryInterface` crossed the bridge. `known_name` is the registered
    /// name of `iid`, if any.
    fn query_interface(&self, direction: Direction, iid: &Tuid, known_name: Option<&str>, implemented: bool);

    fn enter(&self, event: &CallEvent<'_>);

    /// Exit of a call; `result` other than `kResultOk`/`kResultFalse` is an
    /// exit with error.
    fn exit(&self, event: &CallEvent<'_>, result: tresult);
}

/// Forwards interop events to `tracing` under the `openvst3_bridge::interop` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTracer;

impl InteropTracer for LogTracer {
    fn query_interface(&self, direction: Direction, iid: &Tuid, known_name: Option<&str>, implemented: bool) {
        tracing::debug!(
            target: "openvst3_bridge::interop",
            ?direction,
            %iid,
            interface = known_name.unwrap_or("<unknown>"),
            implemented,
            "queryInterface"
        );
    }

    fn enter(&self, event: &CallEvent<'_>) {
        tracing::trace!(
            target: "openvst3_bridge::interop",
            direction = ?event.direction,
            pointer = ?event.pointer,
            "-> {}::{}",
            event.interface,
            event.method
        );
    }

    fn exit(&self, event: &CallEvent<'_>, result: tresult) {
        if is_success(result) {
            tracing::trace!(
                target: "openvst3_bridge::interop",
                direction = ?event.direction,
                result = result_name(result),
                "<- {}::{}",
                event.interface,
                event.method
            );
        } else {
            tracing::warn!(
                target: "openvst3_bridge::interop",
                direction = ?event.direction,
                pointer = ?event.pointer,
                result,
                result_name = result_name(result),
                "<- {}::{} failed",
                event.interface,
                event.method
            );
        }
    }
}
