//! Helpers for the per-method trampolines stored in interface vtables.
//!
//! A trampoline receives the interface pointer the host called through,
//! finds the bridged object behind it and runs the Rust implementation.
//! Panics stop here and become `kInternalError`.

use std::any::Any;
use std::ffi::c_void;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use openvst3_abi::{tresult, Interface, K_INTERNAL_ERR, K_INVALID_ARG, K_NOT_IMPLEMENTED, K_NOT_INITIALIZED, K_RESULT_OK};

use crate::config::TraceEvents;
use crate::identity::IdentityObject;
use crate::slot::InterfaceSlot;
use crate::target::Target;
use crate::trace::{CallEvent, Direction};

/// Finds the identity object and bound target behind an interface pointer.
///
/// Returns `None` for a null pointer or an interface pointer whose object has
/// already been returned to the pool.
///
/// # Safety
/// A non-null `this` must be an interface pointer handed out by the bridge.
pub unsafe fn resolve(this: *const c_void) -> Option<(&'static IdentityObject, Arc<dyn Target>)> {
    if this.is_null() {
        return None;
    }
    let identity = InterfaceSlot::from_raw(this).owner()?;
    identity.target().map(|target| (identity, target))
}

/// Runs `f` against the target behind `this` on behalf of `I::method`.
///
/// Emits tracer enter/exit events when call tracing is enabled. Returns
/// `kInvalidArgument` for a null pointer, `kNotInitialized` for a pooled
/// object and `kInternalError` if `f` panics.
///
/// # Safety
/// A non-null `this` must be an interface pointer handed out by the bridge.
pub unsafe fn call_managed<I, F>(this: *mut I, method: &'static str, f: F) -> tresult
where
    I: Interface,
    F: FnOnce(&dyn Target) -> tresult,
{
    if this.is_null() {
        return K_INVALID_ARG;
    }
    let pointer = this.cast_const().cast::<c_void>();
    let Some((identity, target)) = resolve(pointer) else {
        tracing::warn!(interface = I::NAME, method, "call through an unbound interface pointer");
        return K_NOT_INITIALIZED;
    };

    let event = CallEvent {
        direction: Direction::HostToPlugin,
        pointer,
        interface: I::NAME,
        method,
    };
    let tracer = identity.registry().tracer(TraceEvents::CALLS);
    if let Some(tracer) = tracer {
        tracer.enter(&event);
    }

    let result = match panic::catch_unwind(AssertUnwindSafe(|| f(&*target))) {
        Ok(result) => result,
        Err(payload) => {
            tracing::error!(
                interface = I::NAME,
                method,
                panic = panic_message(payload.as_ref()),
                "panic in bridged call"
            );
            K_INTERNAL_ERR
        }
    };

    if let Some(tracer) = tracer {
        tracer.exit(&event, result);
    }
    result
}

/// [`call_managed`] for trampolines that only make sense on one concrete
/// target type. Any other target answers `kNotImplemented`.
///
/// # Safety
/// As for [`call_managed`].
pub unsafe fn call_as<I, T, F>(this: *mut I, method: &'static str, f: F) -> tresult
where
    I: Interface,
    T: Target,
    F: FnOnce(&T) -> tresult,
{
    call_managed(this, method, |target| match target.downcast_ref::<T>() {
        Some(target) => f(target),
        None => {
            tracing::error!(interface = I::NAME, method, "bound target has an unexpected type");
            K_NOT_IMPLEMENTED
        }
    })
}

/// For methods that return a value rather than a `tresult`: runs `f` like
/// [`call_managed`] and yields `fallback` when the call cannot complete.
///
/// # Safety
/// As for [`call_managed`].
pub unsafe fn call_value<I, R, F>(this: *mut I, method: &'static str, fallback: R, f: F) -> R
where
    I: Interface,
    F: FnOnce(&dyn Target) -> R,
{
    let mut value = None;
    let result = call_managed(this, method, |target| {
        value = Some(f(target));
        K_RESULT_OK
    });
    match value {
        Some(value) if result == K_RESULT_OK => value,
        _ => fallback,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "<non-string panic payload>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_are_described() {
        let payload = panic::catch_unwind(|| panic!("static message")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "static message");

        let payload = panic::catch_unwind(|| panic!("formatted {}", 7)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "formatted 7");

        let payload = panic::catch_unwind(|| std::panic::panic_any(3_u8)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "<non-string panic payload>");
    }

    #[test]
    fn null_pointers_are_rejected() {
        let this: *mut openvst3_abi::FUnknown = std::ptr::null_mut();
        // SAFETY: null is handled before any dereference.
        unsafe {
            assert!(resolve(this.cast_const().cast()).is_none());
            assert_eq!(call_managed(this, "method", |_| K_RESULT_OK), K_INVALID_ARG);
            assert_eq!(call_value(this, "method", 9_u32, |_| 1), 9);
        }
    }
}
