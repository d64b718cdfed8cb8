//! Native entry points for `FUnknown`: the first three entries of every
//! vtable the bridge builds.
//!
//! These run on whatever thread the host calls from, including the audio
//! thread, and must never unwind into native code.

use std::ffi::c_void;
use std::panic::{self, AssertUnwindSafe};
use std::ptr::{self, NonNull};

use openvst3_abi::{
    tresult, FUnknown, Fuid, Tuid, FUNKNOWN_VTABLE_SLOTS, K_INTERNAL_ERR, K_INVALID_ARG,
    K_NO_INTERFACE, K_RESULT_OK,
};

use crate::error::{BridgeError, Result};
use crate::identity::IdentityObject;
use crate::slot::InterfaceSlot;
use crate::trace::Direction;
use crate::vtable::{NativeInterface, VtableCell};

/// Writes the bridge's `queryInterface`/`addRef`/`release` into the first
/// three entries of `table`.
pub fn init_funknown(table: &mut [*const c_void]) {
    table[0] = query_interface as *const c_void;
    table[1] = add_ref as *const c_void;
    table[2] = release as *const c_void;
}

static FUNKNOWN_VTABLE: VtableCell = VtableCell::new();

impl NativeInterface for FUnknown {
    const VTABLE_SLOTS: usize = FUNKNOWN_VTABLE_SLOTS;

    fn init_vtable(table: &mut [*const c_void]) {
        init_funknown(table);
    }

    fn vtable_cell() -> &'static VtableCell {
        &FUNKNOWN_VTABLE
    }
}

/// Host-side query against `identity`: succeeds only when `iid` is in the
/// capability table and the bound target supports the mapped capability.
///
/// `Ok(None)` is the ordinary "no such interface" answer and leaves the
/// object untouched.
pub fn query_for_host(identity: &IdentityObject, iid: &Tuid) -> Result<Option<NonNull<InterfaceSlot>>> {
    let registry = identity.registry();
    let entry = registry.capabilities().lookup(iid).copied();
    let granted = match (entry, identity.target()) {
        (Some(entry), Some(target)) if entry.grants(&*target) => Some(entry),
        _ => None,
    };
    registry.trace_query(Direction::HostToPlugin, iid, granted.is_some());

    match granted {
        Some(entry) => identity.query_vtable((entry.vtable)()).map(Some),
        None => Ok(None),
    }
}

/// `FUnknown::queryInterface` for every bridged interface.
///
/// # Safety
/// Called by native code with a pointer previously handed out by the bridge.
pub unsafe extern "C" fn query_interface(this: *mut FUnknown, iid: *const Fuid, obj: *mut *mut c_void) -> tresult {
    if obj.is_null() {
        return K_INVALID_ARG;
    }
    *obj = ptr::null_mut();
    if this.is_null() || iid.is_null() {
        return K_INVALID_ARG;
    }

    let identity = InterfaceSlot::from_raw(this.cast_const().cast()).identity();
    let iid = *iid;
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| query_for_host(identity, &iid)));

    match outcome {
        Ok(Ok(Some(slot))) => {
            *obj = slot.as_ptr().cast();
            K_RESULT_OK
        }
        Ok(Ok(None)) => K_NO_INTERFACE,
        Ok(Err(err @ BridgeError::CapacityExceeded { .. })) => {
            // No result code expresses this; the capability table promised
            // more interfaces than an object can carry.
            tracing::error!(%err, %iid, "aborting: host query exceeded interface capacity");
            std::process::abort();
        }
        Ok(Err(err)) => {
            tracing::debug!(%err, %iid, "queryInterface refused");
            K_NO_INTERFACE
        }
        Err(_) => {
            tracing::error!(%iid, "panic while answering queryInterface");
            K_INTERNAL_ERR
        }
    }
}

/// `FUnknown::addRef` for every bridged interface.
///
/// # Safety
/// Called by native code with a pointer previously handed out by the bridge.
pub unsafe extern "C" fn add_ref(this: *mut FUnknown) -> u32 {
    if this.is_null() {
        return 0;
    }
    InterfaceSlot::from_raw(this.cast_const().cast()).identity().add_ref()
}

/// `FUnknown::release` for every bridged interface.
///
/// # Safety
/// Called by native code with a pointer previously handed out by the bridge.
/// The pointer must not be used again if this drops the last reference.
pub unsafe extern "C" fn release(this: *mut FUnknown) -> u32 {
    if this.is_null() {
        return 0;
    }
    let identity = InterfaceSlot::from_raw(this.cast_const().cast()).identity();
    match panic::catch_unwind(AssertUnwindSafe(|| identity.release_ref())) {
        Ok(Ok(count)) => count,
        Ok(Err(err)) => {
            // The object is already pooled; the host only needs the count.
            tracing::error!(%err, "error while releasing last reference");
            0
        }
        Err(_) => {
            tracing::error!("panic while releasing a bridged object");
            0
        }
    }
}
