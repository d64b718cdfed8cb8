#![cfg_attr(not(feature = "std"), no_std)]
#![allow(non_camel_case_types)]
//! Clean-room, header-free minimal ABI shared by both sides of the interface bridge.
//! This crate intentionally mirrors public documentation naming to preserve ABI.
//! It does **not** include or depend on Steinberg headers.
//!
//! Everything here is layout: identifiers, result codes and the `FUnknown`
//! vtable every interface starts with. Lifetime and dispatch live in
//! `openvst3-bridge`.

use core::ffi::c_void;
use core::fmt;

mod tuid;

pub use tuid::{Fuid, Tuid};

// ----- Core scalar types (per public docs) -----------------------------------
pub type int16 = i16;
pub type int32 = i32;
pub type int64 = i64;
pub type uint32 = u32;
pub type uint64 = u64;
pub type tresult = int32;

// Result codes. The SDK uses COM HRESULT values on Windows and small integers
// everywhere else, so hosts on each platform compare against different numbers.
#[cfg(target_os = "windows")]
mod codes {
    use super::tresult;
    pub const K_NO_INTERFACE: tresult = 0x8000_4002_u32 as tresult;
    pub const K_RESULT_OK: tresult = 0;
    pub const K_RESULT_FALSE: tresult = 1;
    pub const K_INVALID_ARG: tresult = 0x8007_0057_u32 as tresult;
    pub const K_NOT_IMPLEMENTED: tresult = 0x8000_4001_u32 as tresult;
    pub const K_INTERNAL_ERR: tresult = 0x8000_4005_u32 as tresult;
    pub const K_NOT_INITIALIZED: tresult = 0x8000_FFFF_u32 as tresult;
    pub const K_OUT_OF_MEMORY: tresult = 0x8007_000E_u32 as tresult;
}

#[cfg(not(target_os = "windows"))]
mod codes {
    use super::tresult;
    pub const K_NO_INTERFACE: tresult = -1;
    pub const K_RESULT_OK: tresult = 0;
    pub const K_RESULT_FALSE: tresult = 1;
    pub const K_INVALID_ARG: tresult = 2;
    pub const K_NOT_IMPLEMENTED: tresult = 3;
    pub const K_INTERNAL_ERR: tresult = 4;
    pub const K_NOT_INITIALIZED: tresult = 5;
    pub const K_OUT_OF_MEMORY: tresult = 6;
}

pub use codes::*;

/// `kResultTrue` is the same value as `kResultOk`.
pub const K_RESULT_TRUE: tresult = K_RESULT_OK;

/// Returns true for the two non-error results (`kResultOk`, `kResultFalse`).
#[inline]
pub const fn is_success(result: tresult) -> bool {
    result == K_RESULT_OK || result == K_RESULT_FALSE
}

/// Human-readable name of a result code, for logs.
pub fn result_name(result: tresult) -> &'static str {
    match result {
        K_RESULT_OK => "kResultOk",
        K_RESULT_FALSE => "kResultFalse",
        K_NO_INTERFACE => "kNoInterface",
        K_INVALID_ARG => "kInvalidArgument",
        K_NOT_IMPLEMENTED => "kNotImplemented",
        K_INTERNAL_ERR => "kInternalError",
        K_NOT_INITIALIZED => "kNotInitialized",
        K_OUT_OF_MEMORY => "kOutOfMemory",
        _ => "unknown",
    }
}

// ----- Interface identity ----------------------------------------------------

/// Implemented by every `#[repr(C)]` interface struct.
///
/// The struct's first (and only) field must be the vtable pointer, so that a
/// pointer to the struct can be reinterpreted as `*mut FUnknown`.
pub trait Interface {
    /// Interface identifier as laid out in memory.
    const IID: Tuid;
    /// Name used in logs and traces.
    const NAME: &'static str;
}

// ----- FUnknown (base interface; COM-like) -----------------------------------
//
// Methods are function pointers in a vtable with C calling convention.
//   query_interface(self, iid, obj_out) -> tresult
//   add_ref(self) -> u32
//   release(self) -> u32
//
// NOTE: We purposely avoid any C++ ABI assumptions: this is a C layout vtable.

#[repr(C)]
#[derive(Copy, Clone)]
pub struct FUnknownVTable {
    pub query_interface: unsafe extern "C" fn(this_: *mut FUnknown, iid: *const Fuid, obj: *mut *mut c_void) -> tresult,
    pub add_ref: unsafe extern "C" fn(this_: *mut FUnknown) -> u32,
    pub release: unsafe extern "C" fn(this_: *mut FUnknown) -> u32,
}

/// Number of entries in [`FUnknownVTable`]; every derived vtable starts with them.
pub const FUNKNOWN_VTABLE_SLOTS: usize = 3;

#[repr(C)]
pub struct FUnknown {
    pub vtbl: *const FUnknownVTable,
}

impl Interface for FUnknown {
    const IID: Tuid = Tuid::from_parts(0x0000_0000, 0x0000_0000, 0xC000_0000, 0x0000_0046);
    const NAME: &'static str = "FUnknown";
}

impl FUnknown {
    /// # Safety
    /// `self` must be a live interface pointer and `out` writable.
    #[inline]
    pub unsafe fn query_interface<T>(&mut self, iid: &Fuid, out: *mut *mut T) -> tresult {
        ((*self.vtbl).query_interface)(self, iid as *const Fuid, out as *mut *mut c_void)
    }
    /// # Safety
    /// `self` must be a live interface pointer.
    #[inline]
    pub unsafe fn add_ref(&mut self) -> u32 {
        ((*self.vtbl).add_ref)(self)
    }
    /// # Safety
    /// `self` must be a live interface pointer; it may be freed by this call.
    #[inline]
    pub unsafe fn release(&mut self) -> u32 {
        ((*self.vtbl).release)(self)
    }
}

impl fmt::Debug for FUnknown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FUnknown").field("vtbl", &self.vtbl).finish()
    }
}
