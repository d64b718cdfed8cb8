use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::ptr::{self, NonNull};

use openvst3_abi::{FUnknown, Interface, K_RESULT_OK};

use crate::registry::BridgeRegistry;
use crate::trace::Direction;

/// Owning pointer to a native interface, usually one the host passed in.
///
/// Holds one reference: `Clone` calls `addRef`, `Drop` calls `release`.
pub struct ComPtr<I: Interface> {
    ptr: NonNull<I>,
    _marker: PhantomData<I>,
}

impl<I: Interface> ComPtr<I> {
    /// Takes ownership of a reference the caller already holds.
    ///
    /// # Safety
    /// A non-null `ptr` must be a live interface pointer of type `I` whose
    /// vtable starts with the `FUnknown` methods.
    pub unsafe fn from_raw(ptr: *mut I) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Self {
            ptr,
            _marker: PhantomData,
        })
    }

    /// Like [`from_raw`](Self::from_raw) but takes a new reference, for
    /// pointers that are only borrowed (e.g. call arguments).
    ///
    /// # Safety
    /// As for [`from_raw`](Self::from_raw).
    pub unsafe fn from_raw_add_ref(ptr: *mut I) -> Option<Self> {
        let this = Self::from_raw(ptr)?;
        let unknown = this.as_unknown();
        ((*(*unknown).vtbl).add_ref)(unknown);
        Some(this)
    }

    #[inline]
    pub fn as_ptr(&self) -> *mut I {
        self.ptr.as_ptr()
    }

    /// Gives the reference back to the caller without releasing it.
    pub fn into_raw(self) -> *mut I {
        let ptr = self.ptr.as_ptr();
        std::mem::forget(self);
        ptr
    }

    #[inline]
    fn as_unknown(&self) -> *mut FUnknown {
        self.ptr.as_ptr().cast()
    }

    /// Asks the object for interface `J`.
    pub fn query<J: Interface>(&self) -> Option<ComPtr<J>> {
        let unknown = self.as_unknown();
        let mut out = ptr::null_mut();
        // SAFETY: `self` holds a reference, so the object and its vtable are live.
        let result = unsafe { ((*(*unknown).vtbl).query_interface)(unknown, &J::IID, &mut out) };
        let found = result == K_RESULT_OK && !out.is_null();

        if let Some(registry) = BridgeRegistry::try_global() {
            registry.trace_query(Direction::PluginToHost, &J::IID, found);
        }

        if found {
            // SAFETY: a successful query returns an owned reference to `J`.
            unsafe { ComPtr::from_raw(out.cast::<J>()) }
        } else {
            None
        }
    }
}

impl<I: Interface> Clone for ComPtr<I> {
    fn clone(&self) -> Self {
        let unknown = self.as_unknown();
        // SAFETY: `self` holds a reference.
        unsafe { ((*(*unknown).vtbl).add_ref)(unknown) };
        Self {
            ptr: self.ptr,
            _marker: PhantomData,
        }
    }
}

impl<I: Interface> Drop for ComPtr<I> {
    fn drop(&mut self) {
        let unknown = self.as_unknown();
        // SAFETY: releases the reference this pointer owns; not used afterwards.
        unsafe { ((*(*unknown).vtbl).release)(unknown) };
    }
}

impl<I: Interface> Deref for ComPtr<I> {
    type Target = I;

    fn deref(&self) -> &I {
        // SAFETY: the object stays alive while we hold a reference.
        unsafe { self.ptr.as_ref() }
    }
}

impl<I: Interface> fmt::Debug for ComPtr<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ComPtr").field(&I::NAME).field(&self.ptr).finish()
    }
}
