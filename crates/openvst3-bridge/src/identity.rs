//! The reference-counted object behind every interface pointer the bridge
//! hands out.
//!
//! One identity object multiplexes a single [`Target`] across up to
//! [`MAX_INTERFACES_PER_OBJECT`] interface slots. The reference count is
//! shared by every slot: native code keeps the object alive while it holds
//! any of its interface pointers. Identity objects are allocated once, never
//! freed, and cycle between the registry's pool and a bound target.

use std::cell::UnsafeCell;
use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;

use openvst3_abi::Tuid;

use crate::error::{BridgeError, Result};
use crate::registry::{self, BridgeRegistry};
use crate::slot::InterfaceSlot;
use crate::spin::{SpinGuard, SpinLock};
use crate::target::Target;
use crate::vtable::{self, NativeInterface, Vtable};

/// Distinct interfaces one object can present at once.
pub const MAX_INTERFACES_PER_OBJECT: usize = 32;

pub(crate) struct IdentityState {
    pub(crate) ref_count: u32,
    len: usize,
    pub(crate) target: Option<Arc<dyn Target>>,
}

pub struct IdentityObject {
    registry: &'static BridgeRegistry,
    state: SpinLock<IdentityState>,
    // Written only under `state`'s lock, and only for slots no native caller
    // can hold yet (the next free one) or while no references exist (reset).
    slots: UnsafeCell<[InterfaceSlot; MAX_INTERFACES_PER_OBJECT]>,
}

// SAFETY: mutable state sits behind the spin lock; slots follow the write
// discipline documented on the field.
unsafe impl Send for IdentityObject {}
// SAFETY: as above.
unsafe impl Sync for IdentityObject {}

impl IdentityObject {
    /// Allocates a pooled (unbound) object with a stable, process-lifetime address.
    pub(crate) fn allocate(registry: &'static BridgeRegistry) -> &'static IdentityObject {
        Box::leak(Box::new(IdentityObject {
            registry,
            state: SpinLock::new(IdentityState {
                ref_count: 0,
                len: 0,
                target: None,
            }),
            slots: UnsafeCell::new([InterfaceSlot::EMPTY; MAX_INTERFACES_PER_OBJECT]),
        }))
    }

    #[inline]
    fn slot_ptr(&self, index: usize) -> *mut InterfaceSlot {
        debug_assert!(index < MAX_INTERFACES_PER_OBJECT);
        // SAFETY: index is within the slot array.
        unsafe { self.slots.get().cast::<InterfaceSlot>().add(index) }
    }

    pub(crate) fn lock(&self) -> SpinGuard<'_, IdentityState> {
        self.state.lock()
    }

    pub fn registry(&self) -> &'static BridgeRegistry {
        self.registry
    }

    /// The bridged object, or `None` while pooled.
    pub fn target(&self) -> Option<Arc<dyn Target>> {
        self.state.lock().target.clone()
    }

    pub fn is_bound(&self) -> bool {
        self.state.lock().target.is_some()
    }

    pub fn ref_count(&self) -> u32 {
        self.state.lock().ref_count
    }

    /// Number of interface slots currently in use.
    pub fn interface_count(&self) -> usize {
        self.state.lock().len
    }

    /// IID and address of the slot at `index`.
    pub fn interface_at(&self, index: usize) -> Option<(Tuid, NonNull<InterfaceSlot>)> {
        let state = self.state.lock();
        if index >= state.len {
            return None;
        }
        let slot = self.slot_ptr(index);
        // SAFETY: `index < len`, so the slot was initialized and is not being written.
        let iid = unsafe { (*slot).iid() };
        NonNull::new(slot).map(|ptr| (iid, ptr))
    }

    /// IIDs of every live slot, in allocation order.
    pub fn interfaces(&self) -> Vec<Tuid> {
        let state = self.state.lock();
        // SAFETY: slots below `len` are initialized.
        (0..state.len).map(|i| unsafe { (*self.slot_ptr(i)).iid() }).collect()
    }

    /// Returns the interface pointer for `I`, taking one reference.
    pub fn query<I: NativeInterface>(&self) -> Result<NonNull<I>> {
        self.query_vtable(vtable::vtable::<I>()).map(NonNull::cast)
    }

    /// Returns the slot presenting `iid`, taking one reference.
    ///
    /// Fails without touching the reference count when `iid` has no
    /// registered vtable or the object is not bound.
    pub fn query_interface(&self, iid: &Tuid) -> Result<NonNull<InterfaceSlot>> {
        let vtable = self
            .registry
            .vtable_for(iid)
            .ok_or(BridgeError::UnknownInterface(*iid))?;
        self.query_vtable(vtable)
    }

    pub(crate) fn query_vtable(&self, vtable: &'static Vtable) -> Result<NonNull<InterfaceSlot>> {
        let iid = vtable.iid();
        let mut state = self.state.lock();
        if state.target.is_none() {
            return Err(BridgeError::Unbound);
        }
        state.ref_count += 1;

        for index in 0..state.len {
            let slot = self.slot_ptr(index);
            // SAFETY: slots below `len` are initialized.
            if unsafe { (*slot).iid() } == iid {
                // SAFETY: derived from the slot array, never null.
                return Ok(unsafe { NonNull::new_unchecked(slot) });
            }
        }

        if state.len == MAX_INTERFACES_PER_OBJECT {
            state.ref_count -= 1;
            drop(state);
            tracing::error!(
                interface = vtable.name(),
                %iid,
                capacity = MAX_INTERFACES_PER_OBJECT,
                "interface slot capacity exhausted"
            );
            return Err(BridgeError::CapacityExceeded {
                capacity: MAX_INTERFACES_PER_OBJECT,
            });
        }

        let slot = self.slot_ptr(state.len);
        // SAFETY: the slot at `len` is unused, so no native caller can be
        // reading it, and we hold the lock.
        unsafe {
            debug_assert!((*slot).is_empty());
            slot.write(InterfaceSlot::new(vtable.as_ptr(), iid, self));
        }
        state.len += 1;
        tracing::trace!(interface = vtable.name(), slots = state.len, "allocated interface slot");
        // SAFETY: derived from the slot array, never null.
        Ok(unsafe { NonNull::new_unchecked(slot) })
    }

    pub fn add_ref(&self) -> u32 {
        let mut state = self.state.lock();
        state.ref_count += 1;
        state.ref_count
    }

    /// Drops one reference.
    ///
    /// The call that takes the count from one to zero disposes the target,
    /// then resets this object and returns it to the pool. A disposal error
    /// is returned after the object has been pooled.
    pub fn release_ref(&'static self) -> Result<u32> {
        let target = {
            let mut state = self.state.lock();
            if state.ref_count == 0 {
                drop(state);
                tracing::error!(object = ?(self as *const Self), "release called with no outstanding references");
                return Ok(0);
            }
            state.ref_count -= 1;
            if state.ref_count > 0 {
                return Ok(state.ref_count);
            }
            state.target.clone()
        };
        let Some(target) = target else {
            return Ok(0);
        };

        // Retire even if disposal panics, so the object is never stranded
        // bound with no references.
        let retire = Retire {
            identity: self,
            key: registry::target_key(&target),
        };
        let disposed = target.dispose();
        drop(target);
        drop(retire);

        match disposed {
            Ok(()) => Ok(0),
            Err(err) => {
                tracing::warn!(%err, "target disposal failed");
                Err(BridgeError::Dispose(err))
            }
        }
    }

    /// Zeroes every slot and the reference count so nothing survives into the
    /// next tenancy. Caller holds the lock and no references exist.
    pub(crate) fn reset(&self, state: &mut IdentityState) {
        for index in 0..state.len {
            // SAFETY: no native caller holds a reference, so nobody reads the slot.
            unsafe { self.slot_ptr(index).write(InterfaceSlot::EMPTY) };
        }
        state.len = 0;
        state.ref_count = 0;
    }
}

struct Retire {
    identity: &'static IdentityObject,
    key: usize,
}

impl Drop for Retire {
    fn drop(&mut self) {
        self.identity.registry.unbind(self.identity, self.key);
    }
}

impl fmt::Debug for IdentityObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("IdentityObject")
            .field("address", &(self as *const Self))
            .field("ref_count", &state.ref_count)
            .field("interfaces", &state.len)
            .field("bound", &state.target.is_some())
            .finish()
    }
}
