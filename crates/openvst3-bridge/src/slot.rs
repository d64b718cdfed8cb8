use std::ffi::c_void;
use std::ptr;
use std::sync::Arc;

use openvst3_abi::Tuid;

use crate::identity::IdentityObject;
use crate::target::Target;

/// What a native caller holds as "the interface pointer".
///
/// The vtable pointer comes first so the slot's address is a valid C++-style
/// object pointer for the interface named by `iid`.
#[repr(C)]
pub struct InterfaceSlot {
    vtbl: *const c_void,
    iid: Tuid,
    identity: *const IdentityObject,
}

impl InterfaceSlot {
    pub(crate) const EMPTY: InterfaceSlot = InterfaceSlot {
        vtbl: ptr::null(),
        iid: Tuid::new([0; 16]),
        identity: ptr::null(),
    };

    pub(crate) fn new(vtbl: *const c_void, iid: Tuid, identity: &IdentityObject) -> Self {
        Self {
            vtbl,
            iid,
            identity,
        }
    }

    /// Recovers the slot behind an interface pointer produced by the bridge.
    ///
    /// # Safety
    /// `this` must be a pointer handed out by this bridge whose object still
    /// holds at least one reference.
    #[inline]
    pub unsafe fn from_raw<'a>(this: *const c_void) -> &'a InterfaceSlot {
        &*this.cast::<InterfaceSlot>()
    }

    /// Owning identity object.
    #[inline]
    pub fn identity(&self) -> &'static IdentityObject {
        debug_assert!(!self.identity.is_null(), "interface slot used after reset");
        // SAFETY: identity objects are leaked on allocation and never freed,
        // and a live slot always carries its owner's address.
        unsafe { &*self.identity }
    }

    /// Owning identity object, or `None` for a slot cleared by a return to
    /// the pool.
    #[inline]
    pub fn owner(&self) -> Option<&'static IdentityObject> {
        // SAFETY: as for `identity`.
        unsafe { self.identity.as_ref() }
    }

    #[inline]
    pub fn iid(&self) -> Tuid {
        self.iid
    }

    #[inline]
    pub fn vtable_ptr(&self) -> *const c_void {
        self.vtbl
    }

    pub fn target(&self) -> Option<Arc<dyn Target>> {
        self.identity().target()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.vtbl.is_null() && self.identity.is_null()
    }
}
