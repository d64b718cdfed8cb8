//! Per-interface vtable caches.
//!
//! Each interface type owns one static [`VtableCell`]. The first caller builds
//! the table through the interface's initializer; every other caller, on any
//! thread, blocks until that build finishes and then reads the same immutable
//! table for the rest of the process.

use std::ffi::c_void;
use std::ptr;
use std::sync::OnceLock;

use openvst3_abi::{Interface, Tuid, FUNKNOWN_VTABLE_SLOTS};

/// Contract met by generated interface definitions.
///
/// `init_vtable` receives a table of exactly `VTABLE_SLOTS` null entries and
/// must fill every one with an `extern "C"` function taking the interface
/// pointer first. The first three entries are the `FUnknown` methods, which
/// [`init_funknown`](crate::dispatch::init_funknown) provides.
pub trait NativeInterface: Interface + 'static {
    const VTABLE_SLOTS: usize;

    fn init_vtable(table: &mut [*const c_void]);

    /// The static cache for this interface, usually a `static` declared next
    /// to the implementation.
    fn vtable_cell() -> &'static VtableCell;
}

/// A built function-pointer table. Never mutated after construction.
pub struct Vtable {
    iid: Tuid,
    name: &'static str,
    entries: Box<[*const c_void]>,
}

// SAFETY: entries are code addresses written once before the table is
// published through `OnceLock` and never written again.
unsafe impl Send for Vtable {}
// SAFETY: as above.
unsafe impl Sync for Vtable {}

impl Vtable {
    fn build<I: NativeInterface>() -> Self {
        assert!(
            I::VTABLE_SLOTS >= FUNKNOWN_VTABLE_SLOTS,
            "{} declares {} vtable slots, fewer than FUnknown",
            I::NAME,
            I::VTABLE_SLOTS
        );
        let mut entries = vec![ptr::null::<c_void>(); I::VTABLE_SLOTS].into_boxed_slice();
        I::init_vtable(&mut entries);

        let missing = entries.iter().filter(|entry| entry.is_null()).count();
        if missing > 0 {
            tracing::error!(interface = I::NAME, missing, "vtable initializer left null entries");
        }
        debug_assert_eq!(missing, 0, "{} vtable has null entries", I::NAME);

        tracing::debug!(interface = I::NAME, iid = %I::IID, slots = I::VTABLE_SLOTS, "built vtable");
        Self {
            iid: I::IID,
            name: I::NAME,
            entries,
        }
    }

    #[inline]
    pub fn iid(&self) -> Tuid {
        self.iid
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Address stored in an interface slot's vtable field.
    #[inline]
    pub fn as_ptr(&self) -> *const c_void {
        self.entries.as_ptr().cast()
    }

    pub fn entries(&self) -> &[*const c_void] {
        &self.entries
    }
}

/// One-time-initialized storage for an interface's [`Vtable`].
pub struct VtableCell {
    cell: OnceLock<Vtable>,
}

impl VtableCell {
    pub const fn new() -> Self {
        Self { cell: OnceLock::new() }
    }

    /// Returns the table, building it if this is the first request.
    pub fn get_or_build<I: NativeInterface>(&self) -> &Vtable {
        self.cell.get_or_init(Vtable::build::<I>)
    }

    pub fn is_built(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl Default for VtableCell {
    fn default() -> Self {
        Self::new()
    }
}

/// The process-wide vtable of `I`.
pub fn vtable<I: NativeInterface>() -> &'static Vtable {
    I::vtable_cell().get_or_build::<I>()
}
