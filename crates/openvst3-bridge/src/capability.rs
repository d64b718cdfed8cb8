//! Which Rust capability a target must have before the bridge hands a host
//! a given native interface.

use std::collections::HashMap;

use openvst3_abi::Tuid;

use crate::target::Target;
use crate::vtable::Vtable;

/// A named Rust-side capability, e.g. "audio processor" or "edit controller".
///
/// Several native interfaces may map to one capability (every revision of a
/// factory interface maps to the same factory capability).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capability(&'static str);

impl Capability {
    /// Granted to every bound target; used for `FUnknown`.
    pub const UNKNOWN: Capability = Capability("FUnknown");

    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub const fn name(&self) -> &'static str {
        self.0
    }
}

/// Produces the (lazily built) vtable for one interface type.
pub type VtableFn = fn() -> &'static Vtable;

#[derive(Clone, Copy)]
pub struct CapabilityEntry {
    pub capability: Capability,
    pub vtable: VtableFn,
}

impl CapabilityEntry {
    /// Whether `target` may be presented through this entry's interface.
    pub fn grants(&self, target: &dyn Target) -> bool {
        self.capability == Capability::UNKNOWN || target.supports(self.capability)
    }
}

/// GUID → capability map consulted by the host-facing `queryInterface`.
///
/// Distinct from the registry's vtable map: an interface can be registered
/// (so plugin code may hand it out explicitly) without being discoverable by
/// host queries.
#[derive(Default, Clone)]
pub struct CapabilityTable {
    entries: HashMap<Tuid, CapabilityEntry>,
}

impl CapabilityTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, iid: Tuid, entry: CapabilityEntry) -> Option<CapabilityEntry> {
        self.entries.insert(iid, entry)
    }

    pub fn lookup(&self, iid: &Tuid) -> Option<&CapabilityEntry> {
        self.entries.get(iid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iids(&self) -> impl Iterator<Item = &Tuid> {
        self.entries.keys()
    }
}
