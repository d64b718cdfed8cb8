//! Process-wide bridge state: which Rust objects are bound to which identity
//! objects, the pool of retired identity objects, and the interface tables
//! populated once at startup.
//!
//! Registries live for the rest of the process once built ("init once, no
//! teardown"). Most programs install one as the global registry; tests build
//! private ones.

use std::collections::HashMap;
use std::ptr::NonNull;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use openvst3_abi::{FUnknown, Tuid};

use crate::capability::{Capability, CapabilityEntry, CapabilityTable, VtableFn};
use crate::config::{BridgeConfig, TraceEvents};
use crate::error::{BridgeError, Result};
use crate::identity::IdentityObject;
use crate::target::Target;
use crate::trace::{Direction, InteropTracer, LogTracer};
use crate::vtable::{self, NativeInterface, Vtable};

static GLOBAL: OnceLock<&'static BridgeRegistry> = OnceLock::new();

#[derive(Clone, Copy)]
struct VtableEntry {
    name: &'static str,
    slots: usize,
    vtable: VtableFn,
}

#[derive(Default)]
struct RegistryState {
    /// Bound targets, keyed by the address of the shared allocation.
    bound: HashMap<usize, &'static IdentityObject>,
    /// Retired identity objects, reused LIFO.
    pool: Vec<&'static IdentityObject>,
    allocated: usize,
}

/// Collects interface registrations before the registry is frozen.
pub struct RegistryBuilder {
    config: BridgeConfig,
    tracer: Option<Arc<dyn InteropTracer>>,
    vtables: HashMap<Tuid, VtableEntry>,
    capabilities: CapabilityTable,
}

impl RegistryBuilder {
    /// A builder that already knows `FUnknown`.
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            tracer: None,
            vtables: HashMap::new(),
            capabilities: CapabilityTable::new(),
        }
        .expose::<FUnknown>(Capability::UNKNOWN)
    }

    /// Makes `I`'s vtable available by IID, without making it discoverable
    /// through host queries.
    pub fn register<I: NativeInterface>(mut self) -> Self {
        let entry = VtableEntry {
            name: I::NAME,
            slots: I::VTABLE_SLOTS,
            vtable: vtable::vtable::<I>,
        };
        if let Some(previous) = self.vtables.insert(I::IID, entry) {
            if previous.name != I::NAME {
                tracing::warn!(iid = %I::IID, previous = previous.name, current = I::NAME, "interface IID registered twice");
            }
        }
        self
    }

    /// Registers `I` and lets hosts obtain it from any target that supports
    /// `capability`.
    pub fn expose<I: NativeInterface>(mut self, capability: Capability) -> Self {
        self = self.register::<I>();
        self.capabilities.insert(
            I::IID,
            CapabilityEntry {
                capability,
                vtable: vtable::vtable::<I>,
            },
        );
        self
    }

    pub fn tracer(mut self, tracer: Arc<dyn InteropTracer>) -> Self {
        self.tracer = Some(tracer);
        self
    }

    /// Freezes the tables and pre-fills the pool.
    pub fn build(self) -> &'static BridgeRegistry {
        let tracer = match self.tracer {
            Some(tracer) => Some(tracer),
            None if !self.config.trace.is_empty() => Some(Arc::new(LogTracer) as Arc<dyn InteropTracer>),
            None => None,
        };
        let registry: &'static BridgeRegistry = Box::leak(Box::new(BridgeRegistry {
            config: self.config,
            tracer,
            vtables: self.vtables,
            capabilities: self.capabilities,
            state: Mutex::new(RegistryState::default()),
        }));

        {
            let mut state = registry.state();
            for _ in 0..registry.config.initial_pool_size {
                state.pool.push(IdentityObject::allocate(registry));
            }
            state.allocated = state.pool.len();
        }

        tracing::debug!(
            interfaces = registry.vtables.len(),
            capabilities = registry.capabilities.len(),
            pool = registry.config.initial_pool_size,
            "bridge registry built"
        );
        registry
    }

    /// Builds and installs the process-wide registry.
    ///
    /// Fails if a global registry already exists, including one created
    /// implicitly by [`BridgeRegistry::global`].
    pub fn install(self) -> Result<&'static BridgeRegistry> {
        let mut builder = Some(self);
        let registry = *GLOBAL.get_or_init(|| match builder.take() {
            Some(builder) => builder.build(),
            None => unreachable!("builder consumed twice"),
        });
        match builder {
            None => Ok(registry),
            Some(_) => Err(BridgeError::AlreadyInstalled),
        }
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new(BridgeConfig::default())
    }
}

pub struct BridgeRegistry {
    config: BridgeConfig,
    tracer: Option<Arc<dyn InteropTracer>>,
    vtables: HashMap<Tuid, VtableEntry>,
    capabilities: CapabilityTable,
    state: Mutex<RegistryState>,
}

impl BridgeRegistry {
    pub fn builder(config: BridgeConfig) -> RegistryBuilder {
        RegistryBuilder::new(config)
    }

    /// The installed registry, or a default one (only `FUnknown`, config from
    /// the environment) if nothing was installed.
    pub fn global() -> &'static BridgeRegistry {
        *GLOBAL.get_or_init(|| RegistryBuilder::new(BridgeConfig::from_env()).build())
    }

    pub fn try_global() -> Option<&'static BridgeRegistry> {
        GLOBAL.get().copied()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn capabilities(&self) -> &CapabilityTable {
        &self.capabilities
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        // The state stays consistent across a panic: every mutation is a
        // single map or vector operation.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the identity object for `target`, binding a pooled one if the
    /// target is not bound yet. Takes no reference.
    pub fn bind(&'static self, target: &Arc<dyn Target>) -> &'static IdentityObject {
        let mut state = self.state();
        self.bind_locked(&mut state, target)
    }

    fn bind_locked(&'static self, state: &mut RegistryState, target: &Arc<dyn Target>) -> &'static IdentityObject {
        let key = target_key(target);
        if let Some(identity) = state.bound.get(&key).copied() {
            return identity;
        }

        let identity = match state.pool.pop() {
            Some(identity) => identity,
            None => {
                state.allocated += 1;
                tracing::debug!(allocated = state.allocated, "identity pool empty, allocating");
                IdentityObject::allocate(self)
            }
        };
        identity.lock().target = Some(Arc::clone(target));
        state.bound.insert(key, identity);
        tracing::trace!(identity = ?(identity as *const IdentityObject), bound = state.bound.len(), "bound target");
        identity
    }

    /// Identity object currently bound to `target`, if any.
    pub fn identity_of(&self, target: &Arc<dyn Target>) -> Option<&'static IdentityObject> {
        self.state().bound.get(&target_key(target)).copied()
    }

    /// Retires an identity object whose reference count just reached zero
    /// while bound to the target with key `expected`.
    pub(crate) fn unbind(&self, identity: &'static IdentityObject, expected: usize) {
        let retired = {
            let mut state = self.state();
            self.unbind_locked(&mut state, identity, expected)
        };
        // Dropped outside both locks: the target's destructor may call back into the bridge.
        drop(retired);
    }

    fn unbind_locked(
        &self,
        state: &mut RegistryState,
        identity: &'static IdentityObject,
        expected: usize,
    ) -> Option<Arc<dyn Target>> {
        let mut object = identity.lock();
        if object.ref_count != 0 {
            tracing::warn!(
                ref_count = object.ref_count,
                "identity object referenced again before it could be retired"
            );
            return None;
        }
        // Someone else already retired it, and it may have been rebound since.
        if object.target.as_ref().map(target_key) != Some(expected) {
            return None;
        }
        let target = object.target.take()?;
        identity.reset(&mut object);
        drop(object);

        state.bound.remove(&target_key(&target));
        state.pool.push(identity);
        tracing::trace!(identity = ?(identity as *const IdentityObject), pooled = state.pool.len(), "returned identity object to pool");
        Some(target)
    }

    /// Binds `target` and returns its `I` interface pointer with one reference
    /// taken, ready to hand to a host.
    pub fn export<I: NativeInterface>(&'static self, target: &Arc<dyn Target>) -> Result<NonNull<I>> {
        let (result, retired) = {
            let mut state = self.state();
            let identity = self.bind_locked(&mut state, target);
            let result = identity.query::<I>();
            // Nothing was handed out; do not leave the binding behind.
            let retired = match &result {
                Err(_) if identity.ref_count() == 0 => self.unbind_locked(&mut state, identity, target_key(target)),
                _ => None,
            };
            (result, retired)
        };
        drop(retired);
        result
    }

    /// The cached vtable for `iid`, built on first use.
    pub fn vtable_for(&self, iid: &Tuid) -> Option<&'static Vtable> {
        self.vtables.get(iid).map(|entry| (entry.vtable)())
    }

    /// Registered name of `iid`.
    pub fn interface_name(&self, iid: &Tuid) -> Option<&'static str> {
        self.vtables.get(iid).map(|entry| entry.name)
    }

    /// Declared vtable length of `iid`.
    pub fn interface_slots(&self, iid: &Tuid) -> Option<usize> {
        self.vtables.get(iid).map(|entry| entry.slots)
    }

    pub fn registered_interfaces(&self) -> Vec<(Tuid, &'static str)> {
        let mut list: Vec<_> = self.vtables.iter().map(|(iid, entry)| (*iid, entry.name)).collect();
        list.sort_by_key(|(_, name)| *name);
        list
    }

    /// Snapshot of every bound identity object.
    pub fn alive_objects(&self) -> Vec<&'static IdentityObject> {
        self.state().bound.values().copied().collect()
    }

    pub fn pooled_count(&self) -> usize {
        self.state().pool.len()
    }

    pub fn bound_count(&self) -> usize {
        self.state().bound.len()
    }

    /// Identity objects ever allocated by this registry.
    pub fn allocated_count(&self) -> usize {
        self.state().allocated
    }

    /// Tracer for `events`, when any of them is enabled.
    pub(crate) fn tracer(&self, events: TraceEvents) -> Option<&dyn InteropTracer> {
        if self.config.trace.intersects(events) {
            self.tracer.as_deref()
        } else {
            None
        }
    }

    pub(crate) fn trace_query(&self, direction: Direction, iid: &Tuid, implemented: bool) {
        let events = match direction {
            Direction::HostToPlugin => TraceEvents::HOST_QUERIES,
            Direction::PluginToHost => TraceEvents::PLUGIN_QUERIES,
        };
        if let Some(tracer) = self.tracer(events) {
            tracer.query_interface(direction, iid, self.interface_name(iid), implemented);
        }
    }
}

impl std::fmt::Debug for BridgeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeRegistry")
            .field("config", &self.config)
            .field("interfaces", &self.vtables.len())
            .field("capabilities", &self.capabilities.len())
            .finish_non_exhaustive()
    }
}

pub(crate) fn target_key(target: &Arc<dyn Target>) -> usize {
    Arc::as_ptr(target) as *const () as usize
}
