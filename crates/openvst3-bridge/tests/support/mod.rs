//! Sample interfaces, targets and host-side helpers shared by the
//! integration tests.
#![allow(dead_code)]

use std::any::Any;
use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use openvst3_abi::{
    tresult, FUnknown, FUnknownVTable, Interface, Tuid, FUNKNOWN_VTABLE_SLOTS, K_RESULT_OK,
};
use openvst3_bridge::dispatch::init_funknown;
use openvst3_bridge::trampoline::{call_as, call_managed, call_value};
use openvst3_bridge::{
    BridgeConfig, BridgeRegistry, CallEvent, Capability, Direction, DisposeError, InteropTracer,
    NativeInterface, RegistryBuilder, Target, VtableCell,
};

pub const COUNTER: Capability = Capability::new("counter");

// ----- ICounter --------------------------------------------------------------

#[repr(C)]
pub struct ICounterVtbl {
    pub unknown: FUnknownVTable,
    pub increment: unsafe extern "C" fn(this: *mut ICounter, delta: i32) -> tresult,
    pub value: unsafe extern "C" fn(this: *mut ICounter) -> i32,
    pub explode: unsafe extern "C" fn(this: *mut ICounter) -> tresult,
}

#[repr(C)]
pub struct ICounter {
    pub vtbl: *const ICounterVtbl,
}

impl Interface for ICounter {
    const IID: Tuid = Tuid::from_parts(0x7A1C_0001, 0x4E2B_9F10, 0x8C3D_5A6E, 0x0B1F_2D3C);
    const NAME: &'static str = "ICounter";
}

static ICOUNTER_VTABLE: VtableCell = VtableCell::new();

impl NativeInterface for ICounter {
    const VTABLE_SLOTS: usize = FUNKNOWN_VTABLE_SLOTS + 3;

    fn init_vtable(table: &mut [*const c_void]) {
        init_funknown(table);
        table[3] = counter_increment as *const c_void;
        table[4] = counter_value as *const c_void;
        table[5] = counter_explode as *const c_void;
    }

    fn vtable_cell() -> &'static VtableCell {
        &ICOUNTER_VTABLE
    }
}

unsafe extern "C" fn counter_increment(this: *mut ICounter, delta: i32) -> tresult {
    call_as::<ICounter, Counter, _>(this, "increment", |counter| {
        counter.value.fetch_add(delta, Ordering::SeqCst);
        K_RESULT_OK
    })
}

unsafe extern "C" fn counter_value(this: *mut ICounter) -> i32 {
    call_value(this, "value", -1, |target| {
        target
            .downcast_ref::<Counter>()
            .map_or(-1, |counter| counter.value.load(Ordering::SeqCst))
    })
}

unsafe extern "C" fn counter_explode(this: *mut ICounter) -> tresult {
    call_managed(this, "explode", |_| panic!("counter exploded"))
}

// ----- IReset (second interface mapped to the same capability) ----------------

#[repr(C)]
pub struct IResetVtbl {
    pub unknown: FUnknownVTable,
    pub reset: unsafe extern "C" fn(this: *mut IReset) -> tresult,
}

#[repr(C)]
pub struct IReset {
    pub vtbl: *const IResetVtbl,
}

impl Interface for IReset {
    const IID: Tuid = Tuid::from_parts(0x7A1C_0002, 0x4E2B_9F10, 0x8C3D_5A6E, 0x0B1F_2D3C);
    const NAME: &'static str = "IReset";
}

static IRESET_VTABLE: VtableCell = VtableCell::new();

impl NativeInterface for IReset {
    const VTABLE_SLOTS: usize = FUNKNOWN_VTABLE_SLOTS + 1;

    fn init_vtable(table: &mut [*const c_void]) {
        init_funknown(table);
        table[3] = reset_reset as *const c_void;
    }

    fn vtable_cell() -> &'static VtableCell {
        &IRESET_VTABLE
    }
}

unsafe extern "C" fn reset_reset(this: *mut IReset) -> tresult {
    call_as::<IReset, Counter, _>(this, "reset", |counter| {
        counter.value.store(0, Ordering::SeqCst);
        K_RESULT_OK
    })
}

// ----- Probe interfaces: FUnknown-only, one more than an object can hold ------

macro_rules! probe_interfaces {
    ($($name:ident = $index:expr;)*) => {
        $(
            #[repr(C)]
            pub struct $name {
                pub vtbl: *const FUnknownVTable,
            }

            impl Interface for $name {
                const IID: Tuid = Tuid::from_parts(0x5052_4F42, 0x4500_0000, 0, $index);
                const NAME: &'static str = stringify!($name);
            }

            impl NativeInterface for $name {
                const VTABLE_SLOTS: usize = FUNKNOWN_VTABLE_SLOTS;

                fn init_vtable(table: &mut [*const c_void]) {
                    init_funknown(table);
                }

                fn vtable_cell() -> &'static VtableCell {
                    static CELL: VtableCell = VtableCell::new();
                    &CELL
                }
            }
        )*

        /// IIDs of every probe interface, in declaration order.
        pub const PROBE_IIDS: &[Tuid] = &[$($name::IID),*];

        pub fn register_probes(builder: RegistryBuilder) -> RegistryBuilder {
            builder$(.register::<$name>())*
        }
    };
}

probe_interfaces! {
    IProbe00 = 0; IProbe01 = 1; IProbe02 = 2; IProbe03 = 3; IProbe04 = 4;
    IProbe05 = 5; IProbe06 = 6; IProbe07 = 7; IProbe08 = 8; IProbe09 = 9;
    IProbe10 = 10; IProbe11 = 11; IProbe12 = 12; IProbe13 = 13; IProbe14 = 14;
    IProbe15 = 15; IProbe16 = 16; IProbe17 = 17; IProbe18 = 18; IProbe19 = 19;
    IProbe20 = 20; IProbe21 = 21; IProbe22 = 22; IProbe23 = 23; IProbe24 = 24;
    IProbe25 = 25; IProbe26 = 26; IProbe27 = 27; IProbe28 = 28; IProbe29 = 29;
    IProbe30 = 30; IProbe31 = 31; IProbe32 = 32;
}

// ----- Targets ----------------------------------------------------------------

#[derive(Default)]
pub struct Counter {
    pub value: AtomicI32,
    pub disposed: AtomicUsize,
    pub fail_dispose: bool,
}

impl Counter {
    pub fn failing() -> Self {
        Self {
            fail_dispose: true,
            ..Self::default()
        }
    }

    pub fn disposed(&self) -> usize {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl Target for Counter {
    fn supports(&self, capability: Capability) -> bool {
        capability == COUNTER
    }

    fn dispose(&self) -> Result<(), DisposeError> {
        self.disposed.fetch_add(1, Ordering::SeqCst);
        if self.fail_dispose {
            return Err("counter refused to dispose".into());
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Supports no capability beyond `FUnknown`.
#[derive(Default)]
pub struct Plain {
    pub disposed: AtomicUsize,
}

impl Target for Plain {
    fn supports(&self, _capability: Capability) -> bool {
        false
    }

    fn dispose(&self) -> Result<(), DisposeError> {
        self.disposed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Returns the same allocation as a concrete and a bridged handle.
pub fn shared<T: Target>(value: T) -> (Arc<T>, Arc<dyn Target>) {
    let concrete = Arc::new(value);
    let target: Arc<dyn Target> = concrete.clone();
    (concrete, target)
}

// ----- Registries ---------------------------------------------------------------

pub const TEST_POOL_SIZE: usize = 4;

pub fn builder(config: BridgeConfig) -> RegistryBuilder {
    register_probes(
        RegistryBuilder::new(config)
            .expose::<ICounter>(COUNTER)
            .expose::<IReset>(COUNTER),
    )
}

/// A private registry with the sample interfaces and a small pool.
pub fn registry() -> &'static BridgeRegistry {
    builder(BridgeConfig::new().with_pool_size(TEST_POOL_SIZE)).build()
}

// ----- Host side ------------------------------------------------------------------

/// Calls `queryInterface` the way a native host would.
///
/// # Safety
/// `this` must be a live interface pointer.
pub unsafe fn host_query(this: *mut c_void, iid: &Tuid) -> (tresult, *mut c_void) {
    let unknown = this.cast::<FUnknown>();
    let mut out = ptr::null_mut();
    let result = ((*(*unknown).vtbl).query_interface)(unknown, iid, &mut out);
    (result, out)
}

/// # Safety
/// `this` must be a live interface pointer.
pub unsafe fn host_add_ref(this: *mut c_void) -> u32 {
    let unknown = this.cast::<FUnknown>();
    ((*(*unknown).vtbl).add_ref)(unknown)
}

/// # Safety
/// `this` must be a live interface pointer; it may not be used afterwards.
pub unsafe fn host_release(this: *mut c_void) -> u32 {
    let unknown = this.cast::<FUnknown>();
    ((*(*unknown).vtbl).release)(unknown)
}

// ----- Tracing ----------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    Query {
        direction: Direction,
        iid: Tuid,
        name: Option<String>,
        implemented: bool,
    },
    Enter {
        interface: String,
        method: String,
    },
    Exit {
        interface: String,
        method: String,
        result: tresult,
    },
}

#[derive(Default)]
pub struct RecordingTracer {
    events: Mutex<Vec<Recorded>>,
}

impl RecordingTracer {
    pub fn events(&self) -> Vec<Recorded> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: Recorded) {
        self.events.lock().unwrap().push(event);
    }
}

impl InteropTracer for RecordingTracer {
    fn query_interface(&self, direction: Direction, iid: &Tuid, known_name: Option<&str>, implemented: bool) {
        self.push(Recorded::Query {
            direction,
            iid: *iid,
            name: known_name.map(str::to_owned),
            implemented,
        });
    }

    fn enter(&self, event: &CallEvent<'_>) {
        self.push(Recorded::Enter {
            interface: event.interface.to_owned(),
            method: event.method.to_owned(),
        });
    }

    fn exit(&self, event: &CallEvent<'_>, result: tresult) {
        self.push(Recorded::Exit {
            interface: event.interface.to_owned(),
            method: event.method.to_owned(),
            result,
        });
    }
}
