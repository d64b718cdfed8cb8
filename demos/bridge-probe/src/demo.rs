//! A bridged gain stage with two interfaces, enough to watch the bridge work.

use std::any::Any;
use std::ffi::c_void;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use openvst3_abi::{tresult, FUnknownVTable, Interface, Tuid, FUNKNOWN_VTABLE_SLOTS, K_INVALID_ARG, K_RESULT_OK};
use openvst3_bridge::dispatch::init_funknown;
use openvst3_bridge::trampoline::{call_as, call_value};
use openvst3_bridge::{Capability, DisposeError, NativeInterface, RegistryBuilder, Target, VtableCell};

pub const GAIN: Capability = Capability::new("gain");
pub const BYPASS: Capability = Capability::new("bypass");

#[repr(C)]
pub struct IGainVtbl {
    pub unknown: FUnknownVTable,
    pub set_gain: unsafe extern "C" fn(this: *mut IGain, gain: f64) -> tresult,
    pub gain: unsafe extern "C" fn(this: *mut IGain) -> f64,
}

#[repr(C)]
pub struct IGain {
    pub vtbl: *const IGainVtbl,
}

impl Interface for IGain {
    const IID: Tuid = Tuid::from_parts(0x9A1E_6A11, 0x2C4D_4B7E, 0xA0F3_11D2, 0x5E6F_7081);
    const NAME: &'static str = "IGain";
}

static IGAIN_VTABLE: VtableCell = VtableCell::new();

impl NativeInterface for IGain {
    const VTABLE_SLOTS: usize = FUNKNOWN_VTABLE_SLOTS + 2;

    fn init_vtable(table: &mut [*const c_void]) {
        init_funknown(table);
        table[3] = gain_set as *const c_void;
        table[4] = gain_get as *const c_void;
    }

    fn vtable_cell() -> &'static VtableCell {
        &IGAIN_VTABLE
    }
}

unsafe extern "C" fn gain_set(this: *mut IGain, gain: f64) -> tresult {
    call_as::<IGain, GainStage, _>(this, "setGain", |stage| {
        if !(0.0..=4.0).contains(&gain) {
            return K_INVALID_ARG;
        }
        stage.gain.store(gain.to_bits(), Ordering::Relaxed);
        K_RESULT_OK
    })
}

unsafe extern "C" fn gain_get(this: *mut IGain) -> f64 {
    call_value(this, "getGain", 0.0, |target| {
        target
            .downcast_ref::<GainStage>()
            .map_or(0.0, |stage| f64::from_bits(stage.gain.load(Ordering::Relaxed)))
    })
}

#[repr(C)]
pub struct IBypassVtbl {
    pub unknown: FUnknownVTable,
    pub set_bypass: unsafe extern "C" fn(this: *mut IBypass, bypass: u8) -> tresult,
}

#[repr(C)]
pub struct IBypass {
    pub vtbl: *const IBypassVtbl,
}

impl Interface for IBypass {
    const IID: Tuid = Tuid::from_parts(0x9A1E_6A12, 0x2C4D_4B7E, 0xA0F3_11D2, 0x5E6F_7081);
    const NAME: &'static str = "IBypass";
}

static IBYPASS_VTABLE: VtableCell = VtableCell::new();

impl NativeInterface for IBypass {
    const VTABLE_SLOTS: usize = FUNKNOWN_VTABLE_SLOTS + 1;

    fn init_vtable(table: &mut [*const c_void]) {
        init_funknown(table);
        table[3] = bypass_set as *const c_void;
    }

    fn vtable_cell() -> &'static VtableCell {
        &IBYPASS_VTABLE
    }
}

unsafe extern "C" fn bypass_set(this: *mut IBypass, bypass: u8) -> tresult {
    call_as::<IBypass, GainStage, _>(this, "setBypass", |stage| {
        stage.bypass.store(bypass != 0, Ordering::Relaxed);
        K_RESULT_OK
    })
}

/// The bridged object.
pub struct GainStage {
    pub id: usize,
    gain: AtomicU64,
    bypass: AtomicBool,
}

impl GainStage {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            gain: AtomicU64::new(1.0_f64.to_bits()),
            bypass: AtomicBool::new(false),
        }
    }
}

impl Target for GainStage {
    fn supports(&self, capability: Capability) -> bool {
        capability == GAIN || capability == BYPASS
    }

    fn dispose(&self) -> Result<(), DisposeError> {
        tracing::info!(
            stage = self.id,
            gain = f64::from_bits(self.gain.load(Ordering::Relaxed)),
            bypass = self.bypass.load(Ordering::Relaxed),
            "gain stage released by host"
        );
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn register(builder: RegistryBuilder) -> RegistryBuilder {
    builder.expose::<IGain>(GAIN).expose::<IBypass>(BYPASS)
}
