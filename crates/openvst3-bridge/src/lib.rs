//! Native object bridge for VST3-style COM interfaces.
//!
//! Rust objects ([`Target`]s) are handed to native hosts as interface
//! pointers. Every pointer belongs to an [`IdentityObject`] that carries one
//! reference count for all of the object's interfaces and answers
//! `queryInterface` by GUID. Identity objects are pooled and never freed, so a
//! stale pointer at worst reaches a recycled object, never freed memory.
//!
//! ```ignore
//! let registry = BridgeRegistry::builder(BridgeConfig::default())
//!     .expose::<IMyInterface>(Capability::new("my-capability"))
//!     .install()?;
//! let target: Arc<dyn Target> = Arc::new(MyObject::default());
//! let ptr = registry.export::<IMyInterface>(&target)?;
//! ```

pub mod capability;
pub mod com_ptr;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod identity;
pub mod registry;
pub mod slot;
mod spin;
pub mod target;
pub mod trace;
pub mod trampoline;
pub mod vtable;

use std::ptr::NonNull;
use std::sync::Arc;

pub use openvst3_abi as abi;

pub use capability::{Capability, CapabilityEntry, CapabilityTable};
pub use com_ptr::ComPtr;
pub use config::{BridgeConfig, TraceEvents};
pub use error::{BridgeError, DisposeError, Result};
pub use identity::{IdentityObject, MAX_INTERFACES_PER_OBJECT};
pub use registry::{BridgeRegistry, RegistryBuilder};
pub use slot::InterfaceSlot;
pub use target::Target;
pub use trace::{CallEvent, Direction, InteropTracer, LogTracer};
pub use vtable::{vtable, NativeInterface, Vtable, VtableCell};

/// Exports `target` as interface `I` through the process-wide registry.
pub fn export<I: NativeInterface>(target: &Arc<dyn Target>) -> Result<NonNull<I>> {
    BridgeRegistry::global().export::<I>(target)
}
