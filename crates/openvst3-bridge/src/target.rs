use std::any::Any;

use crate::capability::Capability;
use crate::error::DisposeError;

/// A Rust object exposed to native callers through the bridge.
///
/// Identity is by allocation: two `Arc`s pointing at the same object bind to
/// the same [`IdentityObject`](crate::IdentityObject).
pub trait Target: Any + Send + Sync {
    /// Whether this object implements the Rust side of `capability`.
    ///
    /// Consulted every time a host asks for an interface mapped to it, so the
    /// answer must not change while the object is bound.
    fn supports(&self, capability: Capability) -> bool;

    /// Called once when the last native reference is released, before the
    /// identity object returns to the pool.
    fn dispose(&self) -> Result<(), DisposeError> {
        Ok(())
    }

    fn as_any(&self) -> &dyn Any;
}

impl dyn Target {
    pub fn downcast_ref<T: Target>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn is<T: Target>(&self) -> bool {
        self.as_any().is::<T>()
    }
}
