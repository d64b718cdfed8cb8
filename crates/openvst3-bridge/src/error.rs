use openvst3_abi::Tuid;
use thiserror::Error;

/// Error returned by a target's disposal hook.
pub type DisposeError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum BridgeError {
    /// One object tried to present more distinct interfaces than it has slots.
    /// Not recoverable: the capability table or the host is misbehaving.
    #[error("cannot expose more than {capacity} interfaces from one object")]
    CapacityExceeded { capacity: usize },
    #[error("interface {0} is not registered with the bridge")]
    UnknownInterface(Tuid),
    #[error("identity object is not bound to a target")]
    Unbound,
    #[error("bridge registry is already installed")]
    AlreadyInstalled,
    #[error("target disposal failed: {0}")]
    Dispose(#[source] DisposeError),
}

pub type Result<T, E = BridgeError> = std::result::Result<T, E>;
