//! The process-wide registry. Kept in its own test binary: installation is
//! one-shot per process.

mod support;

use std::ptr;
use std::sync::Arc;

use openvst3_abi::{FUnknown, Interface};
use openvst3_bridge::{BridgeConfig, BridgeError, BridgeRegistry, ComPtr, Direction, TraceEvents};
use support::*;

#[test]
fn install_export_and_wrap() {
    assert!(BridgeRegistry::try_global().is_none());

    let tracer = Arc::new(RecordingTracer::default());
    let installed = builder(BridgeConfig::new().with_trace(TraceEvents::PLUGIN_QUERIES))
        .tracer(tracer.clone())
        .install()
        .unwrap();
    assert!(ptr::eq(installed, BridgeRegistry::global()));
    assert!(matches!(
        builder(BridgeConfig::new()).install(),
        Err(BridgeError::AlreadyInstalled)
    ));

    let (counter, target) = shared(Counter::default());
    let raw = openvst3_bridge::export::<ICounter>(&target).unwrap();
    // SAFETY: `export` handed us one reference, which the wrapper now owns.
    let counter_ptr = unsafe { ComPtr::from_raw(raw.as_ptr()) }.unwrap();

    let unknown = counter_ptr.query::<FUnknown>().unwrap();
    let copy = counter_ptr.clone();
    let identity = installed.identity_of(&target).unwrap();
    assert_eq!(identity.ref_count(), 3);
    assert!(counter_ptr.query::<IProbe00>().is_none());

    // SAFETY: `copy` keeps the object alive for the call.
    unsafe { ((*copy.vtbl).increment)(copy.as_ptr(), 4) };
    assert_eq!(counter.value.load(std::sync::atomic::Ordering::SeqCst), 4);

    drop(unknown);
    drop(copy);
    assert_eq!(counter.disposed(), 0);
    drop(counter_ptr);
    assert_eq!(counter.disposed(), 1);
    assert!(installed.identity_of(&target).is_none());

    let queries: Vec<_> = tracer
        .events()
        .into_iter()
        .filter_map(|event| match event {
            Recorded::Query {
                direction: Direction::PluginToHost,
                iid,
                implemented,
                ..
            } => Some((iid, implemented)),
            _ => None,
        })
        .collect();
    assert_eq!(queries, vec![(FUnknown::IID, true), (IProbe00::IID, false)]);
}
