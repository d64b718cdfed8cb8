mod demo;

use std::ptr;
use std::sync::Arc;

use clap::Parser;
use demo::{GainStage, IBypass, IGain};
use openvst3_abi::{result_name, FUnknown, Interface, Tuid, K_RESULT_OK};
use openvst3_bridge::{BridgeConfig, BridgeRegistry, Target, TraceEvents};
use tracing::Level;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Interface to query on the exported object (32 hex digits or a dashed UUID). Repeatable.
    #[arg(long, value_name = "HEX32|UUID")]
    iid: Vec<String>,

    /// Query every interface the registry knows
    #[arg(long)]
    all: bool,

    /// Export/release cycles to run; later rounds reuse pooled objects
    #[arg(long, default_value_t = 1)]
    rounds: usize,

    /// Report every interop event (queries in both directions, calls)
    #[arg(long)]
    trace: bool,
}

fn main() {
    let args = Args::parse();

    let level = if args.trace { Level::TRACE } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    let mut iids = Vec::new();
    for text in &args.iid {
        match Tuid::parse(text) {
            Ok(iid) => iids.push(iid),
            Err(e) => {
                eprintln!("iid parse error ({text}): {e}");
                std::process::exit(2);
            }
        }
    }

    let mut config = BridgeConfig::from_env();
    if args.trace {
        config = config.with_trace(TraceEvents::all());
    }
    let registry = match demo::register(BridgeRegistry::builder(config)).install() {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("registry error: {e}");
            std::process::exit(3);
        }
    };
    if args.all {
        iids.extend(registry.registered_interfaces().into_iter().map(|(iid, _)| iid));
    }

    for round in 0..args.rounds {
        let target: Arc<dyn Target> = Arc::new(GainStage::new(round));
        let gain = match registry.export::<IGain>(&target) {
            Ok(ptr) => ptr.as_ptr(),
            Err(e) => {
                eprintln!("export error: {e}");
                std::process::exit(4);
            }
        };
        // The registry keeps the object alive until the host lets go.
        drop(target);

        // Everything below is what a native host does with the pointer.
        unsafe {
            let vtbl = &*(*gain).vtbl;
            let rc = (vtbl.set_gain)(gain, 0.5 + round as f64 * 0.25);
            println!("round {round}: setGain -> {}", result_name(rc));
            println!("round {round}: getGain = {:.2}", (vtbl.gain)(gain));

            let unknown = gain.cast::<FUnknown>();
            for iid in &iids {
                let mut out = ptr::null_mut();
                let rc = ((*(*unknown).vtbl).query_interface)(unknown, iid, &mut out);
                let name = registry.interface_name(iid).unwrap_or("<unknown>");
                println!("round {round}: queryInterface {name:<10} {iid} -> {}", result_name(rc));
                if rc != K_RESULT_OK {
                    continue;
                }
                if *iid == IBypass::IID {
                    let bypass = out.cast::<IBypass>();
                    let rc = ((*(*bypass).vtbl).set_bypass)(bypass, 1);
                    println!("round {round}: setBypass -> {}", result_name(rc));
                }
                let obtained = out.cast::<FUnknown>();
                ((*(*obtained).vtbl).release)(obtained);
            }

            let remaining = ((*(*unknown).vtbl).release)(unknown);
            println!("round {round}: release -> {remaining}");
        }

        println!(
            "round {round}: alive={} pooled={} allocated={}",
            registry.alive_objects().len(),
            registry.pooled_count(),
            registry.allocated_count()
        );
    }
}
