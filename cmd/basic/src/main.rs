//! Basic uthread example
//!
//! Spawns a handful of threads under the configured policy. One of them
//! installs a notification handler and gets poked from another OS thread.
//!
//! # Environment Variables
//!
//! - `UTH_POLICY=<name>` - default, hrrn, priority-rr, dm, edf-cbs
//! - `UTH_QUANTUM=<n>` - Priority-RR quantum
//! - `UTH_THREADS=<n>` - Worker threads to spawn (default: 3)
//! - `UTH_UNITS=<n>` - Units of work per thread (default: 3)
//! - `UTH_LOG_LEVEL=debug` - Set log level (off, error, warn, info, debug, trace)
//! - `UTH_FLUSH_EPRINT=1` - Flush debug output immediately

use std::cell::Cell;
use std::rc::Rc;

use uthread::{env_get, kdebug, kinfo};
use uthread::{
    register_handler, spawn, yield_now, Notifier, Runtime, RuntimeConfig, SchedParams, VirtualClock,
};

/// A listener installs a handler, has another OS thread notify it, and
/// then spawns a child, which inherits the handler.
fn listener(notified: Rc<Cell<u32>>, notifier: Notifier) -> impl FnOnce() + 'static {
    move || {
        let seen = notified.clone();
        register_handler(0, move |tag| {
            kinfo!("notification {} delivered to thread {:?}", tag, uthread::current_id());
            seen.set(seen.get() + 1);
        })
        .unwrap_or_else(|e| panic!("register_handler failed: {}", e));

        // delivery happens at the next dispatch of this thread
        if let Some(me) = uthread::current_id() {
            std::thread::spawn(move || notifier.post(me, 0))
                .join()
                .unwrap_or_else(|_| panic!("notifier thread panicked"));
        }
        while notified.get() == 0 {
            yield_now();
        }
        spawn(SchedParams::new(1), || kinfo!("child of the listener ran"))
            .unwrap_or_else(|e| panic!("spawn failed: {}", e));
    }
}

// UTH_POLICY=priority-rr UTH_LOG_LEVEL=debug cargo run -p uthread-basic
fn main() {
    println!("=== uthread Basic Example ===\n");

    let threads: u32 = env_get("UTH_THREADS", 3);
    let units: i64 = env_get("UTH_UNITS", 3);

    let config = RuntimeConfig::from_env();
    config.print();

    let mut runtime = match Runtime::new(config) {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    let completed = Rc::new(Cell::new(0u32));
    let notified = Rc::new(Cell::new(0u32));

    for i in 1..=threads {
        let c = completed.clone();
        let params = SchedParams::new(units).priority((i % 2) as i32);
        let h = runtime
            .spawn(params, move || {
                kdebug!("[thread {}] started", i);
                for j in 0..units {
                    kdebug!("[thread {}] unit {} at t={:?}", i, j, uthread::now());
                    yield_now();
                }
                kdebug!("[thread {}] finished", i);
                c.set(c.get() + 1);
            })
            .unwrap_or_else(|e| panic!("spawn failed: {}", e));
        println!("Spawned thread {} (ID={})", i, h.id());
    }

    let notifier = runtime.notifier();
    runtime
        .spawn(SchedParams::new(1), listener(notified.clone(), notifier))
        .unwrap_or_else(|e| panic!("spawn failed: {}", e));

    println!("\nRunning {} threads under {}...\n", threads + 1, runtime.policy());
    match runtime.run(&mut VirtualClock::new()) {
        Ok(report) => {
            println!(
                "decisions: {}, busy: {}, idle: {}, finished at t={}",
                report.decisions, report.busy, report.idle, report.end_time
            );
        }
        Err(e) => println!("run stopped: {}", e),
    }

    kinfo!("{} thread(s) completed, {} notification(s) handled", completed.get(), notified.get());
    println!("\n=== Example Complete ===");
}
