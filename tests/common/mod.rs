#![allow(dead_code)]
//! Shared integration test utilities.
//!
//! Import with:
//! ```ignore
//! mod common;
//! use common::*;
//! ```

use soliton::{EventLoop, VirtualClock};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Once;

static INIT_LOGGING: Once = Once::new();

/// Initializes a tracing subscriber once per test binary; controlled by
/// `RUST_LOG` and harmless when the crate's logging feature is off.
pub fn init_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// An event loop on a virtual clock, plus the clock for time assertions.
pub fn lab_loop() -> (EventLoop, Rc<VirtualClock>) {
    init_logging();
    let clock = Rc::new(VirtualClock::new());
    let event_loop = EventLoop::with_clock(clock.clone());
    (event_loop, clock)
}

/// A shared append-only log for asserting execution order across tasks.
pub fn shared_log<T>() -> Rc<RefCell<Vec<T>>> {
    Rc::new(RefCell::new(Vec::new()))
}
