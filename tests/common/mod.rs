#![allow(dead_code)]
#![allow(unused_imports)]
//! Shared integration test utilities.
//!
//! Import with:
//! ```
//! mod common;
//! use common::*;
//! ```

use abb::{implement, Block, Cancel, LabLoop, Resolver, Result};
use proptest::prelude::ProptestConfig;
use proptest::test_runner::RngSeed;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Once;
use tracing_subscriber::fmt::format::FmtSpan;

static INIT_LOGGING: Once = Once::new();

/// Default seed for property tests when running under CI.
pub const DEFAULT_PROPTEST_SEED: u64 = 0x5EED_5EED;

const PROPTEST_SEED_ENV: &str = "ABB_PROPTEST_SEED";

/// Build a ProptestConfig with deterministic seed support for CI.
#[must_use]
pub fn test_proptest_config(cases: u32) -> ProptestConfig {
    let mut config = ProptestConfig::with_cases(cases);
    if matches!(config.rng_seed, RngSeed::Random) {
        if let Some(seed) = read_proptest_seed() {
            config.rng_seed = RngSeed::Fixed(seed);
        }
    }
    config
}

fn read_proptest_seed() -> Option<u64> {
    if let Ok(value) = std::env::var(PROPTEST_SEED_ENV) {
        return value.parse::<u64>().ok();
    }

    // If CI is set and no explicit seed is provided, use a fixed seed.
    if std::env::var("CI").is_ok() {
        return Some(DEFAULT_PROPTEST_SEED);
    }

    None
}

/// Initialize test logging with trace-level output.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::TRACE);
}

/// Initialize test logging with a custom level.
pub fn init_test_logging_with_level(level: tracing::Level) {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(false)
            .try_init();
    });
}

/// Create a lab loop with test logging enabled.
#[must_use]
pub fn test_lab() -> LabLoop {
    init_test_logging();
    LabLoop::new()
}

/// Outcome slot filled once the captured Block fires.
pub type Captured<T> = Rc<RefCell<Option<Result<T>>>>;

/// Pipes `block` into a slot holding its outcome.
pub fn capture<T: 'static>(block: Block<T>) -> Captured<T> {
    let slot: Captured<T> = Rc::new(RefCell::new(None));
    let (ok, err) = (Rc::clone(&slot), Rc::clone(&slot));
    let _sink: Block<()> = block.pipe(
        move |value| {
            *ok.borrow_mut() = Some(Ok(value));
        },
        move |reason| {
            *err.borrow_mut() = Some(Err(reason));
        },
    );
    slot
}

/// A Block that never settles and counts how often it is cancelled.
pub fn pending<T: 'static>(cancelled: &Rc<Cell<u32>>) -> Block<T> {
    let counter = Rc::clone(cancelled);
    implement(move |_resolver: Resolver<T>| {
        Cancel::from_fn(move || counter.set(counter.get() + 1))
    })
}

/// A Block settled later through the returned resolver.
pub fn deferred<T: 'static>() -> (Block<T>, Resolver<T>) {
    let slot = Rc::new(RefCell::new(None));
    let keep = Rc::clone(&slot);
    let block = implement(move |resolver: Resolver<T>| {
        *keep.borrow_mut() = Some(resolver);
    });
    let resolver = slot
        .borrow_mut()
        .take()
        .expect("starter runs synchronously");
    (block, resolver)
}

/// Log a test phase transition with a visual separator.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(phase = %$name, "========================================");
        tracing::info!(phase = %$name, "TEST PHASE: {}", $name);
        tracing::info!(phase = %$name, "========================================");
    };
}

/// Log test completion with summary.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = %$name, "test completed successfully: {}", $name);
    };
}
