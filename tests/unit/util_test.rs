//! Tests for utility functions

use std::time::{Duration, Instant};

use txn_engine::util::{elapsed_ms, init_tracing, init_tracing_with, now_ms};

#[test]
fn test_now_ms_monotone_enough() {
    let a = now_ms();
    std::thread::sleep(Duration::from_millis(2));
    assert!(now_ms() >= a);
}

#[test]
fn test_elapsed_ms_zero_for_now() {
    assert!(elapsed_ms(Instant::now()) < 1000);
}

#[test]
fn test_init_tracing_is_repeatable() {
    init_tracing_with("debug");
    init_tracing();
    tracing::info!("still logging");
}
