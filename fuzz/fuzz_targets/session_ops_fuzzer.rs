//! Fuzz target for session behavior under arbitrary operation sequences
//!
//! # Strategy
//!
//! - Three sessions share one simulated relay
//! - Joins, sends, leaves, transport drops, relay outages, clock jumps and
//!   garbage frames in any order
//!
//! # Invariants
//!
//! - Own messages render once, even after their echo
//! - The roster is always exactly the last snapshot received
//! - Every transport opened while joined starts with `new-user`, `get-users`
//! - Nothing is written to a transport the relay has closed
//! - NEVER panic

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use parley_harness::{InvariantRegistry, Operation, World};

#[derive(Debug, Arbitrary)]
struct Scenario {
    seed: u64,
    ops: Vec<Operation>,
}

fuzz_target!(|scenario: Scenario| {
    let registry = InvariantRegistry::standard();
    let mut world = World::new(3, scenario.seed);

    for (step, op) in scenario.ops.iter().take(200).enumerate() {
        world.apply(op);
        registry.assert_all(&world.snapshot(), &format!("after step {step}: {op:?}"));
    }

    world.settle();
    registry.assert_all(&world.snapshot(), "after final settle");
});
