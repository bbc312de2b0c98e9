//! Property tests over random operation sequences.
//!
//! Several sessions share one simulated relay. Random joins, sends, leaves,
//! transport drops, relay outages and clock jumps are applied, and the
//! standard invariants are checked after every step.

use parley_core::ConnectionState;
use parley_harness::{ClientId, InvariantRegistry, Operation, SmallText, World};
use proptest::prelude::*;

const CLIENTS: u8 = 3;

fn text() -> impl Strategy<Value = SmallText> {
    (any::<u8>(), any::<u8>()).prop_map(|(seed, size_class)| SmallText::new(seed, size_class))
}

fn operation() -> impl Strategy<Value = Operation> {
    prop_oneof![
        3 => (0..CLIENTS, text()).prop_map(|(client, name)| Operation::Join { client, name }),
        4 => (0..CLIENTS, text()).prop_map(|(client, text)| Operation::Send { client, text }),
        1 => (0..CLIENTS).prop_map(|client| Operation::Leave { client }),
        1 => (0..CLIENTS).prop_map(|client| Operation::DropTransport { client }),
        1 => Just(Operation::RelayOutage),
        1 => Just(Operation::RelayRestore),
        2 => (0u8..20).prop_map(|secs| Operation::AdvanceTime { secs }),
        4 => Just(Operation::Deliver),
        1 => (0..CLIENTS, prop::collection::vec(any::<u8>(), 0..32))
            .prop_map(|(client, payload)| Operation::Garbage { client, payload }),
    ]
}

fn sends_written(world: &World, id: ClientId) -> usize {
    world
        .client(id)
        .transcripts()
        .iter()
        .flat_map(|t| t.kinds.iter())
        .filter(|kind| **kind == "send")
        .count()
}

fn error_count(world: &World, id: ClientId) -> usize {
    let observer = world.client(id).observer();
    observer.validation_errors().len() + observer.connectivity_errors().len()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_invariants_hold(
        seed in any::<u64>(),
        ops in prop::collection::vec(operation(), 0..80),
    ) {
        let registry = InvariantRegistry::standard();
        let mut world = World::new(usize::from(CLIENTS), seed);

        for (step, op) in ops.iter().enumerate() {
            world.apply(op);
            registry.assert_all(&world.snapshot(), &format!("after step {step}: {op:?}"));
        }

        world.settle();
        registry.assert_all(&world.snapshot(), "after final settle");
    }

    #[test]
    fn prop_send_requires_identity_and_open_transport(
        seed in any::<u64>(),
        ops in prop::collection::vec(operation(), 0..60),
    ) {
        let mut world = World::new(usize::from(CLIENTS), seed);

        for op in &ops {
            let Operation::Send { client, text } = op else {
                world.apply(op);
                continue;
            };
            let id = ClientId(usize::from(*client));
            let session = world.client(id).session();
            let may_send = session.identity().is_some()
                && session.connection_state() == ConnectionState::Open
                && !text.to_text().trim().is_empty();
            let sends = sends_written(&world, id);
            let errors = error_count(&world, id);

            world.apply(op);

            if may_send {
                prop_assert_eq!(sends_written(&world, id), sends + 1);
            } else {
                prop_assert_eq!(sends_written(&world, id), sends);
                prop_assert_eq!(error_count(&world, id), errors + 1);
            }
        }
    }

    #[test]
    fn prop_garbage_never_disturbs_later_frames(
        garbage in prop::collection::vec(any::<String>(), 0..20),
    ) {
        let mut world = World::new(1, 3);
        let me = ClientId(0);
        world.join(me, "alice");
        world.settle();
        let rendered = world.client(me).observer().rendered().count();

        for raw in &garbage {
            world.inject_frame(me, raw.as_str());
        }
        world.inject_frame(me, r#"[{"id":"x","name":"bob"},{"id":"y","name":"carol"}]"#);

        let names: Vec<_> =
            world.client(me).session().roster().iter().map(|p| p.name.clone()).collect();
        prop_assert_eq!(names, vec!["bob".to_owned(), "carol".to_owned()]);
        prop_assert_eq!(world.client(me).session().connection_state(), ConnectionState::Open);
        prop_assert!(world.client(me).observer().rendered().count() >= rendered);
    }
}
