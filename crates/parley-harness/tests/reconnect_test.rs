//! Reconnect behavior under simulated relay faults.

use std::time::Duration;

use parley_client::SessionConfig;
use parley_core::{ConnectionConfig, ConnectionState, ReconnectPolicy};
use parley_harness::{ClientId, InvariantRegistry, RosterShape, SimRelay, World};

const ALICE: ClientId = ClientId(0);
const BOB: ClientId = ClientId(1);

fn names(world: &World, id: ClientId) -> Vec<String> {
    world.client(id).session().roster().iter().map(|p| p.name.clone()).collect()
}

#[test]
fn dropped_transport_reconnects_and_reannounces() {
    let mut world = World::new(2, 5);
    world.join(ALICE, "alice");
    world.join(BOB, "bob");
    world.settle();

    world.drop_transport(ALICE);
    let alice = world.client(ALICE);
    assert_eq!(alice.session().connection_state(), ConnectionState::Disconnected);
    assert!(alice.session().is_roster_stale());
    assert_eq!(names(&world, ALICE), vec!["alice", "bob"]);
    assert_eq!(world.client(ALICE).observer().connectivity_errors().len(), 1);

    // Nothing happens before the delay elapses.
    world.advance(Duration::from_secs(4));
    assert_eq!(world.client(ALICE).session().connection_state(), ConnectionState::Disconnected);

    world.advance(Duration::from_secs(1));
    let alice = world.client(ALICE);
    assert_eq!(alice.session().connection_state(), ConnectionState::Open);
    assert_eq!(alice.current_transcript(), ["new-user", "get-users"]);

    world.settle();
    assert!(!world.client(ALICE).session().is_roster_stale());
    assert_eq!(names(&world, ALICE), vec!["alice", "bob"]);
    assert_eq!(names(&world, BOB), vec!["alice", "bob"]);
    InvariantRegistry::standard().assert_all(&world.snapshot(), "after reconnect");
}

#[test]
fn sends_during_outage_fail_and_are_not_replayed() {
    let mut world = World::new(2, 5);
    world.join(ALICE, "alice");
    world.join(BOB, "bob");
    world.settle();

    world.relay_outage();
    world.send(ALICE, "anyone there?");
    assert_eq!(world.client(ALICE).session().pending_echoes(), 0);

    world.relay_restore();
    world.advance(Duration::from_secs(5));
    world.settle();

    assert!(world.client(BOB).observer().rendered_texts().is_empty());
    let transcript = world.client(ALICE).current_transcript();
    assert_eq!(&transcript[..2], ["new-user", "get-users"]);
    assert!(!transcript.contains(&"send"));
}

#[test]
fn exponential_backoff_spaces_attempts() {
    let config = SessionConfig {
        connection: ConnectionConfig {
            reconnect: ReconnectPolicy::exponential(Duration::from_secs(1), Duration::from_secs(4)),
            ..ConnectionConfig::default()
        },
        ..SessionConfig::default()
    };
    let mut world = World::with_config(1, 5, &config);
    world.join(ALICE, "alice");
    world.relay_outage();

    // Attempts at +1s, then +2s, then capped at +4s.
    let mut opened_at = Vec::new();
    let mut elapsed = 0;
    let mut last_errors = world.client(ALICE).observer().connectivity_errors().len();
    for _ in 0..12 {
        world.advance(Duration::from_secs(1));
        elapsed += 1;
        let errors = world.client(ALICE).observer().connectivity_errors().len();
        if errors > last_errors {
            opened_at.push(elapsed);
        }
        last_errors = errors;
    }

    assert_eq!(opened_at, vec![1, 3, 7, 11]);
}

#[test]
fn gives_up_after_max_attempts() {
    let config = SessionConfig {
        connection: ConnectionConfig {
            reconnect: ReconnectPolicy::fixed(Duration::from_secs(1)).with_max_attempts(2),
            ..ConnectionConfig::default()
        },
        ..SessionConfig::default()
    };
    let mut world = World::with_config(1, 5, &config);
    world.join(ALICE, "alice");
    world.relay_outage();

    world.advance(Duration::from_secs(1));
    world.advance(Duration::from_secs(1));
    world.advance(Duration::from_secs(60));

    let alice = world.client(ALICE);
    assert_eq!(alice.session().connection_state(), ConnectionState::Disconnected);
    assert!(alice.session().reconnect_deadline().is_none());
    let errors = alice.observer().connectivity_errors();
    assert!(errors.last().is_some_and(|m| m.contains("gave up after 2 attempts")));
}

#[test]
fn users_object_rosters_are_understood() {
    let relay = SimRelay::new().with_roster_shape(RosterShape::UsersObject);
    let mut world = World::with_relay(2, 5, &SessionConfig::default(), relay);
    world.join(ALICE, "alice");
    world.join(BOB, "bob");
    world.settle();

    assert_eq!(names(&world, ALICE), vec!["alice", "bob"]);
    assert_eq!(names(&world, BOB), vec!["alice", "bob"]);
}
