//! Standard invariant checks.
//!
//! These invariants capture behavioral properties that must always hold.
//! They verify WHAT must be true, not specific test scenarios.

use super::{Invariant, InvariantResult, SystemSnapshot, Violation};

/// A locally sent message is rendered once, even after its echo arrives.
pub struct NoDuplicateSelfEcho;

impl Invariant for NoDuplicateSelfEcho {
    fn name(&self) -> &'static str {
        "no_duplicate_self_echo"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            if let Some((id, count)) = client.own_renders.iter().find(|(_, count)| **count > 1) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("client {}: message {id} rendered {count} times", client.id),
                });
            }
        }
        Ok(())
    }
}

/// The roster is exactly the last snapshot received, in relay order.
///
/// Presence hints never edit it, and a lost transport leaves it in place.
pub struct RosterMatchesSnapshot;

impl Invariant for RosterMatchesSnapshot {
    fn name(&self) -> &'static str {
        "roster_matches_snapshot"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            let expected = client.last_snapshot.as_deref().unwrap_or_default();
            if client.roster != expected {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "client {}: roster {:?} differs from last snapshot {:?}",
                        client.id, client.roster, expected
                    ),
                });
            }
        }
        Ok(())
    }
}

/// A joined client announces itself before anything else on every
/// transport, and each announcement is followed by a roster request.
///
/// Messages and departures never precede the first announcement.
pub struct AnnounceBeforeTraffic;

impl Invariant for AnnounceBeforeTraffic {
    fn name(&self) -> &'static str {
        "announce_before_traffic"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            for (n, transcript) in client.transcripts.iter().enumerate() {
                let fail = |message: String| {
                    Err(Violation {
                        invariant: self.name(),
                        message: format!("client {} transport {n}: {message}", client.id),
                    })
                };
                let kinds = &transcript.kinds;

                if transcript.joined_at_open && kinds.first() != Some(&"new-user") {
                    return fail(format!("opened while joined but began with {kinds:?}"));
                }

                let announced = kinds.iter().position(|k| *k == "new-user").unwrap_or(kinds.len());
                if let Some(early) = kinds[..announced].iter().find(|k| matches!(**k, "send" | "exit"))
                {
                    return fail(format!("{early} before announcement in {kinds:?}"));
                }

                for (i, kind) in kinds.iter().enumerate() {
                    if *kind == "new-user" && kinds.get(i + 1) != Some(&"get-users") {
                        return fail(format!("announcement not followed by roster request in {kinds:?}"));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Clients only write to transports the relay considers open.
pub struct TransmitOnlyWhenOpen;

impl Invariant for TransmitOnlyWhenOpen {
    fn name(&self) -> &'static str {
        "transmit_only_when_open"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            if client.rejected_frames > 0 {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "client {}: relay rejected {} frames",
                        client.id, client.rejected_frames
                    ),
                });
            }
        }
        Ok(())
    }
}
