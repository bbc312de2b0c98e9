//! Environment abstraction for deterministic testing.
//!
//! Decouples session logic from system resources (time, randomness). The
//! simulation harness supplies a virtual clock and a seeded RNG; production
//! supplies the system clock and OS entropy.

use std::{
    ops::{Add, Sub},
    time::Duration,
};

use uuid::Uuid;

/// Instant types usable by the state machines.
///
/// Blanket-implemented for anything that orders, subtracts to a
/// [`Duration`], and can be advanced by one.
pub trait ClockInstant:
    Copy + Ord + Send + Sync + Sub<Output = Duration> + Add<Duration, Output = Self>
{
}

impl<T> ClockInstant for T where
    T: Copy + Ord + Send + Sync + Sub<Output = Duration> + Add<Duration, Output = T>
{
}

/// Abstract environment providing time, randomness, and async primitives.
///
/// Implementations MUST guarantee:
///
/// - `now()` never goes backwards
/// - `random_bytes()` uses cryptographically secure entropy in production
pub trait Environment: Clone + Send + Sync + 'static {
    /// Instant type used by this environment.
    type Instant: ClockInstant;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// Only drivers await this; session logic never does.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    ///
    /// Given the same seed, a simulated environment produces the same
    /// sequence.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// Generates a random UUIDv4.
    ///
    /// Participant ids and message correlation ids both come from here, so a
    /// seeded environment yields reproducible ids.
    fn random_uuid(&self) -> Uuid {
        let mut bytes = [0u8; 16];
        self.random_bytes(&mut bytes);
        uuid::Builder::from_random_bytes(bytes).into_uuid()
    }
}
