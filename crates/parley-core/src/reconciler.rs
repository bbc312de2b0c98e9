//! Echo reconciliation.
//!
//! A locally sent message is rendered immediately and then comes back from
//! the relay as an echo. The reconciler remembers the correlation ids of
//! sends still awaiting their echo so the echo can be suppressed exactly
//! once, however many sends are in flight.

use std::collections::VecDeque;

use parley_proto::{ChatMessage, CorrelationId};

/// Default bound on correlation ids awaiting an echo.
pub const DEFAULT_PENDING_CAPACITY: usize = 256;

/// Correlation ids of local sends awaiting their relay echo.
///
/// Kept in send order. When full, the oldest id is evicted, so an echo that
/// arrives after that many newer sends renders a second time.
#[derive(Debug, Clone)]
pub struct MessageReconciler {
    pending: VecDeque<CorrelationId>,
    capacity: usize,
}

impl Default for MessageReconciler {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_PENDING_CAPACITY)
    }
}

impl MessageReconciler {
    /// Create a reconciler holding at most `capacity` pending ids.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { pending: VecDeque::with_capacity(capacity.min(DEFAULT_PENDING_CAPACITY)), capacity }
    }

    /// Remember a freshly sent message's id.
    pub fn mark_pending(&mut self, id: CorrelationId) {
        if self.pending.contains(&id) {
            return;
        }
        if self.pending.len() == self.capacity
            && let Some(evicted) = self.pending.pop_front()
        {
            tracing::warn!(%evicted, "echo never arrived; forgetting oldest pending send");
        }
        self.pending.push_back(id);
    }

    /// Whether `message` is the echo of a pending send.
    ///
    /// Consumes the id on a match, so a second copy of the same echo is
    /// rendered normally. Callers only ask about messages authored by the
    /// local identity.
    pub fn should_suppress_echo(&mut self, message: &ChatMessage) -> bool {
        message.correlation_id.as_ref().is_some_and(|id| self.discard(id))
    }

    /// Forget a pending id, e.g. because its transmit failed.
    ///
    /// Returns whether the id was pending.
    pub fn discard(&mut self, id: &CorrelationId) -> bool {
        match self.pending.iter().position(|pending| pending == id) {
            Some(index) => {
                self.pending.remove(index);
                true
            },
            None => false,
        }
    }

    /// Whether `id` is awaiting its echo.
    pub fn is_pending(&self, id: &CorrelationId) -> bool {
        self.pending.contains(id)
    }

    /// Number of sends awaiting an echo.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Forget every pending id.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use parley_proto::{Identity, ParticipantId};

    use super::*;

    fn echo(id: &str) -> ChatMessage {
        let alice = Identity::new(ParticipantId::new("u-alice"), "alice");
        ChatMessage::compose("hi", &alice, CorrelationId::new(id))
    }

    #[test]
    fn echo_is_suppressed_once() {
        let mut reconciler = MessageReconciler::default();
        reconciler.mark_pending(CorrelationId::new("t-1"));

        assert!(reconciler.should_suppress_echo(&echo("t-1")));
        assert!(!reconciler.should_suppress_echo(&echo("t-1")));
    }

    #[test]
    fn interleaved_sends_each_match_their_own_echo() {
        let mut reconciler = MessageReconciler::default();
        reconciler.mark_pending(CorrelationId::new("t-1"));
        reconciler.mark_pending(CorrelationId::new("t-2"));

        // Echoes may arrive in any order.
        assert!(reconciler.should_suppress_echo(&echo("t-2")));
        assert!(reconciler.should_suppress_echo(&echo("t-1")));
        assert_eq!(reconciler.pending_count(), 0);
    }

    #[test]
    fn messages_without_correlation_id_are_never_suppressed() {
        let mut reconciler = MessageReconciler::default();
        reconciler.mark_pending(CorrelationId::new("t-1"));

        let mut message = echo("t-1");
        message.correlation_id = None;
        assert!(!reconciler.should_suppress_echo(&message));
        assert!(reconciler.is_pending(&CorrelationId::new("t-1")));
    }

    #[test]
    fn discard_forgets_failed_sends() {
        let mut reconciler = MessageReconciler::default();
        reconciler.mark_pending(CorrelationId::new("t-1"));

        assert!(reconciler.discard(&CorrelationId::new("t-1")));
        assert!(!reconciler.discard(&CorrelationId::new("t-1")));
        assert!(!reconciler.should_suppress_echo(&echo("t-1")));
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut reconciler = MessageReconciler::with_capacity(2);
        reconciler.mark_pending(CorrelationId::new("t-1"));
        reconciler.mark_pending(CorrelationId::new("t-2"));
        reconciler.mark_pending(CorrelationId::new("t-3"));

        assert_eq!(reconciler.pending_count(), 2);
        assert!(!reconciler.is_pending(&CorrelationId::new("t-1")));
        assert!(reconciler.is_pending(&CorrelationId::new("t-3")));
    }
}
