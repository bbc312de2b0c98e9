//! UI-facing notification interface.

use parley_core::ConnectionAction;
use parley_proto::{ChatMessage, Identity, Participant};

use crate::SessionAction;

/// Receives the session's UI notifications.
///
/// Injected into whatever executes [`SessionAction`]s; the session itself
/// never holds one.
pub trait SessionObserver {
    /// The roster was replaced. `roster` is in relay order.
    fn on_roster_changed(&mut self, roster: &[Participant]);

    /// A message should be shown.
    fn on_message_to_render(&mut self, message: &ChatMessage, is_mine: bool);

    /// The relay is unreachable or the connection dropped.
    fn on_connectivity_error(&mut self, message: &str);

    /// The user supplied invalid input.
    fn on_validation_error(&mut self, message: &str);

    /// The join completed.
    fn on_entered_chat(&mut self, _identity: &Identity) {}

    /// The user left.
    fn on_left_chat(&mut self) {}
}

impl SessionAction {
    /// Deliver a notification to `observer`.
    ///
    /// Transport actions are not notifications; they are handed back for the
    /// caller to execute.
    pub fn deliver<O>(self, observer: &mut O) -> Option<ConnectionAction>
    where
        O: SessionObserver + ?Sized,
    {
        match self {
            Self::OpenTransport => Some(ConnectionAction::OpenTransport),
            Self::Transmit(raw) => Some(ConnectionAction::Transmit(raw)),
            Self::CloseTransport { reason } => Some(ConnectionAction::CloseTransport { reason }),
            Self::RosterChanged(roster) => {
                observer.on_roster_changed(&roster);
                None
            },
            Self::RenderMessage { message, is_mine } => {
                observer.on_message_to_render(&message, is_mine);
                None
            },
            Self::EnteredChat { identity } => {
                observer.on_entered_chat(&identity);
                None
            },
            Self::LeftChat => {
                observer.on_left_chat();
                None
            },
            Self::ConnectivityError { message } => {
                observer.on_connectivity_error(&message);
                None
            },
            Self::ValidationError { message } => {
                observer.on_validation_error(&message);
                None
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use parley_proto::{CorrelationId, ParticipantId};

    use super::*;

    #[derive(Default)]
    struct Log(Vec<String>);

    impl SessionObserver for Log {
        fn on_roster_changed(&mut self, roster: &[Participant]) {
            self.0.push(format!("roster:{}", roster.len()));
        }

        fn on_message_to_render(&mut self, message: &ChatMessage, is_mine: bool) {
            self.0.push(format!("message:{}:{is_mine}", message.text));
        }

        fn on_connectivity_error(&mut self, message: &str) {
            self.0.push(format!("offline:{message}"));
        }

        fn on_validation_error(&mut self, message: &str) {
            self.0.push(format!("invalid:{message}"));
        }
    }

    #[test]
    fn notifications_reach_observer() {
        let alice = Identity::new(ParticipantId::new("a"), "alice");
        let mut log = Log::default();

        let actions = vec![
            SessionAction::RosterChanged(vec![Participant::from(&alice)]),
            SessionAction::RenderMessage {
                message: ChatMessage::compose("hi", &alice, CorrelationId::new("t")),
                is_mine: true,
            },
            SessionAction::EnteredChat { identity: alice.clone() },
            SessionAction::ValidationError { message: "empty".into() },
        ];
        for action in actions {
            assert_eq!(action.deliver(&mut log), None);
        }

        assert_eq!(log.0, vec!["roster:1", "message:hi:true", "invalid:empty"]);
    }

    #[test]
    fn transport_actions_are_handed_back() {
        let mut log = Log::default();

        assert_eq!(
            SessionAction::Transmit("{}".into()).deliver(&mut log),
            Some(ConnectionAction::Transmit("{}".into()))
        );
        assert!(log.0.is_empty());
    }
}
