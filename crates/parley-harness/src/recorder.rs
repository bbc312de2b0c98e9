//! Observer that records every notification.

use parley_client::SessionObserver;
use parley_proto::{ChatMessage, CorrelationId, Identity, Participant};

/// A notification as delivered to the observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Roster replaced
    RosterChanged(Vec<Participant>),
    /// Message rendered
    Message {
        /// The message
        message: ChatMessage,
        /// Whether the local user wrote it
        is_mine: bool,
    },
    /// Connectivity problem
    ConnectivityError(String),
    /// Invalid input
    ValidationError(String),
    /// Join completed
    EnteredChat(Identity),
    /// Left the chat
    LeftChat,
}

/// Records notifications in delivery order.
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    notifications: Vec<Notification>,
}

impl RecordingObserver {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far.
    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    /// Drain the recorded notifications.
    pub fn take(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    /// Rendered messages with their `is_mine` flag.
    pub fn rendered(&self) -> impl Iterator<Item = (&ChatMessage, bool)> {
        self.notifications.iter().filter_map(|n| match n {
            Notification::Message { message, is_mine } => Some((message, *is_mine)),
            _ => None,
        })
    }

    /// Texts of rendered messages, in order.
    pub fn rendered_texts(&self) -> Vec<&str> {
        self.rendered().map(|(m, _)| m.text.as_str()).collect()
    }

    /// How often a message with `id` was rendered as our own.
    pub fn own_renders_of(&self, id: &CorrelationId) -> usize {
        self.rendered()
            .filter(|(m, is_mine)| *is_mine && m.correlation_id.as_ref() == Some(id))
            .count()
    }

    /// The most recent roster delivered.
    pub fn last_roster(&self) -> Option<&[Participant]> {
        self.notifications.iter().rev().find_map(|n| match n {
            Notification::RosterChanged(roster) => Some(roster.as_slice()),
            _ => None,
        })
    }

    /// Connectivity error messages, in order.
    pub fn connectivity_errors(&self) -> Vec<&str> {
        self.notifications
            .iter()
            .filter_map(|n| match n {
                Notification::ConnectivityError(m) => Some(m.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Validation error messages, in order.
    pub fn validation_errors(&self) -> Vec<&str> {
        self.notifications
            .iter()
            .filter_map(|n| match n {
                Notification::ValidationError(m) => Some(m.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl SessionObserver for RecordingObserver {
    fn on_roster_changed(&mut self, roster: &[Participant]) {
        self.notifications.push(Notification::RosterChanged(roster.to_vec()));
    }

    fn on_message_to_render(&mut self, message: &ChatMessage, is_mine: bool) {
        self.notifications.push(Notification::Message { message: message.clone(), is_mine });
    }

    fn on_connectivity_error(&mut self, message: &str) {
        self.notifications.push(Notification::ConnectivityError(message.to_owned()));
    }

    fn on_validation_error(&mut self, message: &str) {
        self.notifications.push(Notification::ValidationError(message.to_owned()));
    }

    fn on_entered_chat(&mut self, identity: &Identity) {
        self.notifications.push(Notification::EnteredChat(identity.clone()));
    }

    fn on_left_chat(&mut self) {
        self.notifications.push(Notification::LeftChat);
    }
}
