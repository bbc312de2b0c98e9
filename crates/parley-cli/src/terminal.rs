//! Plain-text observer.
//!
//! Implements [`SessionObserver`] by writing one line per notification.

use std::{
    fmt,
    io::{self, Stdout, Write},
};

use parley_client::SessionObserver;
use parley_proto::{ChatMessage, Identity, Participant, ParticipantId};

/// Writes notifications as text lines.
pub struct TerminalObserver<W: Write = Stdout> {
    out: W,
    /// Who we joined as, to mark ourselves in the roster.
    me: Option<ParticipantId>,
}

impl TerminalObserver<Stdout> {
    /// Observer writing to stdout.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TerminalObserver<W> {
    /// Observer writing to `out`.
    pub fn new(out: W) -> Self {
        Self { out, me: None }
    }

    /// Print a line that is not a session notification, e.g. a prompt.
    pub fn notice(&mut self, text: &str) {
        self.line(format_args!("* {text}"));
    }

    /// The underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, args: fmt::Arguments<'_>) {
        if let Err(e) = writeln!(self.out, "{args}").and_then(|()| self.out.flush()) {
            tracing::warn!(error = %e, "failed to write to terminal");
        }
    }
}

impl<W: Write> SessionObserver for TerminalObserver<W> {
    fn on_roster_changed(&mut self, roster: &[Participant]) {
        if roster.is_empty() {
            self.line(format_args!("* nobody here"));
        } else {
            let names: Vec<_> = roster
                .iter()
                .map(|p| {
                    if self.me.as_ref() == Some(&p.id) {
                        format!("{} (you)", p.name)
                    } else {
                        p.name.clone()
                    }
                })
                .collect();
            self.line(format_args!("* here: {}", names.join(", ")));
        }
    }

    fn on_message_to_render(&mut self, message: &ChatMessage, is_mine: bool) {
        let marker = if is_mine { " (you)" } else { "" };
        self.line(format_args!("{}{marker}: {}", message.author.name, message.text));
    }

    fn on_connectivity_error(&mut self, message: &str) {
        self.line(format_args!("! {message}"));
    }

    fn on_validation_error(&mut self, message: &str) {
        self.line(format_args!("? {message}"));
    }

    fn on_entered_chat(&mut self, identity: &Identity) {
        self.me = Some(identity.id().clone());
        self.line(format_args!("* joined as {}", identity.name()));
    }

    fn on_left_chat(&mut self) {
        self.me = None;
        self.line(format_args!("* left the chat"));
    }
}
