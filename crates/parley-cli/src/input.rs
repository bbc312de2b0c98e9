//! Line input.
//!
//! Each stdin line becomes at most one [`Intent`]. Commands start with `/`;
//! anything else is a message, or the display name while the client is
//! waiting for one.

use parley_app::Intent;

/// Turns typed lines into intents.
#[derive(Debug, Default)]
pub struct InputParser {
    awaiting_name: bool,
}

impl InputParser {
    /// Create a parser. With `awaiting_name`, the first plain line joins.
    pub fn new(awaiting_name: bool) -> Self {
        Self { awaiting_name }
    }

    /// Whether the next plain line is taken as the display name.
    pub fn is_awaiting_name(&self) -> bool {
        self.awaiting_name
    }

    /// Parse one line. Blank lines produce nothing.
    pub fn parse(&mut self, line: &str) -> Option<Intent> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        if let Some(command) = line.strip_prefix('/') {
            let (name, rest) = command.split_once(char::is_whitespace).unwrap_or((command, ""));
            match name {
                "join" => {
                    self.awaiting_name = false;
                    return Some(Intent::Join { display_name: rest.trim().to_owned() });
                },
                "leave" => {
                    self.awaiting_name = true;
                    return Some(Intent::Leave);
                },
                "quit" => return Some(Intent::Quit),
                _ => {},
            }
        }

        if self.awaiting_name {
            self.awaiting_name = false;
            Some(Intent::Join { display_name: line.to_owned() })
        } else {
            Some(Intent::Send { text: line.to_owned() })
        }
    }
}
