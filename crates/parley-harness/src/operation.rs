//! Operations for model-based testing.
//!
//! Operations represent everything that can happen to a [`World`](crate::World):
//! user intents, network faults and the passage of time. They are generated
//! randomly by proptest or a fuzzer and applied in sequence.

use arbitrary::Arbitrary;

/// Operations that can be applied to the world.
///
/// Client indices wrap around the number of clients in the world, so any
/// generated value targets a real client.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// Client asks to join under a name.
    Join {
        /// Target client.
        client: u8,
        /// Display name, possibly blank.
        name: SmallText,
    },

    /// Client asks to send a message.
    Send {
        /// Sending client.
        client: u8,
        /// Message body, possibly blank.
        text: SmallText,
    },

    /// Client leaves the chat.
    Leave {
        /// Leaving client.
        client: u8,
    },

    /// The relay drops one client's transport.
    DropTransport {
        /// Affected client.
        client: u8,
    },

    /// The relay goes away: every transport drops and new ones fail.
    RelayOutage,

    /// The relay accepts transports again.
    RelayRestore,

    /// Advance simulated time and tick every client.
    AdvanceTime {
        /// Seconds to advance.
        secs: u8,
    },

    /// Deliver every frame the relay has queued.
    Deliver,

    /// The relay sends a client arbitrary bytes.
    Garbage {
        /// Receiving client.
        client: u8,
        /// Payload, decoded lossily as UTF-8.
        payload: Vec<u8>,
    },
}

/// Compact text for testing.
///
/// Expands deterministically from a seed so shrunk cases stay readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub struct SmallText {
    /// Word selector.
    pub seed: u8,
    /// Length hint (0-3 maps to blank/one word/a few words/a long line).
    pub size_class: u8,
}

const WORDS: [&str; 8] = ["alice", "bob", "hi", "there", "relay", "ping", "é", "👋"];

impl SmallText {
    /// Build from a seed and length hint.
    pub fn new(seed: u8, size_class: u8) -> Self {
        Self { seed, size_class }
    }

    /// Expand to the actual text.
    pub fn to_text(self) -> String {
        let words = match self.size_class % 4 {
            0 => return " ".repeat(usize::from(self.seed % 3)),
            1 => 1,
            2 => 3,
            _ => 12,
        };

        (0..words)
            .map(|i| WORDS[usize::from(self.seed.wrapping_add(i)) % WORDS.len()])
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_class_zero_is_blank() {
        assert!(SmallText::new(7, 0).to_text().trim().is_empty());
        assert!(SmallText::new(7, 4).to_text().trim().is_empty());
    }

    #[test]
    fn text_is_deterministic() {
        assert_eq!(SmallText::new(1, 2).to_text(), "bob hi there");
        assert_eq!(SmallText::new(1, 2).to_text(), SmallText::new(1, 6).to_text());
    }
}
