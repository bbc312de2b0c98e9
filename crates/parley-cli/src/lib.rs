//! Terminal client for Parley
//!
//! A thin shell over [`parley_app::Runtime`]: stdin lines become intents,
//! observer notifications become stdout lines. All session logic lives in
//! [`parley_client::Session`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod args;
pub mod input;
pub mod terminal;

pub use args::Args;
pub use input::InputParser;
pub use terminal::TerminalObserver;
