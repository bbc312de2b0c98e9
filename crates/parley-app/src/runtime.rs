//! Generic runtime for session orchestration.
//!
//! The Runtime drives the event loop, coordinating between:
//! - [`Session`]: the session state machine
//! - [`Driver`]: platform-specific I/O
//! - [`SessionObserver`]: the UI

use std::collections::VecDeque;

use parley_client::{Session, SessionConfig, SessionEvent, SessionObserver};
use parley_core::{ConnectionAction, env::Environment};

use crate::Driver;

/// Generic runtime that orchestrates Session, Driver and observer.
///
/// # Type Parameters
///
/// - `D`: Platform-specific I/O driver
/// - `E`: Environment for time and identifiers
/// - `O`: Receiver of UI notifications
pub struct Runtime<D, E, O>
where
    D: Driver,
    E: Environment,
    O: SessionObserver,
{
    driver: D,
    session: Session<E>,
    observer: O,
}

impl<D, E, O> Runtime<D, E, O>
where
    D: Driver,
    E: Environment,
    O: SessionObserver,
{
    /// Create a new runtime with the given driver, environment and observer.
    pub fn new(driver: D, env: E, observer: O, config: SessionConfig) -> Self {
        Self { driver, session: Session::new(env, config), observer }
    }

    /// Run the main event loop until the driver asks to quit.
    ///
    /// Connects eagerly, then repeatedly:
    /// 1. Polls the driver for an intent or transport event
    /// 2. Feeds it to the session and executes the resulting actions
    /// 3. Ticks the session so reconnects and timeouts fire
    ///
    /// On quit, leaves the chat (best effort) before stopping the driver.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails to poll.
    pub async fn run(mut self) -> Result<(), D::Error> {
        self.dispatch(SessionEvent::Connect).await;

        loop {
            let should_quit = self.process_cycle().await?;
            if should_quit {
                break;
            }
        }

        self.dispatch(SessionEvent::RequestLeave).await;
        self.driver.stop();
        Ok(())
    }

    /// Process one cycle of the event loop.
    ///
    /// Returns `true` if the runtime should quit.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails to poll.
    pub async fn process_cycle(&mut self) -> Result<bool, D::Error> {
        if let Some(event) = self.driver.poll_event().await? {
            match event.into_session_event() {
                Some(event) => self.dispatch(event).await,
                None => return Ok(true),
            }
        }

        let now = self.session.env().now();
        self.dispatch(SessionEvent::Tick { now }).await;
        Ok(false)
    }

    /// Feed an event to the session and execute everything it produces.
    ///
    /// Transport failures while executing actions are fed back into the
    /// session as transport errors, as are completed closes.
    pub async fn dispatch(&mut self, event: SessionEvent<E::Instant>) {
        let mut pending = VecDeque::from([event]);

        while let Some(event) = pending.pop_front() {
            for action in self.session.handle(event) {
                let Some(command) = action.deliver(&mut self.observer) else {
                    continue;
                };

                match command {
                    ConnectionAction::OpenTransport => {
                        if let Err(e) = self.driver.open_transport().await {
                            tracing::warn!(error = %e, "failed to start transport");
                            pending.push_back(SessionEvent::TransportError { reason: e.to_string() });
                        }
                    },
                    ConnectionAction::Transmit(raw) => {
                        if let Err(e) = self.driver.transmit(raw).await {
                            tracing::warn!(error = %e, "transmit failed");
                            pending.push_back(SessionEvent::TransportError { reason: e.to_string() });
                        }
                    },
                    ConnectionAction::CloseTransport { reason } => {
                        self.driver.close_transport(&reason).await;
                        pending.push_back(SessionEvent::TransportClosed { reason });
                    },
                }
            }
        }
    }

    /// Ask to enter the chat.
    pub async fn request_join(&mut self, display_name: impl Into<String>) {
        self.dispatch(SessionEvent::RequestJoin { display_name: display_name.into() }).await;
    }

    /// Ask to send a message.
    pub async fn request_send(&mut self, text: impl Into<String>) {
        self.dispatch(SessionEvent::RequestSend { text: text.into() }).await;
    }

    /// Ask to leave the chat.
    pub async fn request_leave(&mut self) {
        self.dispatch(SessionEvent::RequestLeave).await;
    }

    /// Get a reference to the Session
    pub fn session(&self) -> &Session<E> {
        &self.session
    }

    /// Get a reference to the observer
    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Get a mutable reference to the observer
    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    /// Get a reference to the Driver
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Get a mutable reference to the Driver
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }
}
