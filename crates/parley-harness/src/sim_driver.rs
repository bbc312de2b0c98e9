//! Simulation driver implementing the Driver trait.
//!
//! `SimDriver` provides the same interface as the WebSocket driver but for
//! deterministic testing, so the generic [`parley_app::Runtime`] runs
//! unchanged against scripted input. Clones share state, which lets a test
//! keep a handle after moving the driver into the runtime.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use parley_app::{Driver, DriverEvent, Intent};
use thiserror::Error;

/// Simulation driver errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimDriverError {
    /// Transmit with no open transport.
    #[error("transport is not open")]
    NotOpen,

    /// Failure injected by the test.
    #[error("injected failure")]
    Injected,
}

#[derive(Default)]
struct SharedState {
    inbound: VecDeque<DriverEvent>,
    transmitted: Vec<String>,
    opens: usize,
    closes: Vec<String>,
    open: bool,
    fail_transmit: bool,
    auto_open: bool,
    stopped: bool,
}

/// Scripted driver for deterministic tests.
#[derive(Clone, Default)]
pub struct SimDriver {
    state: Arc<Mutex<SharedState>>,
}

impl SimDriver {
    /// Create a driver with nothing queued.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, SharedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue an event for `poll_event`.
    pub fn inject(&self, event: DriverEvent) {
        let mut state = self.state();
        match &event {
            DriverEvent::TransportOpened => state.open = true,
            DriverEvent::TransportClosed { .. } | DriverEvent::TransportError { .. } => {
                state.open = false;
            },
            _ => {},
        }
        state.inbound.push_back(event);
    }

    /// Queue a user intent.
    pub fn inject_intent(&self, intent: Intent) {
        self.inject(DriverEvent::Intent(intent));
    }

    /// Queue a frame from the relay.
    pub fn inject_frame(&self, raw: impl Into<String>) {
        self.inject(DriverEvent::FrameReceived(raw.into()));
    }

    /// Whether injected events remain.
    pub fn has_pending(&self) -> bool {
        !self.state().inbound.is_empty()
    }

    /// Drain the frames written so far.
    pub fn take_transmitted(&self) -> Vec<String> {
        std::mem::take(&mut self.state().transmitted)
    }

    /// Number of `open_transport` calls.
    pub fn open_count(&self) -> usize {
        self.state().opens
    }

    /// Reasons passed to `close_transport`, in order.
    pub fn close_reasons(&self) -> Vec<String> {
        self.state().closes.clone()
    }

    /// Make every transmit fail.
    pub fn set_fail_transmit(&self, fail: bool) {
        self.state().fail_transmit = fail;
    }

    /// Report `TransportOpened` as soon as a transport is requested.
    pub fn set_auto_open(&self, auto_open: bool) {
        self.state().auto_open = auto_open;
    }

    /// Whether `stop` was called.
    pub fn is_stopped(&self) -> bool {
        self.state().stopped
    }
}

impl Driver for SimDriver {
    type Error = SimDriverError;

    async fn poll_event(&mut self) -> Result<Option<DriverEvent>, SimDriverError> {
        Ok(self.state().inbound.pop_front())
    }

    async fn open_transport(&mut self) -> Result<(), SimDriverError> {
        let mut state = self.state();
        state.opens += 1;
        state.open = false;
        if state.auto_open {
            state.open = true;
            state.inbound.push_back(DriverEvent::TransportOpened);
        }
        Ok(())
    }

    async fn transmit(&mut self, raw: String) -> Result<(), SimDriverError> {
        let mut state = self.state();
        if state.fail_transmit {
            return Err(SimDriverError::Injected);
        }
        if !state.open {
            return Err(SimDriverError::NotOpen);
        }
        state.transmitted.push(raw);
        Ok(())
    }

    async fn close_transport(&mut self, reason: &str) {
        let mut state = self.state();
        state.open = false;
        state.closes.push(reason.to_owned());
    }

    fn stop(&mut self) {
        let mut state = self.state();
        state.open = false;
        state.stopped = true;
    }
}
