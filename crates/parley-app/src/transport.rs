//! WebSocket driver.
//!
//! Provides [`WsDriver`], which runs each transport in its own task and
//! forwards what happens to the runtime over a channel. Session logic stays
//! in the Sans-IO [`parley_client::Session`]; this is only plumbing.
//!
//! Every transport gets a generation number. Events are tagged with the
//! generation that produced them and dropped if it is no longer current, so
//! a superseded transport can never report into the session.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::{Driver, DriverEvent, Intent};

/// How long `poll_event` waits before returning `None` so the runtime can
/// tick.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Frames buffered between the runtime and a transport task.
const OUTGOING_BUFFER: usize = 64;

/// Intents buffered between the input source and the runtime.
const INTENT_BUFFER: usize = 32;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No transport is open.
    #[error("transport is not open")]
    NotOpen,

    /// The transport task has exited.
    #[error("transport task has stopped")]
    TaskStopped,
}

type Tagged = (u64, DriverEvent);

/// Driver speaking the relay protocol over a WebSocket.
///
/// Intents come from the [`mpsc::Sender<Intent>`] returned by
/// [`WsDriver::new`]; dropping every sender quits the runtime.
pub struct WsDriver {
    url: String,
    poll_interval: Duration,
    intents: mpsc::Receiver<Intent>,
    events_tx: mpsc::UnboundedSender<Tagged>,
    events_rx: mpsc::UnboundedReceiver<Tagged>,
    generation: u64,
    outgoing: Option<mpsc::Sender<String>>,
}

impl WsDriver {
    /// Create a driver for the relay at `url` (`ws://` or `wss://`).
    pub fn new(url: impl Into<String>) -> (Self, mpsc::Sender<Intent>) {
        let (intents_tx, intents) = mpsc::channel(INTENT_BUFFER);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let driver = Self {
            url: url.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            intents,
            events_tx,
            events_rx,
            generation: 0,
            outgoing: None,
        };
        (driver, intents_tx)
    }

    /// Override the poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Retire the current transport. Its task closes the socket once it
    /// sees the outgoing channel drop.
    fn retire(&mut self) {
        self.generation += 1;
        self.outgoing = None;
    }
}

impl Driver for WsDriver {
    type Error = TransportError;

    async fn poll_event(&mut self) -> Result<Option<DriverEvent>, TransportError> {
        tokio::select! {
            Some((generation, event)) = self.events_rx.recv() => {
                if generation == self.generation {
                    Ok(Some(event))
                } else {
                    tracing::trace!(generation, "dropping event from retired transport");
                    Ok(None)
                }
            },
            intent = self.intents.recv() => {
                Ok(Some(DriverEvent::Intent(intent.unwrap_or(Intent::Quit))))
            },
            () = tokio::time::sleep(self.poll_interval) => Ok(None),
        }
    }

    async fn open_transport(&mut self) -> Result<(), TransportError> {
        self.retire();

        let (outgoing_tx, outgoing_rx) = mpsc::channel(OUTGOING_BUFFER);
        self.outgoing = Some(outgoing_tx);

        tracing::info!(url = %self.url, generation = self.generation, "opening transport");
        tokio::spawn(run_connection(
            self.url.clone(),
            self.generation,
            self.events_tx.clone(),
            outgoing_rx,
        ));
        Ok(())
    }

    async fn transmit(&mut self, raw: String) -> Result<(), TransportError> {
        let outgoing = self.outgoing.as_ref().ok_or(TransportError::NotOpen)?;
        outgoing.send(raw).await.map_err(|_| TransportError::TaskStopped)
    }

    async fn close_transport(&mut self, reason: &str) {
        tracing::debug!(reason, "closing transport");
        self.retire();
    }

    fn stop(&mut self) {
        self.retire();
    }
}

/// Open a WebSocket and pump frames until either side closes it.
async fn run_connection(
    url: String,
    generation: u64,
    events: mpsc::UnboundedSender<Tagged>,
    mut outgoing: mpsc::Receiver<String>,
) {
    let stream = match connect_async(url.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(e) => {
            let _ = events.send((generation, DriverEvent::TransportError { reason: e.to_string() }));
            return;
        },
    };
    let _ = events.send((generation, DriverEvent::TransportOpened));

    let (mut write, mut read) = stream.split();

    let ended = loop {
        tokio::select! {
            out = outgoing.recv() => match out {
                Some(raw) => {
                    if let Err(e) = write.send(Message::Text(raw.into())).await {
                        break DriverEvent::TransportError { reason: e.to_string() };
                    }
                },
                None => {
                    let _ = write.send(Message::Close(None)).await;
                    break DriverEvent::TransportClosed { reason: "closed by client".to_owned() };
                },
            },
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let _ = events.send((generation, DriverEvent::FrameReceived(text.as_str().to_owned())));
                },
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map_or_else(|| "closed by relay".to_owned(), |f| f.reason.as_str().to_owned());
                    break DriverEvent::TransportClosed { reason };
                },
                Some(Ok(_)) => {},
                Some(Err(e)) => break DriverEvent::TransportError { reason: e.to_string() },
                None => break DriverEvent::TransportClosed { reason: "stream ended".to_owned() },
            },
        }
    };

    let _ = events.send((generation, ended));
}
