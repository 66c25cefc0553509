//! WebSocket transport running on a background thread
//!
//! The render loop owns the game state and never blocks. A dedicated thread
//! runs a tokio runtime that holds the connection, reports server messages
//! through a std channel and writes outgoing messages after an optional
//! chaos delay.

use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use rand::Rng;
use shared::{ClientMessage, ServerMessage};
use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

/// What the transport reports back to the render loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    Connected,
    Message(ServerMessage),
    Disconnected,
    Error(String),
}

/// Random outbound delay used to provoke out-of-order arrival at the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChaosMode {
    pub enabled: bool,
    pub max_delay_ms: u64,
}

impl ChaosMode {
    pub const MAX_DELAY_MS: u64 = 2000;
    pub const DELAY_STEP_MS: i64 = 100;

    pub fn new(enabled: bool, max_delay_ms: u64) -> Self {
        Self {
            enabled,
            max_delay_ms: max_delay_ms.min(Self::MAX_DELAY_MS),
        }
    }

    pub fn toggle(&mut self) {
        self.enabled = !self.enabled;
        info!(
            "Chaos mode {} (max delay {}ms)",
            if self.enabled { "on" } else { "off" },
            self.max_delay_ms
        );
    }

    pub fn adjust(&mut self, delta_ms: i64) {
        let adjusted = (self.max_delay_ms as i64 + delta_ms).clamp(0, Self::MAX_DELAY_MS as i64);
        self.max_delay_ms = adjusted as u64;
        debug!("Chaos max delay set to {}ms", self.max_delay_ms);
    }

    /// Uniform delay in `0..=max_delay_ms`, or zero when disabled
    pub fn sample_delay<R: Rng>(&self, rng: &mut R) -> Duration {
        if !self.enabled || self.max_delay_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rng.gen_range(0..=self.max_delay_ms))
    }
}

impl Default for ChaosMode {
    fn default() -> Self {
        Self::new(false, 500)
    }
}

struct Outgoing {
    message: ClientMessage,
    delay: Duration,
}

/// Handle to the background connection
pub struct NetworkClient {
    events: std_mpsc::Receiver<NetworkEvent>,
    outgoing: mpsc::UnboundedSender<Outgoing>,
    _thread: JoinHandle<()>,
}

impl NetworkClient {
    /// Starts connecting to `url` in the background and returns immediately
    pub fn connect(url: &str) -> Self {
        let (events_tx, events) = std_mpsc::channel();
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let url = url.to_string();

        let thread = std::thread::spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    error!("Failed to start network runtime: {}", e);
                    let _ = events_tx.send(NetworkEvent::Error(e.to_string()));
                    return;
                }
            };
            runtime.block_on(run_connection(url, events_tx, outgoing_rx));
        });

        Self {
            events,
            outgoing,
            _thread: thread,
        }
    }

    /// Queues a message to be written after `delay`
    pub fn send(&self, message: ClientMessage, delay: Duration) {
        if self.outgoing.send(Outgoing { message, delay }).is_err() {
            debug!("Connection closed, message dropped");
        }
    }

    /// Drains every event received since the last call
    pub fn poll_events(&self) -> Vec<NetworkEvent> {
        self.events.try_iter().collect()
    }
}

async fn run_connection(
    url: String,
    events_tx: std_mpsc::Sender<NetworkEvent>,
    mut outgoing_rx: mpsc::UnboundedReceiver<Outgoing>,
) {
    info!("Connecting to {}", url);
    let ws_stream = match connect_async(url.as_str()).await {
        Ok((ws_stream, _)) => ws_stream,
        Err(e) => {
            error!("Failed to connect to {}: {}", url, e);
            let _ = events_tx.send(NetworkEvent::Error(e.to_string()));
            return;
        }
    };
    let _ = events_tx.send(NetworkEvent::Connected);

    let (mut sink, mut source) = ws_stream.split();

    // Delayed messages land here once their timer fires, in whatever order that is.
    let (ready_tx, mut ready_rx) = mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(async move {
        while let Some(text) = ready_rx.recv().await {
            if let Err(e) = sink.send(Message::Text(text)).await {
                warn!("Failed to send message: {}", e);
                break;
            }
        }
    });

    loop {
        tokio::select! {
            outgoing = outgoing_rx.recv() => {
                let Some(Outgoing { message, delay }) = outgoing else {
                    break;
                };
                let text = match message.to_json() {
                    Ok(text) => text,
                    Err(e) => {
                        error!("Failed to encode {:?}: {}", message, e);
                        continue;
                    }
                };
                if delay.is_zero() {
                    let _ = ready_tx.send(text);
                } else {
                    let ready_tx = ready_tx.clone();
                    tokio::spawn(async move {
                        sleep(delay).await;
                        let _ = ready_tx.send(text);
                    });
                }
            }

            frame = source.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => match ServerMessage::from_json(&text) {
                        Ok(message) => {
                            if events_tx.send(NetworkEvent::Message(message)).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Error parsing message: {}", e),
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        let _ = events_tx.send(NetworkEvent::Error(e.to_string()));
                        break;
                    }
                }
            }
        }
    }

    writer.abort();
    let _ = events_tx.send(NetworkEvent::Disconnected);
}
