//! Registry of open WebSocket connections and message delivery to them
//!
//! This module tracks every connection the server has accepted, whether or
//! not it holds a player slot:
//! - Connection lifecycle (register on open, remove on close)
//! - Unicast delivery to one connection
//! - Broadcast delivery to every open connection
//! - Server-initiated close for rejected connections
//!
//! Delivery never fails loudly. A connection whose writer task has already
//! gone away, or that the server has asked to close, is simply skipped.

use log::{debug, error, info};
use shared::ServerMessage;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;
use tokio_tungstenite::tungstenite::Message;

pub type ClientId = u32;

/// An accepted connection and the channel feeding its writer task
#[derive(Debug)]
pub struct Client {
    /// Identifier assigned by the listener in accept order
    pub id: ClientId,
    /// Peer address, kept for logging
    pub addr: SocketAddr,
    /// When the WebSocket handshake completed
    pub connected_at: Instant,
    sender: UnboundedSender<Message>,
    closing: bool,
}

impl Client {
    pub fn new(id: ClientId, addr: SocketAddr, sender: UnboundedSender<Message>) -> Self {
        Self {
            id,
            addr,
            connected_at: Instant::now(),
            sender,
            closing: false,
        }
    }

    /// True while the writer task is alive and no close has been requested
    pub fn is_open(&self) -> bool {
        !self.closing && !self.sender.is_closed()
    }

    fn deliver(&self, frame: Message) -> bool {
        if !self.is_open() {
            return false;
        }
        self.sender.send(frame).is_ok()
    }
}

/// Tracks open connections and fans out server messages
///
/// The registry owns no game state. It is told what to send by the session
/// and only knows how to reach each connection.
#[derive(Debug, Default)]
pub struct ClientManager {
    clients: HashMap<ClientId, Client>,
}

impl ClientManager {
    pub fn new() -> Self {
        Self {
            clients: HashMap::new(),
        }
    }

    /// Registers a freshly opened connection
    pub fn add_client(&mut self, id: ClientId, addr: SocketAddr, sender: UnboundedSender<Message>) {
        info!("Client {} connected from {}", id, addr);
        self.clients.insert(id, Client::new(id, addr, sender));
    }

    /// Forgets a connection. Returns false if it was already gone.
    pub fn remove_client(&mut self, id: &ClientId) -> bool {
        if let Some(client) = self.clients.remove(id) {
            info!(
                "Client {} disconnected after {:.1}s",
                client.id,
                client.connected_at.elapsed().as_secs_f32()
            );
            true
        } else {
            false
        }
    }

    pub fn is_open(&self, id: ClientId) -> bool {
        self.clients.get(&id).is_some_and(Client::is_open)
    }

    /// Sends a message to one connection.
    ///
    /// Returns false without side effects when the connection is unknown
    /// or not open.
    pub fn send_to(&self, id: ClientId, message: &ServerMessage) -> bool {
        let Some(client) = self.clients.get(&id) else {
            debug!("Dropping message for unknown client {}", id);
            return false;
        };
        let Some(text) = encode(message) else {
            return false;
        };
        let delivered = client.deliver(Message::Text(text));
        if !delivered {
            debug!("Client {} is not open, message dropped", id);
        }
        delivered
    }

    /// Sends a message to every open connection and returns how many
    /// recipients it was queued for.
    pub fn broadcast(&self, message: &ServerMessage) -> usize {
        let Some(text) = encode(message) else {
            return 0;
        };
        self.clients
            .values()
            .filter(|client| client.deliver(Message::Text(text.clone())))
            .count()
    }

    /// Asks a connection's writer task to send a close frame.
    ///
    /// The connection stays registered until its reader reports the close,
    /// but is treated as not open from here on.
    pub fn close_client(&mut self, id: ClientId) {
        if let Some(client) = self.clients.get_mut(&id) {
            if !client.closing {
                let _ = client.sender.send(Message::Close(None));
                client.closing = true;
                debug!("Closing client {}", id);
            }
        }
    }

    /// Gets all client IDs and their peer addresses
    pub fn get_client_addrs(&self) -> Vec<(ClientId, SocketAddr)> {
        self.clients
            .iter()
            .map(|(id, client)| (*id, client.addr))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

fn encode(message: &ServerMessage) -> Option<String> {
    match message.to_json() {
        Ok(text) => Some(text),
        Err(e) => {
            error!("Failed to encode {:?}: {}", message, e);
            None
        }
    }
}
