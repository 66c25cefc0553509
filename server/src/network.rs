//! Server network layer handling WebSocket connections and the event loop

use crate::client_manager::{ClientId, ClientManager};
use crate::session::Session;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::ClientMessage;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

pub type ServerResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Events sent from connection tasks to the main server loop
#[derive(Debug)]
pub enum ServerEvent {
    ClientConnected {
        client_id: ClientId,
        addr: SocketAddr,
        sender: mpsc::UnboundedSender<Message>,
    },
    MessageReceived {
        client_id: ClientId,
        text: String,
    },
    ClientDisconnected {
        client_id: ClientId,
    },
    Shutdown,
}

/// Cloneable handle for stopping a running [`Server`]
#[derive(Debug, Clone)]
pub struct ServerHandle {
    server_tx: mpsc::UnboundedSender<ServerEvent>,
}

impl ServerHandle {
    pub fn shutdown(&self) {
        if self.server_tx.send(ServerEvent::Shutdown).is_err() {
            debug!("Server already stopped");
        }
    }
}

/// Main server owning the session and serialising every connection event
///
/// Connection tasks only move bytes. Each open, message and close is turned
/// into a [`ServerEvent`] and handled to completion by [`Server::run`] before
/// the next one is looked at, so the session is never mutated concurrently.
pub struct Server {
    listener: Arc<TcpListener>,
    local_addr: SocketAddr,
    clients: ClientManager,
    session: Session,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerEvent>,
    server_rx: mpsc::UnboundedReceiver<ServerEvent>,
}

impl Server {
    pub async fn new(addr: &str) -> ServerResult<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Arc::new(listener),
            local_addr,
            clients: ClientManager::new(),
            session: Session::new(),
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            server_tx: self.server_tx.clone(),
        }
    }

    /// Spawns task that accepts TCP connections and hands each to its own task
    fn spawn_acceptor(&self) {
        let listener = Arc::clone(&self.listener);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut next_client_id: ClientId = 1;

            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        let client_id = next_client_id;
                        next_client_id = next_client_id.wrapping_add(1);
                        tokio::spawn(Self::serve_connection(
                            stream,
                            addr,
                            client_id,
                            server_tx.clone(),
                        ));
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }

                if server_tx.is_closed() {
                    break;
                }
            }
        });
    }

    /// Runs one connection: handshake, then a writer task fed by the
    /// registry and a reader loop feeding the server loop
    async fn serve_connection(
        stream: TcpStream,
        addr: SocketAddr,
        client_id: ClientId,
        server_tx: mpsc::UnboundedSender<ServerEvent>,
    ) {
        let ws_stream = match tokio_tungstenite::accept_async(stream).await {
            Ok(ws_stream) => ws_stream,
            Err(e) => {
                warn!("WebSocket handshake with {} failed: {}", addr, e);
                return;
            }
        };

        let (mut sink, mut source) = ws_stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

        if server_tx
            .send(ServerEvent::ClientConnected {
                client_id,
                addr,
                sender: tx,
            })
            .is_err()
        {
            return;
        }

        let writer = tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                let closing = matches!(frame, Message::Close(_));
                if let Err(e) = sink.send(frame).await {
                    debug!("Failed to write to client {}: {}", client_id, e);
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        while let Some(frame) = source.next().await {
            let text = match frame {
                Ok(Message::Text(text)) => text,
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                    Ok(text) => text,
                    Err(_) => {
                        warn!("Dropping non-UTF-8 binary frame from client {}", client_id);
                        continue;
                    }
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    debug!("Connection error on client {}: {}", client_id, e);
                    break;
                }
            };

            if server_tx
                .send(ServerEvent::MessageReceived { client_id, text })
                .is_err()
            {
                break;
            }
        }

        writer.abort();
        let _ = server_tx.send(ServerEvent::ClientDisconnected { client_id });
    }

    /// Applies one event to the session. Returns false when the loop should stop.
    fn handle_event(&mut self, event: ServerEvent) -> bool {
        match event {
            ServerEvent::ClientConnected {
                client_id,
                addr,
                sender,
            } => {
                self.clients.add_client(client_id, addr, sender);
                debug!("Connected clients: {:?}", self.clients.get_client_addrs());
                self.session.join(client_id, &mut self.clients);
            }

            ServerEvent::MessageReceived { client_id, text } => {
                match ClientMessage::from_json(&text) {
                    Ok(message) => {
                        self.session
                            .handle_message(client_id, message, &mut self.clients);
                    }
                    Err(e) => {
                        warn!("Dropping malformed message from client {}: {}", client_id, e);
                    }
                }
            }

            ServerEvent::ClientDisconnected { client_id } => {
                // Deregister first so the game-over notice only reaches those still here.
                self.clients.remove_client(&client_id);
                self.session.disconnect(client_id, &mut self.clients);
                debug!("{} client(s) still connected", self.clients.len());
            }

            ServerEvent::Shutdown => return false,
        }

        true
    }

    /// Main server loop. Processes connection events one at a time until shut down.
    pub async fn run(&mut self) -> ServerResult<()> {
        self.spawn_acceptor();
        info!("Server started on ws://{}", self.local_addr);

        while let Some(event) = self.server_rx.recv().await {
            if !self.handle_event(event) {
                break;
            }
        }

        info!("Server shutting down");
        Ok(())
    }
}
