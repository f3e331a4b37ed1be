//! Connection bookkeeping for the authority
//!
//! This module tracks who is connected and where to send their packets:
//! - Client connection lifecycle (connect, disconnect, timeout)
//! - Per-connection move statistics for diagnostics
//! - Client capacity management and address tracking
//!
//! Moves themselves are not buffered here. They are validated and simulated
//! the moment they arrive, in arrival order, by the game state.

use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A connection is dropped after this long without any packet.
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Represents a connected client
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier, also the id of the kart it controls
    pub id: u32,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
    /// Moves the authority accepted from this client
    pub moves_accepted: u64,
    /// Moves the authority rejected from this client
    pub moves_rejected: u64,
}

impl Client {
    pub fn new(id: u32, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            moves_accepted: 0,
            moves_rejected: 0,
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Checks if the client has exceeded the connection timeout
    ///
    /// Returns true if no packets have been received from this client
    /// within the specified timeout duration, indicating a likely disconnect.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected clients
///
/// Client ids double as kart ids, so they are never reused within one
/// server run.
pub struct ClientManager {
    /// Connected clients indexed by their unique ID
    clients: HashMap<u32, Client>,
    /// Next available client ID for new connections
    next_client_id: u32,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
}

impl ClientManager {
    /// Client IDs start from 1 and increment for each new connection.
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Attempts to add a new client connection
    ///
    /// Returns Some(client_id) if successful, None if server is at capacity.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<u32> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        let client = Client::new(client_id, addr);
        info!("Client {} connected from {}", client_id, addr);
        self.clients.insert(client_id, client);

        Some(client_id)
    }

    /// Removes a client from the server
    ///
    /// Returns true if the client was found and removed, false if they were
    /// already gone.
    pub fn remove_client(&mut self, client_id: &u32) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!(
                "Client {} disconnected ({} moves accepted, {} rejected)",
                client.id, client.moves_accepted, client.moves_rejected
            );
            true
        } else {
            false
        }
    }

    /// Finds a client ID by their network address
    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    /// Marks the client as alive. Returns false if the client ID is unknown.
    pub fn touch(&mut self, client_id: u32) -> bool {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.touch();
            true
        } else {
            false
        }
    }

    pub fn record_move(&mut self, client_id: u32, accepted: bool) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            if accepted {
                client.moves_accepted += 1;
            } else {
                client.moves_rejected += 1;
            }
        }
    }

    pub fn get_client(&self, client_id: u32) -> Option<&Client> {
        self.clients.get(&client_id)
    }

    /// Checks for and removes timed-out clients
    ///
    /// Returns the removed client IDs so their karts can be despawned.
    pub fn check_timeouts(&mut self) -> Vec<u32> {
        let timed_out: Vec<u32> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(CLIENT_TIMEOUT))
            .map(|(id, _)| *id)
            .collect();

        for client_id in &timed_out {
            self.remove_client(client_id);
        }

        timed_out
    }

    /// Gets all client IDs and their network addresses
    pub fn get_client_addrs(&self) -> Vec<(u32, SocketAddr)> {
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
