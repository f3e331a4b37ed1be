//! Server network layer handling UDP communications and game loop coordination

use crate::client_manager::ClientManager;
use crate::game::GameState;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Environment, Move, Packet, ServerClock, VehicleError, WorldClock, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, MissedTickBehavior};

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { client_id: u32 },
    Shutdown,
}

/// Messages sent from game loop to network tasks
#[derive(Debug)]
pub enum GameMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
    BroadcastPacket { packet: Packet },
}

/// Tunables the binary exposes on the command line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServerConfig {
    pub tick_duration: Duration,
    pub snapshot_interval: Duration,
    pub max_clients: usize,
    /// Seconds a client may run ahead of world time before its moves are refused.
    pub clock_slack: f64,
    pub bots: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_duration: Duration::from_secs_f64(1.0 / 60.0),
            snapshot_interval: Duration::from_secs_f32(1.0 / shared::SNAPSHOT_RATE),
            max_clients: 16,
            clock_slack: 0.0,
            bots: 0,
        }
    }
}

/// Main server coordinating networking and game simulation
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    game_state: GameState,
    clock: ServerClock,
    config: ServerConfig,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(addr: &str, config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        let clock = ServerClock::new();
        let mut game_state = GameState::new(Environment::arena(), config.clock_slack);
        for _ in 0..config.bots {
            game_state.add_bot(clock.server_time_seconds());
        }

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(config.max_clients))),
            game_state,
            clock,
            config,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn game_state(&self) -> &GameState {
        &self.game_state
    }

    /// Sender into the main loop. Sending `ServerMessage::Shutdown` stops `run`.
    pub fn message_sender(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Tells every connected client the session is over. Sent directly so the
    /// packets are out before `run` returns.
    async fn disconnect_all(&mut self, reason: &str) {
        let client_addrs = {
            let clients = self.clients.read().await;
            clients.get_client_addrs()
        };

        let packet = Packet::Disconnected {
            reason: reason.to_string(),
        };
        for (client_id, addr) in &client_addrs {
            if let Err(e) = Self::send_packet_impl(&self.socket, &packet, *addr).await {
                error!("Failed to notify client {}: {}", client_id, e);
            }
        }

        let mut clients = self.clients.write().await;
        for (client_id, _) in &client_addrs {
            clients.remove_client(client_id);
            self.game_state.remove_kart(client_id);
        }
    }

    /// Spawns task that continuously listens for incoming packets
    async fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 2048];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    async fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet } => {
                        let client_addrs = {
                            let clients_guard = clients.read().await;
                            clients_guard.get_client_addrs()
                        };

                        for (client_id, addr) in client_addrs {
                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to client {}: {}", client_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    async fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for client_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id }) {
                        error!("Failed to send timeout message: {}", e);
                        break;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn broadcast_packet(&self, packet: Packet) {
        if let Err(e) = self.game_tx.send(GameMessage::BroadcastPacket { packet }) {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    /// Processes incoming packets and updates game state
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect { client_version } => self.handle_connect(client_version, addr).await,

            Packet::Move { kart_move } => self.handle_move(kart_move, addr).await,

            Packet::Disconnect => {
                let client_id = {
                    let clients = self.clients.read().await;
                    clients.find_client_by_addr(addr)
                };

                if let Some(client_id) = client_id {
                    let mut clients = self.clients.write().await;
                    clients.remove_client(&client_id);
                    self.game_state.remove_kart(&client_id);
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    async fn handle_connect(&mut self, client_version: u32, addr: SocketAddr) {
        info!(
            "Client connecting from {} (version: {})",
            addr, client_version
        );

        if client_version != PROTOCOL_VERSION {
            warn!(
                "Refusing {}: protocol {} but server speaks {}",
                addr, client_version, PROTOCOL_VERSION
            );
            let reason = "Protocol version mismatch".to_string();
            self.send_packet(Packet::Disconnected { reason }, addr);
            return;
        }

        // Remove existing connection if present
        let existing_client_id = {
            let clients = self.clients.read().await;
            clients.find_client_by_addr(addr)
        };

        if let Some(existing_id) = existing_client_id {
            info!("Removing existing client {} from {}", existing_id, addr);
            let mut clients = self.clients.write().await;
            clients.remove_client(&existing_id);
            self.game_state.remove_kart(&existing_id);
        }

        let client_id = {
            let mut clients = self.clients.write().await;
            clients.add_client(addr)
        };

        let Some(client_id) = client_id else {
            let reason = "Server full".to_string();
            self.send_packet(Packet::Disconnected { reason }, addr);
            return;
        };

        let server_time = self.clock.server_time_seconds();
        self.game_state.add_kart(client_id, server_time);
        self.send_packet(
            Packet::Connected {
                client_id,
                server_time,
            },
            addr,
        );

        // Only changed karts are broadcast, so the newcomer gets everything once.
        self.send_packet(
            Packet::Snapshots {
                server_time,
                karts: self.game_state.all_snapshots(),
            },
            addr,
        );
    }

    async fn handle_move(&mut self, kart_move: Move, addr: SocketAddr) {
        let client_id = {
            let mut clients = self.clients.write().await;
            let client_id = clients.find_client_by_addr(addr);
            if let Some(client_id) = client_id {
                clients.touch(client_id);
            }
            client_id
        };

        let Some(client_id) = client_id else {
            debug!("Move from unknown address {} absorbed", addr);
            return;
        };

        let world_time = self.clock.server_time_seconds();
        let accepted = match self.game_state.apply_move(client_id, &kart_move, world_time) {
            Ok(_) => true,
            Err(VehicleError::UnknownVehicle(kart_id)) => {
                debug!("Move for kart {} absorbed: no such kart", kart_id);
                return;
            }
            Err(e) => {
                debug!("Client {} move refused: {}", client_id, e);
                false
            }
        };

        let mut clients = self.clients.write().await;
        clients.record_move(client_id, accepted);
    }

    /// Broadcasts the snapshots that changed since the previous broadcast
    async fn broadcast_snapshots(&mut self) {
        let karts = self.game_state.changed_snapshots();
        if karts.is_empty() {
            return;
        }

        let client_count = {
            let clients = self.clients.read().await;
            clients.len()
        };

        if client_count == 0 {
            return;
        }

        let packet = Packet::Snapshots {
            server_time: self.clock.server_time_seconds(),
            karts,
        };

        self.broadcast_packet(packet);
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Initialize concurrent tasks
        self.spawn_network_receiver().await;
        self.spawn_network_sender().await;
        self.spawn_timeout_checker().await;

        let mut tick_interval = interval(self.config.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut snapshot_interval = interval(self.config.snapshot_interval);
        snapshot_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_tick = Instant::now();

        info!(
            "Server started: {:.0}Hz simulation, {:.2}Hz snapshots, {} bots",
            1.0 / self.config.tick_duration.as_secs_f64(),
            1.0 / self.config.snapshot_interval.as_secs_f64(),
            self.game_state.bot_count()
        );

        loop {
            tokio::select! {
                // Handle network events
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { client_id }) => {
                            self.game_state.remove_kart(&client_id);
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            self.disconnect_all("Server shutting down").await;
                            break;
                        }
                    }
                },

                // Advance karts the server drives itself
                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_tick).as_secs_f32();
                    last_tick = now;

                    self.game_state.tick(dt, &self.clock);

                    if self.game_state.tick % 600 == 0 {
                        let client_count = {
                            let clients = self.clients.read().await;
                            clients.len()
                        };
                        debug!(
                            "Tick {}: {} clients, {} karts, {:.1}Hz",
                            self.game_state.tick,
                            client_count,
                            self.game_state.kart_count(),
                            1.0 / dt
                        );
                    }
                },

                _ = snapshot_interval.tick() => {
                    self.broadcast_snapshots().await;
                },
            }
        }

        Ok(())
    }
}
