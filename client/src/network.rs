use crate::game::ClientGameState;
use crate::input::InputManager;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Environment, ObserverMode, Packet, SyncedClock, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};

/// Silence from the server after which the session is considered lost.
pub const SERVER_TIMEOUT: Duration = Duration::from_secs(5);

/// Tunables the binary exposes on the command line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientConfig {
    pub tick_duration: Duration,
    pub throttle: f32,
    pub steering: f32,
    pub weave_period: f32,
    pub observer_mode: ObserverMode,
    /// Simulated round-trip latency, split evenly between both directions.
    pub fake_ping_ms: u64,
    pub report_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            tick_duration: Duration::from_secs_f64(1.0 / 60.0),
            throttle: 1.0,
            steering: 0.5,
            weave_period: 6.0,
            observer_mode: ObserverMode::Hermite,
            fake_ping_ms: 0,
            report_interval: Duration::from_secs(1),
        }
    }
}

/// Holds each item back until `delay` after it was queued, preserving order.
pub fn spawn_delay_line<T: Send + 'static>(
    delay: Duration,
    out: mpsc::UnboundedSender<T>,
) -> mpsc::UnboundedSender<(Instant, T)> {
    let (tx, mut rx) = mpsc::unbounded_channel::<(Instant, T)>();

    tokio::spawn(async move {
        while let Some((queued_at, item)) = rx.recv().await {
            sleep_until(queued_at + delay).await;
            if out.send(item).is_err() {
                break;
            }
        }
    });

    tx
}

pub struct Client {
    socket: Arc<UdpSocket>,
    server_addr: SocketAddr,
    client_id: Option<u32>,
    connected: bool,

    game_state: ClientGameState,
    input_manager: InputManager,
    clock: SyncedClock,
    config: ClientConfig,
    started: Instant,
    last_heard: Instant,

    outbound: mpsc::UnboundedSender<(Instant, Packet)>,
    outbound_rx: Option<mpsc::UnboundedReceiver<Packet>>,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        config: ClientConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind("0.0.0.0:0").await?);
        let server_addr = server_addr.parse()?;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let outbound = spawn_delay_line(Duration::from_millis(config.fake_ping_ms / 2), outbound_tx);

        Ok(Client {
            socket,
            server_addr,
            client_id: None,
            connected: false,
            game_state: ClientGameState::new(Environment::arena(), config.observer_mode),
            input_manager: InputManager::new(config.throttle, config.steering, config.weave_period),
            clock: SyncedClock::new(),
            config,
            started: Instant::now(),
            last_heard: Instant::now(),
            outbound,
            outbound_rx: Some(outbound_rx),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn game_state(&self) -> &ClientGameState {
        &self.game_state
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Spawns task that writes queued packets to the socket once their delay has passed
    fn spawn_network_sender(&mut self) {
        let Some(mut outbound_rx) = self.outbound_rx.take() else {
            return;
        };
        let socket = Arc::clone(&self.socket);
        let server_addr = self.server_addr;

        tokio::spawn(async move {
            while let Some(packet) = outbound_rx.recv().await {
                match serialize(&packet) {
                    Ok(data) => {
                        if let Err(e) = socket.send_to(&data, server_addr).await {
                            error!("Failed to send packet: {}", e);
                        }
                    }
                    Err(e) => error!("Failed to serialize packet: {}", e),
                }
            }
        });
    }

    /// Spawns task that reads packets and hands them on after the simulated latency
    fn spawn_network_receiver(&self) -> mpsc::UnboundedReceiver<Packet> {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let delayed = spawn_delay_line(Duration::from_millis(self.config.fake_ping_ms / 2), inbound_tx);
        let socket = Arc::clone(&self.socket);

        tokio::spawn(async move {
            let mut buffer = [0u8; 8192];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match deserialize::<Packet>(&buffer[0..len]) {
                        Ok(packet) => {
                            if delayed.send((Instant::now(), packet)).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Failed to deserialize packet from {}: {}", addr, e),
                    },
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });

        inbound_rx
    }

    fn send_packet(&self, packet: Packet) {
        if self.outbound.send((Instant::now(), packet)).is_err() {
            error!("Failed to queue packet for sending");
        }
    }

    fn connect(&self) {
        info!("Connecting to server at {}...", self.server_addr);
        self.send_packet(Packet::Connect {
            client_version: PROTOCOL_VERSION,
        });
    }

    pub fn handle_packet(&mut self, packet: Packet) {
        self.last_heard = Instant::now();

        match packet {
            Packet::Connected {
                client_id,
                server_time,
            } => {
                info!("Connected! Client ID: {}", client_id);
                self.clock.observe(server_time);
                self.client_id = Some(client_id);
                self.connected = true;
                self.game_state.set_client_id(Some(client_id));
            }

            Packet::Snapshots { server_time, karts } => {
                self.clock.observe(server_time);
                debug!("Snapshot for {} karts at {:.3}s", karts.len(), server_time);
                self.game_state.apply_snapshots(&karts);
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.connected = false;
                self.client_id = None;
                self.game_state.set_client_id(None);
            }

            _ => {
                warn!("Unexpected packet type");
            }
        }
    }

    /// Drops the session if nothing has arrived from the server for
    /// [`SERVER_TIMEOUT`]. Returns true when the session was dropped.
    pub fn check_server_timeout(&mut self, now: Instant) -> bool {
        if !self.connected || now.duration_since(self.last_heard) <= SERVER_TIMEOUT {
            return false;
        }

        warn!(
            "No packets from server for {:.1}s, reconnecting",
            now.duration_since(self.last_heard).as_secs_f32()
        );
        self.connected = false;
        self.client_id = None;
        self.game_state.set_client_id(None);
        true
    }

    /// Samples input and advances every kart by one tick.
    fn tick(&mut self, delta_time: f32) {
        let elapsed = self.started.elapsed().as_secs_f32();
        let controls = self.input_manager.update(elapsed);

        if let Some(kart_move) = self.game_state.tick(delta_time, controls, &self.clock) {
            if self.connected {
                self.send_packet(Packet::Move { kart_move });
            }
        }
    }

    fn report(&self) {
        let Some(client_id) = self.client_id else {
            info!("Not connected");
            return;
        };

        info!(
            "Client {}: {} karts, {} moves awaiting acknowledgement",
            client_id,
            self.game_state.vehicle_count(),
            self.game_state.pending_moves()
        );
        for view in self.game_state.views() {
            let position = view.state.pose.position;
            info!(
                "  kart {:>4} [{}] at ({:>7.2}, {:>7.2}) speed {:.2} m/s",
                view.kart_id,
                view.role,
                position.x,
                position.y,
                view.state.velocity.length()
            );
        }
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_sender();
        let mut inbound = self.spawn_network_receiver();

        if self.config.fake_ping_ms > 0 {
            info!("Simulating {}ms latency", self.config.fake_ping_ms);
        }

        let mut tick_interval = interval(self.config.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut report_interval = interval(self.config.report_interval);
        let mut connect_interval = interval(Duration::from_secs(1));
        let mut last_tick = Instant::now();

        loop {
            tokio::select! {
                packet = inbound.recv() => {
                    match packet {
                        Some(packet) => self.handle_packet(packet),
                        None => {
                            error!("Network receiver stopped");
                            break;
                        }
                    }
                },

                _ = connect_interval.tick(), if !self.connected => {
                    self.connect();
                },

                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_tick).as_secs_f32();
                    last_tick = now;
                    self.check_server_timeout(now);
                    self.tick(dt);
                },

                _ = report_interval.tick() => {
                    self.report();
                },

                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl+C, shutting down...");
                    break;
                }
            }
        }

        if self.connected {
            self.send_packet(Packet::Disconnect);
            // Give the sender task a moment to flush through the delay line.
            tokio::time::sleep(Duration::from_millis(self.config.fake_ping_ms / 2 + 50)).await;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use shared::{AuthoritativeSnapshot, KartSnapshot, NetRole, Pose, VehicleState};

    #[tokio::test]
    async fn test_delay_line_preserves_order_and_delays() {
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let delay = Duration::from_millis(30);
        let line = spawn_delay_line(delay, out_tx);

        let queued = Instant::now();
        for i in 0..5u32 {
            line.send((Instant::now(), i)).unwrap();
        }

        let mut received = Vec::new();
        for _ in 0..5 {
            received.push(out_rx.recv().await.unwrap());
        }

        assert_eq!(received, vec![0, 1, 2, 3, 4]);
        assert!(queued.elapsed() >= delay);
    }

    #[tokio::test]
    async fn test_connected_and_snapshots_packets() {
        let mut client = Client::new("127.0.0.1:9", ClientConfig::default()).await.unwrap();
        assert!(!client.is_connected());

        client.handle_packet(Packet::Connected {
            client_id: 4,
            server_time: 12.0,
        });
        assert!(client.is_connected());
        assert!(client.clock.is_synchronized());

        let state = VehicleState::at_rest(Pose::new(Vec3::new(1.0, 2.0, 0.0), Default::default()));
        client.handle_packet(Packet::Snapshots {
            server_time: 12.5,
            karts: vec![
                KartSnapshot {
                    kart_id: 4,
                    snapshot: AuthoritativeSnapshot::spawn(state, 12.0),
                },
                KartSnapshot {
                    kart_id: 1000,
                    snapshot: AuthoritativeSnapshot::spawn(state, 12.0),
                },
            ],
        });

        assert_eq!(client.game_state().role_of(4), Some(NetRole::ControllingClient));
        assert_eq!(client.game_state().role_of(1000), Some(NetRole::Observer));

        client.handle_packet(Packet::Disconnected {
            reason: "Server full".to_string(),
        });
        assert!(!client.is_connected());
        assert_eq!(client.game_state().vehicle_count(), 0);
    }

    #[tokio::test]
    async fn test_server_silence_drops_session() {
        let mut client = Client::new("127.0.0.1:9", ClientConfig::default()).await.unwrap();
        client.handle_packet(Packet::Connected {
            client_id: 4,
            server_time: 12.0,
        });
        let state = VehicleState::at_rest(Pose::new(Vec3::ZERO, Default::default()));
        client.handle_packet(Packet::Snapshots {
            server_time: 12.0,
            karts: vec![KartSnapshot {
                kart_id: 4,
                snapshot: AuthoritativeSnapshot::spawn(state, 12.0),
            }],
        });
        let heard = Instant::now();

        assert!(!client.check_server_timeout(heard + Duration::from_secs(1)));
        assert!(client.is_connected());

        assert!(client.check_server_timeout(heard + SERVER_TIMEOUT + Duration::from_secs(1)));
        assert!(!client.is_connected());
        assert_eq!(client.game_state().vehicle_count(), 0);
        assert_eq!(client.game_state().pending_moves(), 0);

        // Already disconnected: nothing more to drop.
        assert!(!client.check_server_timeout(heard + SERVER_TIMEOUT * 2));
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.observer_mode, ObserverMode::Hermite);
        assert_eq!(config.fake_ping_ms, 0);
        assert!(config.weave_period > 0.0);
    }
}
