//! Server network layer handling UDP communications and room coordination

use crate::client_manager::{ClientManager, Seat};
use crate::config::ServerConfig;
use crate::game_loop::{spawn_room_loop, SharedRegistry};
use crate::game::Phase;
use crate::room_registry::{JoinRejection, RoomRegistry};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Packet, PlayerNumber, PROTOCOL_VERSION};
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};

pub type ServerResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    ClientTimeout {
        client_id: u32,
        seats: Vec<Seat>,
    },
    Shutdown,
}

/// Messages sent from the dispatch loop and room loops to the sender task
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    /// Resolved to the room's members when it is sent.
    BroadcastToRoom {
        room_code: String,
        packet: Packet,
    },
    /// Unseats the members of a room that left the registry. Queued after
    /// the room's last broadcast so that broadcast still reaches them.
    CloseRoom {
        room_code: String,
    },
}

/// Main server pairing clients into rooms and relaying their games
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    registry: SharedRegistry,
    config: ServerConfig,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(addr: &str, config: ServerConfig) -> ServerResult<Self> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(config.max_clients))),
            registry: Arc::new(RwLock::new(RoomRegistry::new(config.grid_size))),
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

    /// Sender that stops `run` when sent `ServerMessage::Shutdown`.
    pub fn control(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
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
                    GameMessage::BroadcastToRoom { room_code, packet } => {
                        let members = {
                            let clients_guard = clients.read().await;
                            clients_guard.room_members(&room_code)
                        };

                        for (client_id, addr) in members {
                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to client {}: {}", client_id, e);
                            }
                        }
                    }
                    GameMessage::CloseRoom { room_code } => {
                        let released = clients.write().await.release_room(&room_code);
                        debug!("Unseated {} clients from room {}", released, room_code);
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    async fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();
        let timeout = self.config.client_timeout;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts(timeout)
                };

                for client in timed_out {
                    info!("Client {} timed out", client.id);
                    let message = ServerMessage::ClientTimeout {
                        client_id: client.id,
                        seats: client.seats,
                    };
                    if let Err(e) = server_tx.send(message) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(socket: &UdpSocket, packet: &Packet, addr: SocketAddr) -> ServerResult<()> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn queue(&self, message: GameMessage) {
        if let Err(e) = self.game_tx.send(message) {
            error!("Failed to queue outgoing message: {}", e);
        }
    }

    /// Processes incoming packets
    async fn handle_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Packet::Connect { client_version } = packet {
            self.handle_connect(client_version, addr).await;
            return;
        }

        let client_id = {
            let mut clients = self.clients.write().await;
            let client_id = clients.find_client_by_addr(addr);
            if let Some(id) = client_id {
                clients.refresh(id);
            }
            client_id
        };

        let Some(client_id) = client_id else {
            warn!("Packet from unconnected address {}", addr);
            return;
        };

        match packet {
            Packet::Heartbeat { .. } => {}
            Packet::NewGame => self.handle_new_game(client_id, addr).await,
            Packet::JoinGame { room_code } => self.handle_join_game(client_id, addr, room_code).await,
            Packet::KeyDown { key_code } => self.handle_key_down(client_id, key_code).await,
            Packet::Disconnect => self.handle_disconnect(client_id).await,
            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    async fn handle_connect(&self, client_version: u32, addr: SocketAddr) {
        info!(
            "Client connecting from {} (version: {})",
            addr, client_version
        );

        if client_version != PROTOCOL_VERSION {
            let reason = format!(
                "Protocol version mismatch: server speaks {}",
                PROTOCOL_VERSION
            );
            self.send_packet(Packet::Disconnected { reason }, addr);
            return;
        }

        // Remove existing connection if present
        let existing = {
            let mut clients = self.clients.write().await;
            clients
                .find_client_by_addr(addr)
                .and_then(|id| clients.remove_client(&id))
        };

        if let Some(client) = existing {
            self.leave_rooms(client.seats).await;
        }

        let client_id = {
            let mut clients = self.clients.write().await;
            clients.add_client(addr)
        };

        match client_id {
            Some(client_id) => self.send_packet(Packet::Connected { client_id }, addr),
            None => {
                let reason = "Server full".to_string();
                self.send_packet(Packet::Disconnected { reason }, addr);
            }
        }
    }

    async fn handle_new_game(&self, client_id: u32, addr: SocketAddr) {
        self.leave_running_games(client_id).await;

        let registered = self.registry.write().await.register_new_room();
        let room_code = match registered {
            Ok(code) => code,
            Err(e) => {
                error!("Could not open a room for client {}: {}", client_id, e);
                let reason = e.to_string();
                self.send_packet(Packet::Disconnected { reason }, addr);
                return;
            }
        };

        self.clients.write().await.assign_seat(
            client_id,
            Seat {
                room_code: room_code.clone(),
                player: PlayerNumber::One,
            },
        );

        self.send_packet(Packet::GameCode { room_code }, addr);
        self.send_packet(
            Packet::Init {
                player_number: PlayerNumber::One,
            },
            addr,
        );
    }

    async fn handle_join_game(&self, client_id: u32, addr: SocketAddr, room_code: String) {
        let already_seated = self
            .clients
            .read()
            .await
            .is_seated_in(client_id, &room_code);

        if already_seated {
            debug!("Client {} tried to join its own room {}", client_id, room_code);
            self.send_packet(Packet::TooManyPlayers, addr);
            return;
        }

        let joined = self.registry.read().await.join_room(&room_code).await;
        let player = match joined {
            Ok(player) => player,
            Err(JoinRejection::UnknownRoom) => {
                info!("Client {} asked for unknown room {}", client_id, room_code);
                self.send_packet(Packet::UnknownGame, addr);
                return;
            }
            Err(JoinRejection::RoomFull) => {
                info!("Client {} turned away from full room {}", client_id, room_code);
                self.send_packet(Packet::TooManyPlayers, addr);
                return;
            }
        };

        self.leave_running_games(client_id).await;
        self.clients.write().await.assign_seat(
            client_id,
            Seat {
                room_code: room_code.clone(),
                player,
            },
        );

        self.send_packet(
            Packet::GameCode {
                room_code: room_code.clone(),
            },
            addr,
        );
        self.send_packet(Packet::Init { player_number: player }, addr);

        spawn_room_loop(
            room_code,
            Arc::clone(&self.registry),
            self.game_tx.clone(),
            self.config.tick_duration,
        );
    }

    async fn handle_key_down(&self, client_id: u32, key_code: u32) {
        let seat = self.clients.read().await.current_seat(client_id).cloned();
        let Some(seat) = seat else {
            debug!("Key {} from client {} outside any room", key_code, client_id);
            return;
        };

        self.registry
            .read()
            .await
            .apply_input(&seat.room_code, seat.player, key_code)
            .await;
    }

    async fn handle_disconnect(&self, client_id: u32) {
        let removed = self.clients.write().await.remove_client(&client_id);
        if let Some(client) = removed {
            self.leave_rooms(client.seats).await;
        }
    }

    /// Gives up every game the client is playing before it takes a new seat.
    /// Rooms still waiting for an opponent stay open and joinable.
    async fn leave_running_games(&self, client_id: u32) {
        let seats = self.clients.read().await.seats_of(client_id).to_vec();

        for seat in seats {
            let phase = self.registry.read().await.phase(&seat.room_code).await;
            if phase == Some(Phase::AwaitingSecondPlayer) {
                continue;
            }

            let removed = self
                .clients
                .write()
                .await
                .remove_seat(client_id, &seat.room_code);
            if let Some(seat) = removed {
                self.leave_room(seat).await;
            }
        }
    }

    async fn leave_rooms(&self, seats: Vec<Seat>) {
        for seat in seats {
            self.leave_room(seat).await;
        }
    }

    /// Closes the room a departing player sat in, telling the opponent
    /// they won if the game was running.
    async fn leave_room(&self, seat: Seat) {
        let outcome = self
            .registry
            .write()
            .await
            .abandon(&seat.room_code, seat.player)
            .await;

        if let Some(outcome) = outcome {
            self.queue(GameMessage::BroadcastToRoom {
                room_code: seat.room_code.clone(),
                packet: Packet::GameOver {
                    winner: outcome.winner(),
                },
            });
        }

        self.queue(GameMessage::CloseRoom {
            room_code: seat.room_code,
        });
    }

    /// Main server loop dispatching inbound packets
    pub async fn run(&mut self) -> ServerResult<()> {
        // Initialize concurrent tasks
        self.spawn_network_receiver().await;
        self.spawn_network_sender().await;
        self.spawn_timeout_checker().await;

        info!("Server started successfully");

        loop {
            match self.server_rx.recv().await {
                Some(ServerMessage::PacketReceived { packet, addr }) => {
                    self.handle_packet(packet, addr).await;
                }
                Some(ServerMessage::ClientTimeout { client_id, seats }) => {
                    debug!("Releasing {} seats of timed out client {}", seats.len(), client_id);
                    self.leave_rooms(seats).await;
                }
                Some(ServerMessage::Shutdown) | None => {
                    info!("Server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}
