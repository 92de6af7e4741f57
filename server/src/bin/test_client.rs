//! Headless client for poking a running server from the terminal.
//!
//! Opens a room (or joins one with `--join CODE`), then presses a random
//! arrow key now and then and logs every packet the server sends back.

use bincode::{deserialize, serialize};
use clap::Parser;
use log::{info, warn};
use rand::seq::SliceRandom;
use shared::{Packet, KEY_DOWN, KEY_LEFT, KEY_RIGHT, KEY_UP, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::UdpSocket;
use tokio::time::interval;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server address
    #[clap(short, long, default_value = "127.0.0.1:8080")]
    server: SocketAddr,
    /// Room code to join instead of opening a new room
    #[clap(short, long)]
    join: Option<String>,
    /// Milliseconds between random key presses
    #[clap(short, long, default_value = "700")]
    key_interval: u64,
}

// Get current timestamp in milliseconds
fn get_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

async fn send(socket: &UdpSocket, packet: &Packet, server: SocketAddr) -> std::io::Result<()> {
    let data = serialize(packet).map_err(std::io::Error::other)?;
    socket.send_to(&data, server).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    info!("Client socket bound to {}", socket.local_addr()?);

    send(
        &socket,
        &Packet::Connect {
            client_version: PROTOCOL_VERSION,
        },
        args.server,
    )
    .await?;

    let mut heartbeat = interval(Duration::from_secs(1));
    let mut keys = interval(Duration::from_millis(args.key_interval.max(1)));
    let mut buf = [0u8; 2048];
    let mut playing = false;

    loop {
        tokio::select! {
            received = socket.recv_from(&mut buf) => {
                let (len, _) = received?;
                let packet = match deserialize::<Packet>(&buf[0..len]) {
                    Ok(packet) => packet,
                    Err(e) => {
                        warn!("Failed to deserialize packet: {}", e);
                        continue;
                    }
                };

                match packet {
                    Packet::Connected { client_id } => {
                        info!("Connected as client {}", client_id);
                        let request = match &args.join {
                            Some(room_code) => Packet::JoinGame { room_code: room_code.clone() },
                            None => Packet::NewGame,
                        };
                        send(&socket, &request, args.server).await?;
                    }
                    Packet::GameCode { room_code } => info!("Room code: {}", room_code),
                    Packet::Init { player_number } => {
                        info!("Playing as player {}", player_number);
                        playing = true;
                    }
                    Packet::GameState { tick, snapshot } => {
                        let lengths: Vec<usize> =
                            snapshot.players.iter().map(|p| p.snake.len()).collect();
                        info!("Tick {}: food {:?}, lengths {:?}", tick, snapshot.food, lengths);
                    }
                    Packet::GameOver { winner } => {
                        match winner {
                            Some(player) => info!("Game over, player {} wins", player),
                            None => info!("Game over, draw"),
                        }
                        break;
                    }
                    Packet::UnknownGame | Packet::TooManyPlayers | Packet::Disconnected { .. } => {
                        warn!("Server refused us: {:?}", packet);
                        break;
                    }
                    other => warn!("Unexpected packet: {:?}", other),
                }
            }
            _ = heartbeat.tick() => {
                let packet = Packet::Heartbeat { timestamp: get_timestamp() };
                send(&socket, &packet, args.server).await?;
            }
            _ = keys.tick(), if playing => {
                let key_code = *[KEY_LEFT, KEY_UP, KEY_RIGHT, KEY_DOWN]
                    .choose(&mut rand::thread_rng())
                    .unwrap_or(&KEY_UP);
                send(&socket, &Packet::KeyDown { key_code }, args.server).await?;
            }
        }
    }

    send(&socket, &Packet::Disconnect, args.server).await?;
    info!("Test client finished");

    Ok(())
}
