//! Per-room tick loop
//!
//! Every active room gets its own task driving a fixed-rate timer. The task
//! only remembers the room code; on each tick it looks the session up in the
//! registry again, so a room that was closed in the meantime simply ends the
//! loop instead of being advanced.

use crate::network::GameMessage;
use crate::room_registry::RoomRegistry;
use log::{debug, error, info};
use shared::Packet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

pub type SharedRegistry = Arc<RwLock<RoomRegistry>>;

enum TickResult {
    Running(Packet),
    Over(Packet),
    Closed,
}

/// Starts ticking a room that just became active.
pub fn spawn_room_loop(
    room_code: String,
    registry: SharedRegistry,
    outbound: mpsc::UnboundedSender<GameMessage>,
    tick_duration: Duration,
) -> JoinHandle<()> {
    tokio::spawn(run_room_loop(room_code, registry, outbound, tick_duration))
}

pub async fn run_room_loop(
    room_code: String,
    registry: SharedRegistry,
    outbound: mpsc::UnboundedSender<GameMessage>,
    tick_duration: Duration,
) {
    let mut interval_timer = interval(tick_duration);
    interval_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // Skip the first tick since it fires immediately
    interval_timer.tick().await;

    info!("Room {} ticking every {:?}", room_code, tick_duration);

    loop {
        interval_timer.tick().await;

        match tick_room(&room_code, &registry).await {
            TickResult::Running(packet) => {
                let message = GameMessage::BroadcastToRoom {
                    room_code: room_code.clone(),
                    packet,
                };
                if let Err(e) = outbound.send(message) {
                    error!("Failed to queue state for room {}: {}", room_code, e);
                    registry.write().await.finish(&room_code).await;
                    break;
                }
            }
            TickResult::Over(packet) => {
                registry.write().await.finish(&room_code).await;

                let messages = [
                    GameMessage::BroadcastToRoom {
                        room_code: room_code.clone(),
                        packet,
                    },
                    GameMessage::CloseRoom {
                        room_code: room_code.clone(),
                    },
                ];
                for message in messages {
                    if let Err(e) = outbound.send(message) {
                        error!("Failed to queue game over for room {}: {}", room_code, e);
                    }
                }
                break;
            }
            TickResult::Closed => {
                debug!("Room {} is gone, stopping its loop", room_code);
                break;
            }
        }
    }

    info!("Room {} stopped ticking", room_code);
}

/// Runs one simulation step under the session lock.
async fn tick_room(room_code: &str, registry: &SharedRegistry) -> TickResult {
    let Some(session) = registry.read().await.session(room_code) else {
        return TickResult::Closed;
    };

    let mut state = session.lock().await;
    if !state.is_active() {
        return TickResult::Closed;
    }

    match state.step() {
        None => TickResult::Running(Packet::GameState {
            tick: state.tick,
            snapshot: state.snapshot(),
        }),
        Some(outcome) => TickResult::Over(Packet::GameOver {
            winner: outcome.winner(),
        }),
    }
}
