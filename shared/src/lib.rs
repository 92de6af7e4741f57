use serde::{Deserialize, Serialize};
use std::fmt;

/// Snapshots broadcast per second while a room is active.
pub const FRAME_RATE: u32 = 10;
/// Cells along each axis of the square board.
pub const GRID_SIZE: i32 = 20;
/// Smallest board that fits both starting cells and a piece of food.
pub const MIN_GRID_SIZE: i32 = 4;
pub const ROOM_CODE_LENGTH: usize = 5;
pub const PROTOCOL_VERSION: u32 = 1;

pub const KEY_LEFT: u32 = 37;
pub const KEY_UP: u32 = 38;
pub const KEY_RIGHT: u32 = 39;
pub const KEY_DOWN: u32 = 40;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, velocity: Velocity) -> Self {
        Self {
            x: self.x + velocity.dx,
            y: self.y + velocity.dy,
        }
    }

    pub fn in_bounds(self, grid_size: i32) -> bool {
        (0..grid_size).contains(&self.x) && (0..grid_size).contains(&self.y)
    }
}

/// Grid cells moved per tick. Exactly one axis is non-zero unless at rest.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Velocity {
    pub dx: i32,
    pub dy: i32,
}

impl Velocity {
    pub const REST: Velocity = Velocity { dx: 0, dy: 0 };
    pub const LEFT: Velocity = Velocity { dx: -1, dy: 0 };
    pub const UP: Velocity = Velocity { dx: 0, dy: -1 };
    pub const RIGHT: Velocity = Velocity { dx: 1, dy: 0 };
    pub const DOWN: Velocity = Velocity { dx: 0, dy: 1 };

    pub fn is_rest(self) -> bool {
        self == Self::REST
    }

    pub fn reversed(self) -> Self {
        Self {
            dx: -self.dx,
            dy: -self.dy,
        }
    }
}

/// Seat of a player inside a room. Serialized positionally, shown as 1 or 2.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerNumber {
    One,
    Two,
}

impl PlayerNumber {
    pub const ALL: [PlayerNumber; 2] = [PlayerNumber::One, PlayerNumber::Two];

    /// Index into `players` arrays and snapshots.
    pub fn index(self) -> usize {
        match self {
            PlayerNumber::One => 0,
            PlayerNumber::Two => 1,
        }
    }

    pub fn number(self) -> u8 {
        self.index() as u8 + 1
    }

    pub fn opponent(self) -> Self {
        match self {
            PlayerNumber::One => PlayerNumber::Two,
            PlayerNumber::Two => PlayerNumber::One,
        }
    }
}

impl fmt::Display for PlayerNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PlayerSnapshot {
    /// Head first.
    pub snake: Vec<Position>,
    pub velocity: Velocity,
}

/// Whole-board state sent once per tick. `players[0]` is player 1.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GameSnapshot {
    pub grid_size: i32,
    pub food: Position,
    pub players: Vec<PlayerSnapshot>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum Packet {
    Connect {
        client_version: u32,
    },
    Heartbeat {
        timestamp: u64,
    },
    NewGame,
    JoinGame {
        room_code: String,
    },
    KeyDown {
        key_code: u32,
    },
    Disconnect,

    Connected {
        client_id: u32,
    },
    Init {
        player_number: PlayerNumber,
    },
    GameCode {
        room_code: String,
    },
    GameState {
        tick: u32,
        snapshot: GameSnapshot,
    },
    GameOver {
        /// `None` when both snakes died on the same tick.
        winner: Option<PlayerNumber>,
    },
    UnknownGame,
    TooManyPlayers,
    Disconnected {
        reason: String,
    },
}
