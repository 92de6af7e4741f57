use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{
    GameSnapshot, PlayerNumber, PlayerSnapshot, Position, Velocity, KEY_DOWN, KEY_LEFT, KEY_RIGHT,
    KEY_UP, MIN_GRID_SIZE,
};
use std::collections::VecDeque;

/// Maps a key code to a new velocity.
///
/// Returns `None` for unrecognised keys and for a request that would turn
/// the snake straight back into its own neck. While the snake is still at
/// rest any direction is accepted.
pub fn update_velocity(key_code: u32, current: Velocity) -> Option<Velocity> {
    let requested = match key_code {
        KEY_LEFT => Velocity::LEFT,
        KEY_UP => Velocity::UP,
        KEY_RIGHT => Velocity::RIGHT,
        KEY_DOWN => Velocity::DOWN,
        _ => return None,
    };

    if !current.is_rest() && requested == current.reversed() {
        return None;
    }

    Some(requested)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingSecondPlayer,
    Active,
    Finished,
}

/// Terminal result of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameOutcome {
    Winner(PlayerNumber),
    /// Both snakes died on the same tick.
    Draw,
}

impl GameOutcome {
    pub fn winner(self) -> Option<PlayerNumber> {
        match self {
            GameOutcome::Winner(player) => Some(player),
            GameOutcome::Draw => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Player {
    /// Head at the front. Never empty.
    pub snake: VecDeque<Position>,
    pub velocity: Velocity,
}

impl Player {
    pub fn new(start: Position) -> Self {
        Self::with_body(vec![start], Velocity::REST)
    }

    pub fn with_body(body: Vec<Position>, velocity: Velocity) -> Self {
        debug_assert!(!body.is_empty(), "a snake needs at least one cell");
        Self {
            snake: body.into(),
            velocity,
        }
    }

    pub fn head(&self) -> Position {
        self.snake[0]
    }

    pub fn len(&self) -> usize {
        self.snake.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snake.is_empty()
    }

    pub fn occupies(&self, pos: Position) -> bool {
        self.snake.contains(&pos)
    }
}

/// Authoritative state of one room.
#[derive(Debug, Clone)]
pub struct GameState {
    pub tick: u32,
    pub grid_size: i32,
    pub players: [Player; 2],
    pub food: Position,
    pub phase: Phase,
    rng: StdRng,
}

impl GameState {
    pub fn new(grid_size: i32) -> Self {
        Self::with_rng(grid_size, StdRng::from_entropy())
    }

    /// Fresh room waiting for its second player: two single-cell snakes at
    /// rest on opposite sides of the middle row, and one piece of food.
    pub fn with_rng(grid_size: i32, rng: StdRng) -> Self {
        debug_assert!(grid_size >= MIN_GRID_SIZE, "grid too small for two snakes");

        let row = grid_size / 2;
        let players = [
            Player::new(Position::new(1, row)),
            Player::new(Position::new(grid_size - 2, row)),
        ];

        let mut state = Self {
            tick: 0,
            grid_size,
            players,
            food: Position::new(0, 0),
            phase: Phase::AwaitingSecondPlayer,
            rng,
        };

        if let Some(cell) = state.random_free_cell() {
            state.food = cell;
        }

        state
    }

    /// Active game with explicit snakes and food, used to set up scenarios.
    pub fn from_layout(grid_size: i32, players: [Player; 2], food: Position, rng: StdRng) -> Self {
        Self {
            tick: 0,
            grid_size,
            players,
            food,
            phase: Phase::Active,
            rng,
        }
    }

    pub fn player(&self, number: PlayerNumber) -> &Player {
        &self.players[number.index()]
    }

    pub fn is_active(&self) -> bool {
        self.phase == Phase::Active
    }

    /// Moves a waiting room into play. Returns false if it was not waiting.
    pub fn activate(&mut self) -> bool {
        if self.phase != Phase::AwaitingSecondPlayer {
            return false;
        }
        self.phase = Phase::Active;
        true
    }

    pub fn finish(&mut self) {
        self.phase = Phase::Finished;
    }

    /// Applies a key press to one player's velocity.
    ///
    /// Returns true only if the velocity was changed by the press.
    pub fn apply_input(&mut self, number: PlayerNumber, key_code: u32) -> bool {
        if !self.is_active() {
            return false;
        }

        let player = &mut self.players[number.index()];
        match update_velocity(key_code, player.velocity) {
            Some(velocity) => {
                player.velocity = velocity;
                true
            }
            None => {
                debug!("Ignored key {} from player {}", key_code, number);
                false
            }
        }
    }

    /// Advances both snakes by one cell and resolves food and collisions.
    ///
    /// Movement and growth are applied to both players before any death
    /// check. A snake that does not grow has already released its tail cell
    /// when the checks run, so chasing its own tail is safe. Returns the
    /// terminal outcome, after which the state is `Finished`.
    pub fn step(&mut self) -> Option<GameOutcome> {
        self.tick = self.tick.wrapping_add(1);

        let food = self.food;
        let mut food_eaten = false;

        for player in &mut self.players {
            if player.velocity.is_rest() {
                continue;
            }

            let new_head = player.head().offset(player.velocity);
            player.snake.push_front(new_head);

            if new_head == food {
                food_eaten = true;
            } else {
                player.snake.pop_back();
            }
        }

        let dead = PlayerNumber::ALL.map(|number| self.is_dead(number));

        if food_eaten {
            self.relocate_food();
        }

        let outcome = match dead {
            [true, true] => Some(GameOutcome::Draw),
            [true, false] => Some(GameOutcome::Winner(PlayerNumber::Two)),
            [false, true] => Some(GameOutcome::Winner(PlayerNumber::One)),
            [false, false] => None,
        };

        if let Some(outcome) = outcome {
            info!("Game over on tick {}: {:?}", self.tick, outcome);
            self.phase = Phase::Finished;
        }

        outcome
    }

    fn is_dead(&self, number: PlayerNumber) -> bool {
        let me = self.player(number);
        let opponent = self.player(number.opponent());
        let head = me.head();

        if !head.in_bounds(self.grid_size) {
            debug!("Player {} left the board at {:?}", number, head);
            return true;
        }

        if me.snake.iter().skip(1).any(|cell| *cell == head) {
            debug!("Player {} ran into itself at {:?}", number, head);
            return true;
        }

        if opponent.occupies(head) {
            debug!("Player {} ran into player {} at {:?}", number, number.opponent(), head);
            return true;
        }

        false
    }

    fn is_occupied(&self, pos: Position) -> bool {
        self.players.iter().any(|player| player.occupies(pos))
    }

    fn random_free_cell(&mut self) -> Option<Position> {
        let size = self.grid_size;
        let free: Vec<Position> = (0..size)
            .flat_map(|y| (0..size).map(move |x| Position::new(x, y)))
            .filter(|pos| !self.is_occupied(*pos))
            .collect();

        if free.is_empty() {
            return None;
        }

        Some(free[self.rng.gen_range(0..free.len())])
    }

    fn relocate_food(&mut self) {
        match self.random_free_cell() {
            Some(cell) => self.food = cell,
            None => debug!("Board is full, food stays at {:?}", self.food),
        }
    }

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            grid_size: self.grid_size,
            food: self.food,
            players: self
                .players
                .iter()
                .map(|player| PlayerSnapshot {
                    snake: player.snake.iter().copied().collect(),
                    velocity: player.velocity,
                })
                .collect(),
        }
    }
}
