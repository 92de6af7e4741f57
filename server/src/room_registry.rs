//! Room registry owning every game session on the server
//!
//! Sessions are stored by room code. Each one sits behind its own mutex so
//! that the room's ticker and the input of both players are applied one at a
//! time, while different rooms never contend with each other. The registry
//! itself is shared behind a `RwLock` by the network layer and the room
//! loops; callers always take the registry lock before a session lock.

use crate::game::{GameOutcome, GameState, Phase};
use derive_more::{Display, Error};
use log::{debug, info};
use rand::distributions::Alphanumeric;
use rand::Rng;
use shared::{PlayerNumber, ROOM_CODE_LENGTH};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// How many times a colliding or missing code is retried before giving up.
pub const MAX_CODE_ATTEMPTS: usize = 32;

/// Shared handle to one room's state.
pub type SessionHandle = Arc<Mutex<GameState>>;

/// Source of room codes handed out to players.
///
/// The registry only relies on codes being strings; uniqueness among live
/// rooms is checked by the registry.
pub trait RoomCodeGenerator: Send + Sync {
    fn generate(&mut self) -> Option<String>;
}

/// Random alphanumeric codes of a fixed length.
#[derive(Debug, Clone)]
pub struct RandomRoomCode {
    length: usize,
}

impl RandomRoomCode {
    pub fn new(length: usize) -> Self {
        Self { length }
    }
}

impl Default for RandomRoomCode {
    fn default() -> Self {
        Self::new(ROOM_CODE_LENGTH)
    }
}

impl RoomCodeGenerator for RandomRoomCode {
    fn generate(&mut self) -> Option<String> {
        if self.length == 0 {
            return None;
        }

        let code = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(self.length)
            .map(char::from)
            .collect();

        Some(code)
    }
}

/// Why a join request was turned away.
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum JoinRejection {
    #[display("unknown room")]
    UnknownRoom,
    #[display("room already has two players")]
    RoomFull,
}

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[display("no unused room code after {attempts} attempts")]
    CodeGeneration { attempts: usize },
}

pub struct RoomRegistry {
    rooms: HashMap<String, SessionHandle>,
    codes: Box<dyn RoomCodeGenerator>,
    grid_size: i32,
}

impl RoomRegistry {
    pub fn new(grid_size: i32) -> Self {
        Self::with_generator(grid_size, Box::new(RandomRoomCode::default()))
    }

    pub fn with_generator(grid_size: i32, codes: Box<dyn RoomCodeGenerator>) -> Self {
        Self {
            rooms: HashMap::new(),
            codes,
            grid_size,
        }
    }

    /// Creates a room waiting for its second player and returns its code.
    pub fn register_new_room(&mut self) -> Result<String, RegistryError> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let Some(code) = self.codes.generate() else {
                break;
            };

            if self.rooms.contains_key(&code) {
                debug!("Room code {} already in use, retrying", code);
                continue;
            }

            let session = GameState::new(self.grid_size);
            self.rooms.insert(code.clone(), Arc::new(Mutex::new(session)));
            info!("Created room {} ({} open)", code, self.rooms.len());
            return Ok(code);
        }

        Err(RegistryError::CodeGeneration {
            attempts: MAX_CODE_ATTEMPTS,
        })
    }

    /// Seats a second player in a waiting room and starts the game.
    ///
    /// The caller is responsible for starting the room's ticker on success.
    pub async fn join_room(&self, code: &str) -> Result<PlayerNumber, JoinRejection> {
        let session = self.rooms.get(code).ok_or(JoinRejection::UnknownRoom)?;
        let mut state = session.lock().await;

        if !state.activate() {
            return Err(JoinRejection::RoomFull);
        }

        info!("Room {} is now active", code);
        Ok(PlayerNumber::Two)
    }

    /// Routes a key press to a player's snake. Unknown, waiting and finished
    /// rooms ignore input.
    pub async fn apply_input(&self, code: &str, player: PlayerNumber, key_code: u32) -> bool {
        let Some(session) = self.rooms.get(code) else {
            debug!("Input for unknown room {}", code);
            return false;
        };

        let mut state = session.lock().await;
        state.apply_input(player, key_code)
    }

    pub async fn phase(&self, code: &str) -> Option<Phase> {
        let session = self.rooms.get(code)?;
        let phase = session.lock().await.phase;
        Some(phase)
    }

    /// Removes a room and marks it finished. Safe to call more than once.
    pub async fn finish(&mut self, code: &str) -> bool {
        let Some(session) = self.rooms.remove(code) else {
            return false;
        };

        session.lock().await.finish();
        info!("Closed room {} ({} open)", code, self.rooms.len());
        true
    }

    /// Ends a room because one of its players left.
    ///
    /// Returns the outcome to announce when a game was in progress: the
    /// remaining player wins. A room still waiting for its second player is
    /// just closed.
    pub async fn abandon(&mut self, code: &str, leaver: PlayerNumber) -> Option<GameOutcome> {
        let session = self.rooms.remove(code)?;
        let mut state = session.lock().await;
        let was_active = state.is_active();
        state.finish();

        info!("Player {} left room {} ({} open)", leaver, code, self.rooms.len());

        was_active.then(|| GameOutcome::Winner(leaver.opponent()))
    }

    pub fn session(&self, code: &str) -> Option<SessionHandle> {
        self.rooms.get(code).cloned()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.rooms.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Velocity, GRID_SIZE, KEY_LEFT, KEY_RIGHT, KEY_UP};
    use std::collections::VecDeque;

    struct FixedCodes(VecDeque<&'static str>);

    impl RoomCodeGenerator for FixedCodes {
        fn generate(&mut self) -> Option<String> {
            self.0.pop_front().map(str::to_string)
        }
    }

    fn fixed(codes: &[&'static str]) -> RoomRegistry {
        RoomRegistry::with_generator(GRID_SIZE, Box::new(FixedCodes(codes.iter().copied().collect())))
    }

    #[test]
    fn test_random_room_code_shape() {
        let mut generator = RandomRoomCode::default();
        let code = generator.generate().unwrap();

        assert_eq!(code.len(), ROOM_CODE_LENGTH);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(RandomRoomCode::new(0).generate(), None);
    }

    #[test]
    fn test_register_new_room() {
        let mut registry = fixed(&["ABCDE"]);

        let code = registry.register_new_room().unwrap();
        assert_eq!(code, "ABCDE");
        assert!(registry.contains("ABCDE"));
        assert_eq!(registry.len(), 1);

        let session = registry.session("ABCDE").unwrap();
        let state = tokio_test::block_on(session.lock());
        assert_eq!(state.phase, Phase::AwaitingSecondPlayer);
        assert_eq!(state.grid_size, GRID_SIZE);
    }

    #[test]
    fn test_register_skips_codes_in_use() {
        let mut registry = fixed(&["AAAAA", "AAAAA", "BBBBB"]);

        assert_eq!(registry.register_new_room().unwrap(), "AAAAA");
        assert_eq!(registry.register_new_room().unwrap(), "BBBBB");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_register_fails_when_generator_runs_dry() {
        let mut registry = fixed(&[]);

        let err = registry.register_new_room().unwrap_err();
        assert_eq!(
            err,
            RegistryError::CodeGeneration {
                attempts: MAX_CODE_ATTEMPTS
            }
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_two_rooms_are_independent() {
        let mut registry = RoomRegistry::new(GRID_SIZE);

        let first = registry.register_new_room().unwrap();
        let second = registry.register_new_room().unwrap();
        assert_ne!(first, second);

        let a = registry.session(&first).unwrap();
        let b = registry.session(&second).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));

        tokio_test::block_on(async {
            assert_eq!(registry.join_room(&first).await, Ok(PlayerNumber::Two));
            assert_eq!(a.lock().await.phase, Phase::Active);
            assert_eq!(b.lock().await.phase, Phase::AwaitingSecondPlayer);
        });
    }

    #[tokio::test]
    async fn test_phase_follows_room_lifecycle() {
        let mut registry = fixed(&["ROOM1"]);
        let code = registry.register_new_room().unwrap();

        assert_eq!(registry.phase(&code).await, Some(Phase::AwaitingSecondPlayer));
        registry.join_room(&code).await.unwrap();
        assert_eq!(registry.phase(&code).await, Some(Phase::Active));
        registry.finish(&code).await;
        assert_eq!(registry.phase(&code).await, None);
    }

    #[tokio::test]
    async fn test_join_unknown_room() {
        let registry = fixed(&[]);
        assert_eq!(registry.join_room("nope").await, Err(JoinRejection::UnknownRoom));
    }

    #[tokio::test]
    async fn test_join_full_room() {
        let mut registry = fixed(&["ROOM1"]);
        let code = registry.register_new_room().unwrap();

        assert_eq!(registry.join_room(&code).await, Ok(PlayerNumber::Two));
        assert_eq!(registry.join_room(&code).await, Err(JoinRejection::RoomFull));

        let session = registry.session(&code).unwrap();
        assert_eq!(session.lock().await.phase, Phase::Active);
    }

    #[tokio::test]
    async fn test_apply_input_only_when_active() {
        let mut registry = fixed(&["ROOM1"]);
        let code = registry.register_new_room().unwrap();

        assert!(!registry.apply_input(&code, PlayerNumber::One, KEY_RIGHT).await);

        registry.join_room(&code).await.unwrap();
        assert!(registry.apply_input(&code, PlayerNumber::One, KEY_RIGHT).await);
        assert!(registry.apply_input(&code, PlayerNumber::Two, KEY_UP).await);
        assert!(!registry.apply_input(&code, PlayerNumber::One, KEY_LEFT).await);
        assert!(!registry.apply_input("other", PlayerNumber::One, KEY_UP).await);

        let session = registry.session(&code).unwrap();
        let state = session.lock().await;
        assert_eq!(state.player(PlayerNumber::One).velocity, Velocity::RIGHT);
        assert_eq!(state.player(PlayerNumber::Two).velocity, Velocity::UP);
    }

    #[tokio::test]
    async fn test_finish_is_idempotent_and_blocks_input() {
        let mut registry = fixed(&["ROOM1"]);
        let code = registry.register_new_room().unwrap();
        registry.join_room(&code).await.unwrap();
        let session = registry.session(&code).unwrap();

        assert!(registry.finish(&code).await);
        assert!(!registry.finish(&code).await);
        assert!(!registry.contains(&code));
        assert!(registry.session(&code).is_none());

        assert!(!registry.apply_input(&code, PlayerNumber::One, KEY_RIGHT).await);

        let mut state = session.lock().await;
        assert_eq!(state.phase, Phase::Finished);
        assert!(!state.apply_input(PlayerNumber::One, KEY_RIGHT));
        assert!(state.player(PlayerNumber::One).velocity.is_rest());
    }

    #[tokio::test]
    async fn test_abandon_active_room_awards_opponent() {
        let mut registry = fixed(&["ROOM1"]);
        let code = registry.register_new_room().unwrap();
        registry.join_room(&code).await.unwrap();

        assert_eq!(
            registry.abandon(&code, PlayerNumber::Two).await,
            Some(GameOutcome::Winner(PlayerNumber::One))
        );
        assert!(!registry.contains(&code));
        assert_eq!(registry.abandon(&code, PlayerNumber::Two).await, None);
    }

    #[tokio::test]
    async fn test_abandon_waiting_room_just_closes() {
        let mut registry = fixed(&["ROOM1"]);
        let code = registry.register_new_room().unwrap();

        assert_eq!(registry.abandon(&code, PlayerNumber::One).await, None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_rejection_messages() {
        assert_eq!(JoinRejection::UnknownRoom.to_string(), "unknown room");
        assert_eq!(JoinRejection::RoomFull.to_string(), "room already has two players");
        assert_eq!(
            RegistryError::CodeGeneration { attempts: 3 }.to_string(),
            "no unused room code after 3 attempts"
        );
    }
}
