use derive_more::{Display, Error};
use shared::{FRAME_RATE, GRID_SIZE, MIN_GRID_SIZE};
use std::time::Duration;

pub const DEFAULT_MAX_CLIENTS: usize = 64;
pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[display("tick rate must be at least 1 Hz")]
    ZeroTickRate,
    #[display("grid size {grid_size} is below the minimum of {min}")]
    GridTooSmall { grid_size: i32, min: i32 },
    #[display("server must accept at least two clients")]
    CapacityTooSmall,
}

/// Runtime settings for the room server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Time between two simulation ticks of a room
    pub tick_duration: Duration,
    pub grid_size: i32,
    pub max_clients: usize,
    /// Silence after which a client is dropped
    pub client_timeout: Duration,
}

impl ServerConfig {
    pub fn new(
        tick_rate: u32,
        grid_size: i32,
        max_clients: usize,
        client_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        if tick_rate == 0 {
            return Err(ConfigError::ZeroTickRate);
        }
        if grid_size < MIN_GRID_SIZE {
            return Err(ConfigError::GridTooSmall {
                grid_size,
                min: MIN_GRID_SIZE,
            });
        }
        if max_clients < 2 {
            return Err(ConfigError::CapacityTooSmall);
        }

        Ok(Self {
            tick_duration: Duration::from_secs(1) / tick_rate,
            grid_size,
            max_clients,
            client_timeout,
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_duration: Duration::from_secs(1) / FRAME_RATE,
            grid_size: GRID_SIZE,
            max_clients: DEFAULT_MAX_CLIENTS,
            client_timeout: DEFAULT_CLIENT_TIMEOUT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_shared_constants() {
        let config = ServerConfig::default();
        assert_eq!(config.tick_duration, Duration::from_millis(100));
        assert_eq!(config.grid_size, GRID_SIZE);
        assert_eq!(
            ServerConfig::new(FRAME_RATE, GRID_SIZE, DEFAULT_MAX_CLIENTS, DEFAULT_CLIENT_TIMEOUT),
            Ok(config)
        );
    }

    #[test]
    fn test_tick_duration_from_rate() {
        let config = ServerConfig::new(20, 10, 8, Duration::from_secs(1)).unwrap();
        assert_eq!(config.tick_duration, Duration::from_millis(50));
    }

    #[test]
    fn test_rejects_invalid_settings() {
        let timeout = Duration::from_secs(5);
        assert_eq!(
            ServerConfig::new(0, GRID_SIZE, 8, timeout),
            Err(ConfigError::ZeroTickRate)
        );
        assert_eq!(
            ServerConfig::new(10, 3, 8, timeout),
            Err(ConfigError::GridTooSmall {
                grid_size: 3,
                min: MIN_GRID_SIZE
            })
        );
        assert_eq!(
            ServerConfig::new(10, GRID_SIZE, 1, timeout),
            Err(ConfigError::CapacityTooSmall)
        );
        assert_eq!(
            ConfigError::GridTooSmall { grid_size: 3, min: 4 }.to_string(),
            "grid size 3 is below the minimum of 4"
        );
    }
}
