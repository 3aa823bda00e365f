use shared::{ShipProfile, Tuning};
use std::net::SocketAddr;
use std::time::Duration;

// Runtime constants for the authority loop.

/// Silence after which a client is considered gone.
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_ORPHAN_LINGER: Duration = Duration::from_secs(60);
pub const DEFAULT_TICK_RATE: u32 = 30;
pub const DEFAULT_MAX_CLIENTS: usize = 16;
/// How often the timeout checker sweeps the client roster.
pub const TIMEOUT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub tick_rate: u32,
    pub max_clients: usize,
    /// Profile given to every spawned vessel. `None` spawns inert vessels.
    pub profile: Option<ShipProfile>,
    pub tuning: Tuning,
    /// How long a timed-out client's vessel keeps sailing before despawn.
    pub orphan_linger: Duration,
}

impl ServerConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            tick_rate: DEFAULT_TICK_RATE,
            max_clients: DEFAULT_MAX_CLIENTS,
            profile: Some(ShipProfile::default()),
            tuning: Tuning::default(),
            orphan_linger: DEFAULT_ORPHAN_LINGER,
        }
    }

    /// Fixed simulation step in seconds.
    pub fn tick_dt(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::new("127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.tick_rate, 30);
        assert_eq!(config.orphan_linger, DEFAULT_ORPHAN_LINGER);
        assert!(config.profile.is_some());
        assert_approx_eq!(config.tick_dt(), 1.0 / 30.0);
    }

    #[test]
    fn test_zero_tick_rate_does_not_divide_by_zero() {
        let mut config = ServerConfig::new("127.0.0.1:8080".parse().unwrap());
        config.tick_rate = 0;
        assert_approx_eq!(config.tick_dt(), 1.0);
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
    }
}
