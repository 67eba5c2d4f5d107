use std::{fmt::Display, net::SocketAddr, str::FromStr};

use tracing::{info, warn};

pub struct Config {
    pub addr: SocketAddr,
    pub command_capacity: usize,
    pub limits: RelayLimits,
}

/// Bounds enforced by the relay task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayLimits {
    pub history_limit: usize,
    pub log_capacity: usize,
    pub max_content: usize,
    pub max_rooms: usize,
    pub max_members: usize,
    pub outbox_capacity: usize,
}

impl Default for RelayLimits {
    fn default() -> Self {
        Self {
            history_limit: 50,
            log_capacity: 1000,
            max_content: 500,
            max_rooms: 100,
            max_members: 200,
            outbox_capacity: 256,
        }
    }
}

impl Config {
    pub fn load() -> Self {
        if dotenv::dotenv().is_err() {
            info!("no .env file found, reading process environment only");
        }

        let defaults = RelayLimits::default();
        Self {
            addr: try_load("RELAY_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080))),
            command_capacity: at_least_one(try_load("RELAY_COMMAND_CAPACITY", 1024)),
            limits: RelayLimits {
                history_limit: try_load("RELAY_HISTORY_LIMIT", defaults.history_limit),
                log_capacity: at_least_one(try_load("RELAY_LOG_CAPACITY", defaults.log_capacity)),
                max_content: try_load("RELAY_MAX_CONTENT", defaults.max_content),
                max_rooms: try_load("RELAY_MAX_ROOMS", defaults.max_rooms),
                max_members: try_load("RELAY_MAX_MEMBERS", defaults.max_members),
                outbox_capacity: at_least_one(try_load(
                    "RELAY_OUTBOX_CAPACITY",
                    defaults.outbox_capacity,
                )),
            },
        }
    }
}

// tokio channels panic on a zero capacity
fn at_least_one(value: usize) -> usize {
    value.max(1)
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    let Ok(raw) = dotenv::var(key) else {
        info!("{key} not set, using default: {default}");
        return default;
    };

    raw.trim().parse().unwrap_or_else(|e| {
        warn!("Invalid {key} value {raw:?}: {e}, using default: {default}");
        default
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_keys_fall_back_to_defaults() {
        let value: usize = try_load("RELAY_TEST_SURELY_UNSET_KEY", 42);
        assert_eq!(value, 42);
    }

    #[test]
    fn zero_capacities_are_clamped() {
        assert_eq!(at_least_one(0), 1);
        assert_eq!(at_least_one(8), 8);
    }
}
