//! Load config from file and environment.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::engine::EngineConfig;

/// Daemon configuration. File: ~/.config/lanchat/config.toml or
/// /etc/lanchat/config.toml. Env overrides: LANCHAT_PORT,
/// LANCHAT_PEER_TIMEOUT, LANCHAT_BROADCAST_INTERVAL, LANCHAT_DEBUG.
/// The engine treats all of these as immutable once constructed.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Single UDP port for broadcast and direct messages (default 12345).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Seconds without an announcement before a peer is evicted (default 2.0).
    #[serde(default = "default_peer_timeout")]
    pub peer_timeout: f64,
    /// Seconds between presence broadcasts (default 0.1).
    #[serde(default = "default_broadcast_interval")]
    pub broadcast_interval: f64,
    /// Whether the debug sink starts enabled (default off).
    #[serde(default)]
    pub debug: bool,
}

fn default_port() -> u16 {
    12345
}
fn default_peer_timeout() -> f64 {
    2.0
}
fn default_broadcast_interval() -> f64 {
    0.1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            peer_timeout: default_peer_timeout(),
            broadcast_interval: default_broadcast_interval(),
            debug: false,
        }
    }
}

impl Config {
    /// The subset the engine consumes, with seconds turned into durations.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            port: self.port,
            peer_timeout: Duration::from_secs_f64(self.peer_timeout),
            broadcast_interval: Duration::from_secs_f64(self.broadcast_interval),
        }
    }
}

/// Load config: merge default, then config file (if present), then env vars.
pub fn load() -> Config {
    let mut c = load_file().unwrap_or_default();
    if let Ok(s) = std::env::var("LANCHAT_PORT") {
        if let Ok(p) = s.parse::<u16>() {
            c.port = p;
        }
    }
    if let Ok(s) = std::env::var("LANCHAT_PEER_TIMEOUT") {
        if let Ok(t) = s.parse::<f64>() {
            c.peer_timeout = t;
        }
    }
    if let Ok(s) = std::env::var("LANCHAT_BROADCAST_INTERVAL") {
        if let Ok(t) = s.parse::<f64>() {
            c.broadcast_interval = t;
        }
    }
    if let Ok(s) = std::env::var("LANCHAT_DEBUG") {
        if let Ok(d) = s.parse::<bool>() {
            c.debug = d;
        }
    }
    c
}

fn config_paths() -> Vec<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let mut out = Vec::new();
    if let Some(h) = home {
        out.push(h.join(".config/lanchat/config.toml"));
    }
    out.push(PathBuf::from("/etc/lanchat/config.toml"));
    out
}

fn load_file() -> Option<Config> {
    for p in config_paths() {
        if p.exists() {
            if let Ok(s) = std::fs::read_to_string(&p) {
                if let Ok(c) = toml::from_str::<Config>(&s) {
                    return Some(c);
                }
            }
            break;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol_expectations() {
        let c = Config::default();
        assert_eq!(c.port, 12345);
        assert_eq!(c.peer_timeout, 2.0);
        assert_eq!(c.broadcast_interval, 0.1);
        assert!(!c.debug);
    }

    #[test]
    fn engine_config_converts_seconds() {
        let c = Config {
            peer_timeout: 1.5,
            ..Config::default()
        };
        let e = c.engine_config();
        assert_eq!(e.peer_timeout, Duration::from_millis(1500));
        assert_eq!(e.broadcast_interval, Duration::from_millis(100));
        assert_eq!(e.port, 12345);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let c: Config = toml::from_str("port = 23456").unwrap();
        assert_eq!(c.port, 23456);
        assert_eq!(c.peer_timeout, 2.0);
    }

    #[test]
    fn unknown_keys_rejected() {
        assert!(toml::from_str::<Config>("portt = 1").is_err());
    }
}
