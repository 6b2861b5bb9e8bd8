use crate::error::ConfigError;
use skirmish_shared::config::ArenaConfig;
use std::path::PathBuf;
use std::str::FromStr;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_STATIC_DIR: &str = "dist";

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Seed for colors and respawn placement. None draws one at startup.
    pub rng_seed: Option<u64>,
    pub max_connections: usize,
    /// Inbound text frames above this size close the connection
    pub max_message_bytes: usize,
    /// Consecutive unparseable frames tolerated before disconnecting
    pub max_parse_errors: u32,
    pub max_messages_per_sec: u32,
    /// Per-connection outbound queue; overflow disconnects that client
    pub outbox_capacity: usize,
    pub command_capacity: usize,
    /// Built client assets, served with an index.html fallback
    pub static_dir: Option<PathBuf>,
    pub arena: ArenaConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: format!("{}:{}", DEFAULT_HOST, DEFAULT_PORT),
            rng_seed: None,
            max_connections: 256,
            max_message_bytes: 4096,
            max_parse_errors: 5,
            max_messages_per_sec: 240,
            outbox_capacity: 256,
            command_capacity: 1024,
            static_dir: None,
            arena: ArenaConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `HOST`, `PORT`, `RNG_SEED`, `MAX_CONNECTIONS`
    /// and `STATIC_DIR`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        let host = lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port: u16 = parse_var(&lookup, "PORT")?.unwrap_or(DEFAULT_PORT);
        config.listen_addr = format!("{}:{}", host, port);

        config.rng_seed = parse_var(&lookup, "RNG_SEED")?;
        if let Some(max) = parse_var(&lookup, "MAX_CONNECTIONS")? {
            config.max_connections = max;
        }

        config.static_dir = match lookup("STATIC_DIR") {
            Some(dir) if dir.is_empty() => None,
            Some(dir) => Some(PathBuf::from(dir)),
            None => {
                let dir = PathBuf::from(DEFAULT_STATIC_DIR);
                dir.is_dir().then_some(dir)
            }
        };

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_connections == 0 {
            return Err(ConfigError::Invalid("max_connections must be > 0".to_string()));
        }
        if self.max_message_bytes == 0 {
            return Err(ConfigError::Invalid("max_message_bytes must be > 0".to_string()));
        }
        if self.max_messages_per_sec == 0 {
            return Err(ConfigError::Invalid(
                "max_messages_per_sec must be > 0".to_string(),
            ));
        }
        // welcome + players must fit before the connection task starts draining
        if self.outbox_capacity < 2 {
            return Err(ConfigError::Invalid("outbox_capacity must be >= 2".to_string()));
        }
        if self.command_capacity == 0 {
            return Err(ConfigError::Invalid("command_capacity must be > 0".to_string()));
        }
        self.arena.validate().map_err(ConfigError::Invalid)
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.listen_addr, "0.0.0.0:3000");
    }

    #[test]
    fn port_env_overrides_default() {
        let config = ServerConfig::from_lookup(lookup_from(&[("PORT", "8080")])).unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
    }

    #[test]
    fn host_and_seed_from_env() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("HOST", "127.0.0.1"),
            ("RNG_SEED", "99"),
            ("MAX_CONNECTIONS", "12"),
        ]))
        .unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:3000");
        assert_eq!(config.rng_seed, Some(99));
        assert_eq!(config.max_connections, 12);
    }

    #[test]
    fn bad_port_is_reported() {
        let err = ServerConfig::from_lookup(lookup_from(&[("PORT", "http")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidEnv {
                var: "PORT",
                value: "http".to_string()
            }
        );
    }

    #[test]
    fn explicit_static_dir_is_used() {
        let config =
            ServerConfig::from_lookup(lookup_from(&[("STATIC_DIR", "/srv/client")])).unwrap();
        assert_eq!(config.static_dir, Some(PathBuf::from("/srv/client")));
        let config = ServerConfig::from_lookup(lookup_from(&[("STATIC_DIR", "")])).unwrap();
        assert_eq!(config.static_dir, None);
    }

    #[test]
    fn zero_connections_invalid() {
        let config = ServerConfig {
            max_connections: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_arena_is_surfaced() {
        let mut config = ServerConfig::default();
        config.arena.max_health = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
