//! Server configuration.

use std::time::Duration;

use partyline_room::RoomConfig;
use serde::{Deserialize, Serialize};

use crate::PartylineError;

/// Port used when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 3000;

/// Interface used when `PARTYLINE_HOST` is unset.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Everything needed to start a server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,

    /// Settings every room is created with.
    pub room: RoomConfig,

    /// Close connections that stay silent this long. `None` disables it.
    pub idle_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("{DEFAULT_HOST}:{DEFAULT_PORT}"),
            room: RoomConfig::default(),
            idle_timeout: None,
        }
    }
}

impl ServerConfig {
    /// Reads `PORT`, `PARTYLINE_HOST`, `PARTYLINE_GRACE_SECS`, and
    /// `PARTYLINE_IDLE_SECS` from the process environment.
    ///
    /// # Errors
    /// [`PartylineError::Config`] if a variable is set but unparsable.
    pub fn from_env() -> Result<Self, PartylineError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, PartylineError> {
        let mut config = Self::default();

        let host = lookup("PARTYLINE_HOST").unwrap_or_else(|| DEFAULT_HOST.to_owned());
        let port = match lookup("PORT") {
            Some(raw) => parse::<u16>("PORT", &raw)?,
            None => DEFAULT_PORT,
        };
        config.bind_addr = format!("{host}:{port}");

        if let Some(raw) = lookup("PARTYLINE_GRACE_SECS") {
            config.room.grace_period = Duration::from_secs(parse("PARTYLINE_GRACE_SECS", &raw)?);
        }
        if let Some(raw) = lookup("PARTYLINE_IDLE_SECS") {
            let secs: u64 = parse("PARTYLINE_IDLE_SECS", &raw)?;
            config.idle_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        Ok(config)
    }
}

fn parse<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, PartylineError> {
    raw.trim()
        .parse()
        .map_err(|_| PartylineError::Config(format!("{key}={raw:?} is not a valid number")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_from_lookup_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.room.grace_period, Duration::from_secs(30));
        assert_eq!(config.idle_timeout, None);
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("PARTYLINE_HOST", "127.0.0.1"),
            ("PARTYLINE_GRACE_SECS", "5"),
            ("PARTYLINE_IDLE_SECS", "60"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.room.grace_period, Duration::from_secs(5));
        assert_eq!(config.idle_timeout, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_from_lookup_zero_idle_disables_timeout() {
        let config = ServerConfig::from_lookup(lookup(&[("PARTYLINE_IDLE_SECS", "0")])).unwrap();
        assert_eq!(config.idle_timeout, None);
    }

    #[test]
    fn test_from_lookup_rejects_bad_port() {
        let err = ServerConfig::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, PartylineError::Config(ref m) if m.contains("PORT")));
    }
}
