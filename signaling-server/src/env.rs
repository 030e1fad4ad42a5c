use std::net::SocketAddr;
use std::str::FromStr;

use log::LevelFilter;
use serde::Deserialize;

const ENV_PREFIX: &str = "CALL_SIGNAL_";

fn default_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9001))
}

fn default_log_level() -> String {
    "info".to_owned()
}

/// Server settings read from `CALL_SIGNAL_*` environment variables.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Env {
    /// `CALL_SIGNAL_ADDRESS`, address to listen on.
    #[serde(default = "default_address")]
    pub address: SocketAddr,
    /// `CALL_SIGNAL_LOG_LEVEL`, one of `off`, `error`, `warn`, `info`, `debug`, `trace`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Env {
    /// Parse the environment of the current process.
    ///
    /// # Errors
    /// Fails when a variable is set to something that does not parse.
    pub fn load() -> Result<Self, envy::Error> {
        envy::prefixed(ENV_PREFIX).from_env()
    }

    /// Parse settings from explicit key/value pairs, without the prefix.
    ///
    /// # Errors
    /// Fails when a value does not parse.
    pub fn from_pairs<I>(pairs: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::from_iter(pairs)
    }

    /// The configured log level.
    ///
    /// # Errors
    /// Fails when `log_level` is not a known level name.
    pub fn log_level(&self) -> anyhow::Result<LevelFilter> {
        LevelFilter::from_str(&self.log_level)
            .map_err(|err| anyhow::anyhow!("invalid log level {:?}: {}", self.log_level, err))
    }
}
