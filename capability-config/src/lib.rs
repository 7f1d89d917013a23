//! Server configuration.
//!
//! [`ServerConfig`] holds the listener settings, the domains directory and
//! the timeouts used by the runner and the remote directory. Values come from
//! the environment through [`ServerConfig::from_env`], or from code through
//! the `with_*` setters.

#![warn(missing_docs, clippy::pedantic)]

use std::fmt::{self, Display};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

const DEFAULT_HTTP_HOST: &str = "0.0.0.0";
const DEFAULT_HTTP_PORT: u16 = 5271;
const DEFAULT_UDS_SOCKET_PATH: &str = "/tmp/cdr.sock";
const DEFAULT_DOMAINS_PATH: &str = "./domains";
const DEFAULT_SCRATCH_DIR: &str = "/tmp/code-executor";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Listener flavour of the server.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerMode {
    /// TCP listener on `host:port`.
    #[default]
    Http,
    /// Unix domain socket listener.
    Uds,
}

impl Display for ServerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Http => "http",
            Self::Uds => "uds",
        })
    }
}

impl FromStr for ServerMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "uds" => Ok(Self::Uds),
            _ => Err(ConfigError::invalid_env("SERVER_MODE", value)),
        }
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A setting is out of range.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Description of the rejected setting.
        reason: String,
    },
    /// An environment variable could not be parsed.
    #[error("invalid value {value:?} for {key}")]
    InvalidEnv {
        /// Variable name.
        key: String,
        /// Raw value.
        value: String,
    },
}

impl ConfigError {
    /// Builds an [`ConfigError::Invalid`].
    #[must_use]
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }

    /// Builds an [`ConfigError::InvalidEnv`].
    #[must_use]
    pub fn invalid_env(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidEnv {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Settings of a capability server process.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ServerConfig {
    mode: ServerMode,
    http_host: String,
    http_port: u16,
    uds_socket_path: PathBuf,
    domains_path: PathBuf,
    code_scratch_dir: PathBuf,
    code_timeout: Duration,
    remote_timeout: Duration,
    token_expiry_skew: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            mode: ServerMode::default(),
            http_host: DEFAULT_HTTP_HOST.to_owned(),
            http_port: DEFAULT_HTTP_PORT,
            uds_socket_path: PathBuf::from(DEFAULT_UDS_SOCKET_PATH),
            domains_path: PathBuf::from(DEFAULT_DOMAINS_PATH),
            code_scratch_dir: PathBuf::from(DEFAULT_SCRATCH_DIR),
            code_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            remote_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            token_expiry_skew: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ServerConfig {
    /// Reads the configuration from process environment variables, falling
    /// back to defaults for unset ones.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] when a variable cannot be parsed.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name
    /// to its value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] when a value cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(value) = lookup("SERVER_MODE") {
            config.mode = value.parse()?;
        }
        if let Some(value) = lookup("HTTP_HOST") {
            config.http_host = value;
        }
        if let Some(value) = lookup("HTTP_PORT") {
            config.http_port = parse_number("HTTP_PORT", &value)?;
        }
        if let Some(value) = lookup("UDS_SOCKET_PATH") {
            config.uds_socket_path = PathBuf::from(value);
        }
        if let Some(value) = lookup("DOMAINS_PATH") {
            config.domains_path = PathBuf::from(value);
        }
        if let Some(value) = lookup("CODE_SCRATCH_DIR") {
            config.code_scratch_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup("CODE_TIMEOUT_SECS") {
            config.code_timeout = Duration::from_secs(parse_number("CODE_TIMEOUT_SECS", &value)?);
        }
        if let Some(value) = lookup("REMOTE_TIMEOUT_SECS") {
            config.remote_timeout = Duration::from_secs(parse_number("REMOTE_TIMEOUT_SECS", &value)?);
        }
        if let Some(value) = lookup("TOKEN_EXPIRY_SKEW_SECS") {
            config.token_expiry_skew = Duration::from_secs(parse_number("TOKEN_EXPIRY_SKEW_SECS", &value)?);
        }
        debug!(?config, "server configuration loaded");
        Ok(config)
    }

    /// Sets the listener mode.
    #[must_use]
    pub fn with_mode(mut self, mode: ServerMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the HTTP bind host and port.
    #[must_use]
    pub fn with_http(mut self, host: impl Into<String>, port: u16) -> Self {
        self.http_host = host.into();
        self.http_port = port;
        self
    }

    /// Sets the Unix socket path.
    #[must_use]
    pub fn with_uds_socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.uds_socket_path = path.into();
        self
    }

    /// Sets the domains directory.
    #[must_use]
    pub fn with_domains_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.domains_path = path.into();
        self
    }

    /// Sets the code runner scratch directory.
    #[must_use]
    pub fn with_code_scratch_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.code_scratch_dir = path.into();
        self
    }

    /// Sets the code runner wall-clock budget.
    #[must_use]
    pub fn with_code_timeout(mut self, timeout: Duration) -> Self {
        self.code_timeout = timeout;
        self
    }

    /// Sets the timeout of each remote request.
    #[must_use]
    pub fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        self
    }

    /// Sets how long before expiry a cached token stops being used.
    #[must_use]
    pub fn with_token_expiry_skew(mut self, skew: Duration) -> Self {
        self.token_expiry_skew = skew;
        self
    }

    /// Listener mode.
    #[must_use]
    pub const fn mode(&self) -> ServerMode {
        self.mode
    }

    /// HTTP bind host.
    #[must_use]
    pub fn http_host(&self) -> &str {
        &self.http_host
    }

    /// HTTP bind port.
    #[must_use]
    pub const fn http_port(&self) -> u16 {
        self.http_port
    }

    /// Unix socket path.
    #[must_use]
    pub fn uds_socket_path(&self) -> &Path {
        &self.uds_socket_path
    }

    /// Address the listener of the current mode binds: `host:port` for
    /// HTTP, the socket path for UDS.
    #[must_use]
    pub fn listen_address(&self) -> String {
        match self.mode {
            ServerMode::Http => format!("{}:{}", self.http_host, self.http_port),
            ServerMode::Uds => self.uds_socket_path.display().to_string(),
        }
    }

    /// Domains directory holding `skills/` and `mcps/`.
    #[must_use]
    pub fn domains_path(&self) -> &Path {
        &self.domains_path
    }

    /// Procedure documents directory.
    #[must_use]
    pub fn skills_dir(&self) -> PathBuf {
        self.domains_path.join("skills")
    }

    /// Backend config directory.
    #[must_use]
    pub fn mcps_dir(&self) -> PathBuf {
        self.domains_path.join("mcps")
    }

    /// Code runner scratch directory.
    #[must_use]
    pub fn code_scratch_dir(&self) -> &Path {
        &self.code_scratch_dir
    }

    /// Code runner wall-clock budget.
    #[must_use]
    pub const fn code_timeout(&self) -> Duration {
        self.code_timeout
    }

    /// Timeout of each remote request.
    #[must_use]
    pub const fn remote_timeout(&self) -> Duration {
        self.remote_timeout
    }

    /// Token expiry skew.
    #[must_use]
    pub const fn token_expiry_skew(&self) -> Duration {
        self.token_expiry_skew
    }

    /// Rejects zero timeouts, port 0 and an empty HTTP host.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first rejected setting.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.mode == ServerMode::Http {
            if self.http_port == 0 {
                return Err(ConfigError::invalid("HTTP port must be non-zero"));
            }
            if self.http_host.trim().is_empty() {
                return Err(ConfigError::invalid("HTTP host must not be empty"));
            }
        }
        if self.code_timeout.is_zero() {
            return Err(ConfigError::invalid("code timeout must be non-zero"));
        }
        if self.remote_timeout.is_zero() {
            return Err(ConfigError::invalid("remote timeout must be non-zero"));
        }
        Ok(())
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid_env(key, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn listen_address_follows_mode() {
        let config = ServerConfig::default().with_http("0.0.0.0", 8080);
        assert_eq!(config.listen_address(), "0.0.0.0:8080");

        let config = config
            .with_mode(ServerMode::Uds)
            .with_uds_socket_path("/run/capabilities.sock");
        assert_eq!(config.listen_address(), "/run/capabilities.sock");
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.http_port(), 5271);
        assert_eq!(config.mode(), ServerMode::Http);
        assert_eq!(config.skills_dir(), PathBuf::from("./domains/skills"));
        assert_eq!(config.mcps_dir(), PathBuf::from("./domains/mcps"));
        config.validate().unwrap();
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("SERVER_MODE", "UDS"),
            ("UDS_SOCKET_PATH", "/run/cap.sock"),
            ("DOMAINS_PATH", "/srv/domains"),
            ("CODE_TIMEOUT_SECS", "5"),
            ("TOKEN_EXPIRY_SKEW_SECS", "0"),
        ]))
        .unwrap();

        assert_eq!(config.mode(), ServerMode::Uds);
        assert_eq!(config.uds_socket_path(), Path::new("/run/cap.sock"));
        assert_eq!(config.skills_dir(), PathBuf::from("/srv/domains/skills"));
        assert_eq!(config.code_timeout(), Duration::from_secs(5));
        assert_eq!(config.token_expiry_skew(), Duration::ZERO);
    }

    #[test]
    fn unparsable_values_name_the_variable() {
        let err = ServerConfig::from_lookup(lookup(&[("HTTP_PORT", "http")])).unwrap_err();
        assert_eq!(err, ConfigError::invalid_env("HTTP_PORT", "http"));

        let err = ServerConfig::from_lookup(lookup(&[("SERVER_MODE", "grpc")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { ref key, .. } if key == "SERVER_MODE"));
    }

    #[test]
    fn validate_rejects_zero_values() {
        assert!(ServerConfig::default().with_http("0.0.0.0", 0).validate().is_err());
        assert!(ServerConfig::default().with_code_timeout(Duration::ZERO).validate().is_err());
        assert!(ServerConfig::default().with_remote_timeout(Duration::ZERO).validate().is_err());
        ServerConfig::default()
            .with_mode(ServerMode::Uds)
            .with_http("", 0)
            .validate()
            .unwrap();
    }
}
