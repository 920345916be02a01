//! Server and client configuration.
//!
//! Both sides load from `FEDERATED_*` environment variables. The client can
//! additionally take `key=value` arguments whose keys are the same variable
//! names, matched case-insensitively.

use crate::error::{FedError, Result};
use crate::types::Rank;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default coordinator port.
pub const DEFAULT_PORT: u16 = 9091;

/// Default upper bound on a single framed message (256 MiB).
pub const DEFAULT_MAX_MESSAGE_BYTES: u64 = 256 * 1024 * 1024;

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| FedError::Config(format!("{key}: cannot parse {value:?}")))
}

fn parse_secs(key: &str, value: &str) -> Result<Duration> {
    parse_var::<u64>(key, value).map(Duration::from_secs)
}

fn check_world(world_size: u32) -> Result<()> {
    if world_size == 0 {
        return Err(FedError::Config("world size must be at least 1".into()));
    }
    Ok(())
}

/// Coordinator configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// UDP port to listen on (all interfaces). `0` picks a free port.
    pub port: u16,
    pub world_size: u32,
    /// Server private key (PEM).
    pub server_key: PathBuf,
    /// Server certificate chain (PEM).
    pub server_cert: PathBuf,
    /// Trusted client certificates (PEM bundle).
    pub client_cert: PathBuf,
    /// How long a request may wait for its round to open. `None` waits forever.
    pub admission_timeout: Option<Duration>,
    /// Reject requests more than this many rounds ahead. `None` is unbounded.
    pub max_rounds_ahead: Option<u64>,
    pub max_message_bytes: u64,
}

impl ServerConfig {
    pub fn new(
        port: u16,
        world_size: u32,
        server_key: impl Into<PathBuf>,
        server_cert: impl Into<PathBuf>,
        client_cert: impl Into<PathBuf>,
    ) -> Self {
        Self {
            port,
            world_size,
            server_key: server_key.into(),
            server_cert: server_cert.into(),
            client_cert: client_cert.into(),
            admission_timeout: None,
            max_rounds_ahead: None,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }

    /// Load config from environment variables.
    ///
    /// Recognized variables:
    /// - `FEDERATED_PORT` (default 9091)
    /// - `FEDERATED_WORLD_SIZE` (default 1)
    /// - `FEDERATED_SERVER_KEY`, `FEDERATED_SERVER_CERT`,
    ///   `FEDERATED_CLIENT_CERT` (required)
    /// - `FEDERATED_ADMISSION_TIMEOUT_SECS`
    /// - `FEDERATED_MAX_ROUNDS_AHEAD`
    /// - `FEDERATED_MAX_MESSAGE_BYTES`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load config through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| -> Result<PathBuf> {
            lookup(key)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .ok_or_else(|| FedError::Config(format!("{key} is not set")))
        };

        let mut cfg = Self::new(
            DEFAULT_PORT,
            1,
            required("FEDERATED_SERVER_KEY")?,
            required("FEDERATED_SERVER_CERT")?,
            required("FEDERATED_CLIENT_CERT")?,
        );

        if let Some(v) = lookup("FEDERATED_PORT") {
            cfg.port = parse_var("FEDERATED_PORT", &v)?;
        }
        if let Some(v) = lookup("FEDERATED_WORLD_SIZE") {
            cfg.world_size = parse_var("FEDERATED_WORLD_SIZE", &v)?;
        }
        if let Some(v) = lookup("FEDERATED_ADMISSION_TIMEOUT_SECS") {
            cfg.admission_timeout = Some(parse_secs("FEDERATED_ADMISSION_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = lookup("FEDERATED_MAX_ROUNDS_AHEAD") {
            cfg.max_rounds_ahead = Some(parse_var("FEDERATED_MAX_ROUNDS_AHEAD", &v)?);
        }
        if let Some(v) = lookup("FEDERATED_MAX_MESSAGE_BYTES") {
            cfg.max_message_bytes = parse_var("FEDERATED_MAX_MESSAGE_BYTES", &v)?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        check_world(self.world_size)?;
        if self.max_message_bytes == 0 {
            return Err(FedError::Config("max message bytes must be positive".into()));
        }
        Ok(())
    }

    /// Address the listener binds to.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }
}

/// Per-rank client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// `host:port` of the coordinator.
    pub server_address: String,
    /// TLS server name. Defaults to the host part of `server_address`.
    pub server_name: Option<String>,
    pub world_size: u32,
    pub rank: Rank,
    /// Trusted server certificates (PEM bundle).
    pub server_cert: Option<PathBuf>,
    /// Client private key (PEM).
    pub client_key: Option<PathBuf>,
    /// Client certificate chain (PEM).
    pub client_cert: Option<PathBuf>,
    /// Per-call deadline. `None` waits as long as the round takes.
    pub call_timeout: Option<Duration>,
    pub max_message_bytes: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_address: format!("localhost:{DEFAULT_PORT}"),
            server_name: None,
            world_size: 1,
            rank: 0,
            server_cert: None,
            client_key: None,
            client_cert: None,
            call_timeout: None,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }
}

impl ClientConfig {
    /// Load config from environment variables, falling back to defaults.
    ///
    /// Recognized variables:
    /// - `FEDERATED_SERVER_ADDRESS` (default `localhost:9091`)
    /// - `FEDERATED_SERVER_NAME`
    /// - `FEDERATED_WORLD_SIZE` (default 1)
    /// - `FEDERATED_RANK` (default 0)
    /// - `FEDERATED_SERVER_CERT`, `FEDERATED_CLIENT_KEY`, `FEDERATED_CLIENT_CERT`
    /// - `FEDERATED_CALL_TIMEOUT_SECS`
    /// - `FEDERATED_MAX_MESSAGE_BYTES`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load config through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut cfg = Self::default();
        for key in Self::KEYS {
            if let Some(value) = lookup(key) {
                cfg.set(key, &value)?;
            }
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply `key=value` overrides. Keys match the environment variable
    /// names case-insensitively; unknown keys and arguments without `=` are
    /// ignored.
    pub fn with_args<I, S>(mut self, args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            if let Some((key, value)) = arg.as_ref().split_once('=') {
                self.set(key.trim(), value)?;
            }
        }
        self.validate()?;
        Ok(self)
    }

    /// Environment first, then `key=value` arguments on top.
    pub fn from_env_and_args<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::from_env()?.with_args(args)
    }

    const KEYS: [&'static str; 9] = [
        "FEDERATED_SERVER_ADDRESS",
        "FEDERATED_SERVER_NAME",
        "FEDERATED_WORLD_SIZE",
        "FEDERATED_RANK",
        "FEDERATED_SERVER_CERT",
        "FEDERATED_CLIENT_KEY",
        "FEDERATED_CLIENT_CERT",
        "FEDERATED_CALL_TIMEOUT_SECS",
        "FEDERATED_MAX_MESSAGE_BYTES",
    ];

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let Some(canonical) = Self::KEYS.iter().find(|k| k.eq_ignore_ascii_case(key)) else {
            return Ok(());
        };
        let path = || (!value.is_empty()).then(|| PathBuf::from(value));
        match *canonical {
            "FEDERATED_SERVER_ADDRESS" => self.server_address = value.to_string(),
            "FEDERATED_SERVER_NAME" => {
                self.server_name = (!value.is_empty()).then(|| value.to_string())
            }
            "FEDERATED_WORLD_SIZE" => self.world_size = parse_var(canonical, value)?,
            "FEDERATED_RANK" => self.rank = parse_var(canonical, value)?,
            "FEDERATED_SERVER_CERT" => self.server_cert = path(),
            "FEDERATED_CLIENT_KEY" => self.client_key = path(),
            "FEDERATED_CLIENT_CERT" => self.client_cert = path(),
            "FEDERATED_CALL_TIMEOUT_SECS" => {
                self.call_timeout = Some(parse_secs(canonical, value)?)
            }
            "FEDERATED_MAX_MESSAGE_BYTES" => self.max_message_bytes = parse_var(canonical, value)?,
            _ => {}
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        check_world(self.world_size)?;
        if self.rank >= self.world_size {
            return Err(FedError::Config(format!(
                "rank {} out of range for world size {}",
                self.rank, self.world_size
            )));
        }
        if self.max_message_bytes == 0 {
            return Err(FedError::Config("max message bytes must be positive".into()));
        }
        Ok(())
    }

    /// The TLS server name to verify against.
    pub fn resolved_server_name(&self) -> &str {
        if let Some(name) = &self.server_name {
            return name;
        }
        let addr = self.server_address.as_str();
        match addr.rsplit_once(':') {
            Some((host, _)) => host.trim_start_matches('[').trim_end_matches(']'),
            None => addr,
        }
    }
}
