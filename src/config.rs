//! # Configuration Management
//!
//! Centralized configuration for the bank server and client.
//!
//! This module provides structured configuration for the listener, client
//! timeouts, the wire transport (encryption and frame limits) and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()` (`SECURE_BANK_*`)
//!
//! ## Security Considerations
//! - The passphrase keys both the wire envelope and data at rest
//! - The idle timeout and connection cap bound what one slow or hostile peer
//!   can hold on to

use crate::error::{BankError, Result};
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::{warn, Level};

/// Current supported protocol version
pub const PROTOCOL_VERSION: u8 = 1;

/// Magic bytes that open every packet ("SBNK")
pub const MAGIC_BYTES: [u8; 4] = [0x53, 0x42, 0x4E, 0x4B];

/// Default max payload size (1 MiB)
pub const MAX_PAYLOAD_SIZE: usize = 1024 * 1024;

/// Whether to encrypt packets by default
pub const ENABLE_ENCRYPTION: bool = true;

/// Passphrase used when none is configured
pub const DEFAULT_PASSPHRASE: &str = "super_secure_key";

/// Validation entries with this prefix are advisory and never fail `validate_strict`
pub const WARNING_PREFIX: &str = "WARNING: ";

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct BankConfig {
    /// Server-specific configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Client-specific configuration
    #[serde(default)]
    pub client: ClientConfig,

    /// Transport configuration
    #[serde(default)]
    pub transport: TransportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BankConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| BankError::Config(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| BankError::Config(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| BankError::Config(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("SECURE_BANK_SERVER_ADDRESS") {
            config.server.address = addr.clone();
            config.client.address = addr;
        }

        if let Ok(max) = std::env::var("SECURE_BANK_MAX_CONNECTIONS") {
            if let Ok(val) = max.parse::<usize>() {
                config.server.max_connections = val;
            }
        }

        if let Ok(idle) = std::env::var("SECURE_BANK_IDLE_TIMEOUT_MS") {
            if let Ok(val) = idle.parse::<u64>() {
                config.server.idle_timeout = Duration::from_millis(val);
            }
        }

        if let Ok(flag) = std::env::var("SECURE_BANK_ENCRYPT_PACKETS") {
            if let Ok(val) = flag.parse::<bool>() {
                config.transport.encryption_enabled = val;
            }
        }

        if let Ok(passphrase) = std::env::var("SECURE_BANK_PASSPHRASE") {
            config.transport.passphrase = passphrase;
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| BankError::Config(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| BankError::Config(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.client.validate());
        errors.extend(self.transport.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    ///
    /// Warnings are logged and do not fail validation.
    pub fn validate_strict(&self) -> Result<()> {
        let (warnings, errors): (Vec<_>, Vec<_>) = self
            .validate()
            .into_iter()
            .partition(|e| e.starts_with(WARNING_PREFIX));
        for warning in &warnings {
            warn!("{}", warning.strip_prefix(WARNING_PREFIX).unwrap_or(warning));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(BankError::Config(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Server-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Server listen address (e.g., "127.0.0.1:9999")
    pub address: String,

    /// Maximum number of concurrent connections
    pub max_connections: usize,

    /// Close a connection after this long without a request
    #[serde(with = "duration_serde")]
    pub idle_timeout: Duration,

    /// Timeout for graceful server shutdown
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: String::from("127.0.0.1:9999"),
            max_connections: 256,
            idle_timeout: timeout::IDLE_TIMEOUT,
            shutdown_timeout: timeout::SHUTDOWN_TIMEOUT,
        }
    }
}

impl ServerConfig {
    /// Validate server configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Server address cannot be empty".to_string());
        } else if self.address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid server address format: '{}' (expected format: '0.0.0.0:9999')",
                self.address
            ));
        }

        if self.max_connections == 0 {
            errors.push("Max connections must be greater than 0".to_string());
        } else if self.max_connections > 100_000 {
            errors.push(format!(
                "Max connections very high: {} (ensure system resources can support this)",
                self.max_connections
            ));
        }

        if self.idle_timeout.as_millis() < 100 {
            errors.push("Idle timeout too short (minimum: 100ms)".to_string());
        } else if self.idle_timeout.as_secs() > 3600 {
            errors.push("Idle timeout too long (maximum: 1 hour)".to_string());
        }

        if self.shutdown_timeout.as_secs() < 1 {
            errors.push("Shutdown timeout too short (minimum: 1s)".to_string());
        } else if self.shutdown_timeout.as_secs() > 60 {
            errors.push("Shutdown timeout too long (maximum: 60s)".to_string());
        }

        errors
    }
}

/// Client-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Target server address
    pub address: String,

    /// Timeout for connection attempts
    #[serde(with = "duration_serde")]
    pub connection_timeout: Duration,

    /// Timeout for waiting for a response
    #[serde(with = "duration_serde")]
    pub response_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: String::from("127.0.0.1:9999"),
            connection_timeout: timeout::DEFAULT_TIMEOUT,
            response_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Validate client configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Client address cannot be empty".to_string());
        } else if !is_host_port(&self.address) {
            errors.push(format!(
                "Invalid client address format: '{}' (expected format: 'host:9999')",
                self.address
            ));
        }

        if self.connection_timeout.as_millis() < 100 {
            errors.push("Connection timeout too short (minimum: 100ms)".to_string());
        }

        if self.response_timeout.as_millis() < 100 {
            errors.push("Response timeout too short (minimum: 100ms)".to_string());
        }

        errors
    }
}

/// Transport configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportConfig {
    /// Whether to wrap messages in an AES envelope
    pub encryption_enabled: bool,

    /// Shared passphrase; the AES key is its SHA-256 digest
    pub passphrase: String,

    /// Maximum allowed payload size in bytes
    pub max_payload_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            encryption_enabled: ENABLE_ENCRYPTION,
            passphrase: String::from(DEFAULT_PASSPHRASE),
            max_payload_size: MAX_PAYLOAD_SIZE,
        }
    }
}

impl TransportConfig {
    /// Validate transport configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_payload_size == 0 {
            errors.push("Max payload size cannot be 0".to_string());
        } else if self.max_payload_size < 1024 {
            errors.push("Max payload size too small (minimum: 1 KB)".to_string());
        } else if self.max_payload_size > 16 * 1024 * 1024 {
            errors.push(format!(
                "Max payload size too large: {} bytes (maximum: 16 MB)",
                self.max_payload_size
            ));
        }

        if self.passphrase.is_empty() {
            errors.push("Passphrase cannot be empty".to_string());
        }

        if !self.encryption_enabled {
            errors.push(format!(
                "{WARNING_PREFIX}Encryption is disabled - not recommended for production"
            ));
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("secure-bank"),
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// `host:port` where host may be a name; the client resolves it on connect
fn is_host_port(address: &str) -> bool {
    match address.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::{warn, Level};

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        level.as_str().to_ascii_lowercase().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
