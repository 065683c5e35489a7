/// Configuration management for puente
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Main puente configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Primary store (attempted first, failures recoverable)
    pub primary: StoreOptions,
    /// Secondary store (authoritative)
    pub secondary: StoreOptions,
    /// Migration toggle configuration
    pub migration: MigrationConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Backend-specific connection parameters, opaque to the router core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreOptions {
    /// Store name used in logs and error context
    pub name: String,
    /// Backend kind ("memory", or an external client kind)
    pub backend: String,
    /// Backend address, required for non-memory backends
    pub addr: Option<String>,
    /// Database index within the backend
    pub database: Option<u32>,
    /// Connection timeout handed to the backend client
    pub connect_timeout_ms: u64,
}

/// Migration toggle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Initial state of the dual-store toggle
    pub use_multi_store: bool,
    /// Environment variable that overrides the toggle at runtime, if set
    pub env_override: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (json, text)
    pub format: String,
    /// Log to stdout
    pub stdout: bool,
    /// Log file path (optional)
    pub file: Option<String>,
}

impl StoreOptions {
    /// Options for the embedded in-memory backend
    pub fn memory<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            backend: "memory".to_string(),
            addr: None,
            database: None,
            connect_timeout_ms: 5000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            primary: StoreOptions::memory("primary"),
            secondary: StoreOptions::memory("secondary"),
            migration: MigrationConfig {
                use_multi_store: false,
                env_override: None,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "text".to_string(),
                stdout: true,
                file: None,
            },
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::validate_store("primary", &self.primary)?;
        Self::validate_store("secondary", &self.secondary)?;

        if self.primary.name == self.secondary.name {
            return Err(ConfigError::ValidationError(
                "primary and secondary stores must have distinct names".to_string(),
            ));
        }

        // Validate logging config
        match self.logging.level.as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log level: {}",
                    self.logging.level
                )))
            }
        }

        match self.logging.format.as_str() {
            "json" | "text" => {}
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log format: {}",
                    self.logging.format
                )))
            }
        }

        Ok(())
    }

    fn validate_store(role: &str, options: &StoreOptions) -> Result<(), ConfigError> {
        if options.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{role} store name cannot be empty"
            )));
        }

        if options.connect_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(format!(
                "{role} connect_timeout_ms must be greater than 0"
            )));
        }

        match options.backend.as_str() {
            "memory" => Ok(()),
            _ => {
                let addr = options.addr.as_deref().unwrap_or("");
                if addr.trim().is_empty() {
                    return Err(ConfigError::ValidationError(format!(
                        "{role} store with backend '{}' requires an addr",
                        options.backend
                    )));
                }
                addr.parse::<std::net::SocketAddr>().map_err(|_| {
                    ConfigError::ValidationError(format!("Invalid {role} store addr: {addr}"))
                })?;
                Ok(())
            }
        }
    }

    /// Create example configuration file for a migration rollout
    pub fn create_example_config<P: AsRef<Path>>(path: P) -> Result<(), ConfigError> {
        let config = Config {
            primary: StoreOptions {
                name: "sessions-old".to_string(),
                backend: "redis".to_string(),
                addr: Some("10.0.1.20:6379".to_string()),
                database: Some(0),
                connect_timeout_ms: 5000,
            },
            secondary: StoreOptions {
                name: "sessions-new".to_string(),
                backend: "redis".to_string(),
                addr: Some("10.0.2.20:6379".to_string()),
                database: Some(0),
                connect_timeout_ms: 5000,
            },
            migration: MigrationConfig {
                use_multi_store: true,
                env_override: Some("PUENTE_USE_MULTI_STORE".to_string()),
            },
            ..Default::default()
        };

        config.save_to_file(path)
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
