/// Unified error handling for the puente dual-store router
///
/// This module provides the error type system for puente, covering
/// backend store failures, configuration errors, and routing errors.
/// Primary-side store failures are recoverable by design (the router
/// catches and reports them); secondary-side failures always surface
/// to the caller.
use std::fmt;
use thiserror::Error;

use crate::config::ConfigError;

/// Main error type for puente router operations
#[derive(Debug, Error)]
pub enum PuenteError {
    /// Backend store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A pinned block is already active on this router instance.
    /// Only one pin level is supported; nested pins are rejected
    /// rather than silently overwriting the active one.
    #[error("Pinned block already active while executing: {command}")]
    PinActive { command: String },

    /// Internal errors (should not happen in normal operation)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Backend-store-specific errors
///
/// These model the failures an underlying key-value client can raise.
/// The router never constructs `Connection`/`Timeout` itself; they come
/// from the store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connection to the backend failed or dropped
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// Backend did not respond in time
    #[error("Operation timed out: {operation}")]
    Timeout { operation: String },

    /// Command executed against a key holding the wrong data type
    #[error("Wrong type for command {command}: {message}")]
    WrongType { command: String, message: String },

    /// Command name the backend does not implement
    #[error("Unknown command: {name}")]
    UnknownCommand { name: String },

    /// Malformed command (bad arity, unparsable argument)
    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Result type alias for puente operations
pub type PuenteResult<T> = Result<T, PuenteError>;

/// Convenience methods for creating specific error types
impl PuenteError {
    /// Create a pin-conflict error
    pub fn pin_active<S: Into<String>>(command: S) -> Self {
        PuenteError::PinActive {
            command: command.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        PuenteError::Internal {
            message: message.into(),
        }
    }

    /// Check if this error is recoverable when raised by the primary
    /// store (the router swallows it and carries on with the secondary)
    pub fn is_recoverable(&self) -> bool {
        match self {
            PuenteError::Store(e) => e.is_recoverable(),
            PuenteError::PinActive { .. } => false,
            PuenteError::Config(_) => false,
            PuenteError::Internal { .. } => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            PuenteError::Config(_) => ErrorSeverity::Critical,
            PuenteError::Internal { .. } => ErrorSeverity::Critical,
            PuenteError::PinActive { .. } => ErrorSeverity::Error,
            PuenteError::Store(e) => e.severity(),
        }
    }
}

/// Convenience methods for creating store errors
impl StoreError {
    pub fn connection<S: Into<String>>(message: S) -> Self {
        StoreError::Connection {
            message: message.into(),
        }
    }

    pub fn timeout<S: Into<String>>(operation: S) -> Self {
        StoreError::Timeout {
            operation: operation.into(),
        }
    }

    pub fn wrong_type<S: Into<String>>(command: S, message: S) -> Self {
        StoreError::WrongType {
            command: command.into(),
            message: message.into(),
        }
    }

    pub fn unknown_command<S: Into<String>>(name: S) -> Self {
        StoreError::UnknownCommand { name: name.into() }
    }

    pub fn protocol<S: Into<String>>(message: S) -> Self {
        StoreError::Protocol(message.into())
    }

    /// Transient failures are recoverable; shape errors are not
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StoreError::Connection { .. } | StoreError::Timeout { .. }
        )
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            StoreError::Connection { .. } => ErrorSeverity::Warning,
            StoreError::Timeout { .. } => ErrorSeverity::Warning,
            StoreError::WrongType { .. } => ErrorSeverity::Error,
            StoreError::UnknownCommand { .. } => ErrorSeverity::Info,
            StoreError::Protocol(_) => ErrorSeverity::Error,
        }
    }
}

/// Error severity levels for logging and monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical errors that require immediate attention
    Critical,
    /// Errors that affect functionality but don't crash the system
    Error,
    /// Warnings about potential issues
    Warning,
    /// Informational messages about recoverable issues
    Info,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Warning => write!(f, "WARNING"),
            ErrorSeverity::Info => write!(f, "INFO"),
        }
    }
}
