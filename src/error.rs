// src/error.rs - Configuration error taxonomy
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use thiserror::Error;

/// Errors produced while compiling a configuration document.
///
/// These are data, not control flow: validation collects every error it can
/// find and surfaces them together, so most variants end up in an ordered
/// `Vec<ConfigError>` rather than being returned one at a time.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConfigError {
    // Field-level errors
    #[error("Invalid port number: {value} (must be 1-65535)")]
    InvalidPort { value: i64 },

    #[error("Invalid path '{text}': {cause}")]
    InvalidPath { text: String, cause: String },

    #[error("No path could be resolved")]
    MissingPath,

    // Cross-object errors
    #[error("Server {addr_a} conflicts with already-bound server {addr_b}")]
    ConflictingPorts { addr_a: SocketAddr, addr_b: SocketAddr },

    #[error("Servers {addr_a} and {addr_b} conflict within the same router")]
    ConflictingServers { addr_a: SocketAddr, addr_b: SocketAddr },

    #[error("Duplicate router label '{label}'")]
    DuplicateRouterLabel { label: String },

    // Structural errors
    #[error("No routers specified")]
    NoRoutersSpecified,

    #[error("Unknown parameter '{name}'")]
    UnknownParameter { name: String },

    #[error("Missing required field '{name}'")]
    MissingRequiredField { name: String },

    // Plugin-resolution errors
    #[error("No plugin registered for kind '{kind}'")]
    PluginNotFound { kind: String },

    // Syntax errors from the document tree
    #[error("Parse error at line {line} column {column}: {message}")]
    ParseError {
        message: String,
        line: usize,
        column: usize,
    },
}

/// Result type alias for operations that fail with a single config error.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Broad error categories, used for reporting and for deciding whether an
/// error short-circuits the object being parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Malformed or out-of-range individual values.
    FieldLevel,
    /// Relationships between sibling or ancestor objects.
    CrossObject,
    /// Missing required sections or unrecognized keys.
    Structural,
    /// A `kind`/`protocol` discriminator with no registered plugin.
    Plugin,
    /// Errors from the underlying document tree; these abort compilation.
    Syntax,
}

impl ConfigError {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ConfigError::InvalidPort { .. }
            | ConfigError::InvalidPath { .. }
            | ConfigError::MissingPath => ErrorCategory::FieldLevel,

            ConfigError::ConflictingPorts { .. }
            | ConfigError::ConflictingServers { .. }
            | ConfigError::DuplicateRouterLabel { .. } => ErrorCategory::CrossObject,

            ConfigError::NoRoutersSpecified
            | ConfigError::UnknownParameter { .. }
            | ConfigError::MissingRequiredField { .. } => ErrorCategory::Structural,

            ConfigError::PluginNotFound { .. } => ErrorCategory::Plugin,

            ConfigError::ParseError { .. } => ErrorCategory::Syntax,
        }
    }

    /// Whether this error makes further structural analysis of the whole
    /// document impossible.
    pub fn is_fatal(&self) -> bool {
        self.category() == ErrorCategory::Syntax
    }
}
