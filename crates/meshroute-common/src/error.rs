//! Error types for route management.
//!
//! All errors implement `std::error::Error` via `thiserror`.

use meshroute_types::{AddressFamily, ParseError, RouteId};
use std::io;
use thiserror::Error;

/// Result type alias for route management operations.
pub type RouteMgrResult<T> = Result<T, RouteMgrError>;

/// Errors that can occur while managing routes.
#[derive(Debug, Error)]
pub enum RouteMgrError {
    /// The operating context was cancelled before the operation started.
    #[error("Operation cancelled")]
    Cancelled,

    /// A route could not be translated into a NAT rule.
    #[error("Invalid route {route_id}: {message}")]
    InvalidRoute {
        /// The offending route.
        route_id: RouteId,
        /// Error message.
        message: String,
    },

    /// The route uses an address family that is not handled.
    #[error("Route {route_id}: {family} prefixes are not supported")]
    UnsupportedAddressFamily {
        /// The offending route.
        route_id: RouteId,
        /// The rejected family.
        family: AddressFamily,
    },

    /// A firewall primitive reported a failure.
    #[error("Firewall operation failed: {operation}: {message}")]
    Firewall {
        /// The operation that failed (e.g., "add nat rule").
        operation: String,
        /// Error message.
        message: String,
    },

    /// Enabling or disabling global routing failed.
    #[error("Failed to {action} routing: {source}")]
    RoutingToggle {
        /// "enable" or "disable".
        action: &'static str,
        /// The underlying firewall error.
        #[source]
        source: Box<RouteMgrError>,
    },

    /// Failed to execute a shell command (spawn error).
    #[error("Failed to execute shell command '{command}': {source}")]
    ShellExec {
        /// The command that failed to execute.
        command: String,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Shell command returned non-zero exit code.
    #[error("Shell command failed: '{command}' (exit code {exit_code}): {output}")]
    ShellCommandFailed {
        /// The command that failed.
        command: String,
        /// The exit code.
        exit_code: i32,
        /// Combined stdout/stderr output.
        output: String,
    },

    /// Configuration validation error.
    #[error("Invalid configuration for {field}: {message}")]
    InvalidConfig {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// Reading a configuration or route file failed.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// A value could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl RouteMgrError {
    /// Creates a firewall error.
    pub fn firewall(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Firewall {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid route error.
    pub fn invalid_route(route_id: RouteId, message: impl Into<String>) -> Self {
        Self::InvalidRoute {
            route_id,
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Wraps a firewall error raised while toggling routing.
    pub fn routing_toggle(action: &'static str, source: RouteMgrError) -> Self {
        Self::RoutingToggle {
            action,
            source: Box::new(source),
        }
    }

    /// Returns true if the operation was refused because of cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RouteMgrError::Cancelled)
    }
}
