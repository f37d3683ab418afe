//! Fixture error taxonomy
//!
//! Each variant names the phase that failed: configuration, launch,
//! readiness, lifecycle ordering, or query.

use crate::config::ConfigError;
use crate::fixture::FixtureState;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Failed to start container from image {image}: {message}")]
    Startup { image: String, message: String },

    #[error("Database did not become ready within {timeout:?}: {last_error}")]
    StartupTimeout { timeout: Duration, last_error: String },

    #[error("Cannot {operation} while the fixture is {state}")]
    InvalidState {
        operation: &'static str,
        state: FixtureState,
    },

    #[error("Query failed ({sql}): {message}")]
    Query { sql: String, message: String },
}

pub type Result<T> = std::result::Result<T, FixtureError>;

impl FixtureError {
    /// Whether the container never reached the ready state
    pub fn is_startup(&self) -> bool {
        matches!(
            self,
            FixtureError::Startup { .. } | FixtureError::StartupTimeout { .. }
        )
    }
}
