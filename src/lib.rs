//! MySQL Fixture Library
//!
//! Disposable MySQL instances in containers for integration tests: launch,
//! wait until the database answers, query, tear down.

pub mod config;
pub mod error;
pub mod fixture;
pub mod logging;
pub mod utils;

// Re-export commonly used types
pub use config::{configure, load_config, Config, ConfigError, FixtureConfig, FixtureOptions};
pub use error::FixtureError;
pub use fixture::{DatabaseFixture, FixtureState};
pub use logging::{init_logging, init_test_logging, LogGuard, LoggingConfig};
pub use utils::database::{ConnectionProvider, Endpoint, MySqlProvider, QueryRow, SqlValue};
pub use utils::runtime::{ContainerHandle, ContainerRuntime, DockerCli, LaunchSpec};
