pub mod command;
pub mod docker;

// Trait-based abstractions for testability
pub mod database;
pub mod runtime;

// Re-export commonly used types and traits (used by test crate)
pub use database::{ConnectionProvider, MySqlProvider};
pub use runtime::{ContainerRuntime, DockerCli};
