//! Test utilities for mysql-fixture
//!
//! Shared builders, sample data and a mock-backed test context for the
//! `unit`, `commands` and `integration` test targets.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use test_utils::{ConfigBuilder, TestContext};
//!
//! #[test]
//! fn my_test() {
//!     let ctx = TestContext::new();
//!     let mut fixture = ctx.fixture(ConfigBuilder::minimal().build());
//!     fixture.start().unwrap();
//!     // ... test code
//! }
//! ```

pub mod config_builder;
pub mod fixtures;
pub mod test_context;

// Re-export commonly used items
pub use config_builder::ConfigBuilder;
pub use fixtures::*;
pub use test_context::{ResultAssertions, TestContext};

// Re-export types from the main crate for convenience
pub use mysql_fixture::config::{
    DockerSettings, FileConfig, FixtureConfig, FixtureOptions, ImageRef,
};
pub use mysql_fixture::{DatabaseFixture, FixtureError, FixtureState, QueryRow, SqlValue};

// Re-export mock implementations from the main crate
pub use mysql_fixture::utils::database::mock::{MockProvider, MockQuery, ProviderCall};
pub use mysql_fixture::utils::runtime::mock::{MockRuntime, RuntimeCall};

/// Fixture wired to the mock runtime and provider
pub type MockFixture = DatabaseFixture<MockRuntime, MockProvider>;

/// Common test result type
pub type TestResult<T = ()> = anyhow::Result<T>;
