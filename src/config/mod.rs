//! Configuration module for mysql-fixture
//!
//! Fixture settings come from two places, which can be combined:
//! 1. A TOML file (`[fixture]` and `[docker]` tables)
//! 2. Programmatic [`FixtureOptions`], merged over the file's values
//!
//! Either way they pass through [`configure`] before any container is touched.
//!
//! ## Example Usage
//!
//! ```no_run
//! use mysql_fixture::config::{self, FixtureOptions};
//!
//! let config = config::configure(
//!     FixtureOptions::new()
//!         .image("mysql:5.6")
//!         .database("openmrs")
//!         .credentials("test", "test"),
//! )?;
//! assert_eq!(config.image.to_string(), "mysql:5.6");
//! # Ok::<(), config::ConfigError>(())
//! ```

mod loader;
mod types;

pub use loader::{
    configure, expand_tilde, load_config, load_file_config, parse_image_ref, validate_docker, Config,
    ConfigError, Result,
};
pub use types::*;
