//! Fluent API for building fixture configurations in tests
//!
//! Starts from fast mock-friendly timings so failing readiness tests finish
//! in milliseconds rather than minutes.

use mysql_fixture::config::{self, DockerSettings, FileConfig, FixtureConfig, FixtureOptions};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Builder for creating test configurations
pub struct ConfigBuilder {
    temp_dir: TempDir,
    options: FixtureOptions,
    docker: DockerSettings,
}

impl ConfigBuilder {
    /// Create a builder with no options set
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
            options: FixtureOptions::new(),
            docker: DockerSettings::default(),
        }
    }

    /// The OpenMRS-style defaults: mysql:5.6, database `openmrs`, user
    /// `test`/`test`, one second to become ready
    pub fn minimal() -> Self {
        let mut builder = Self::new();
        builder.options = builder
            .options
            .image("mysql:5.6")
            .database("openmrs")
            .credentials("test", "test")
            .startup_timeout(Duration::from_secs(1))
            .poll_interval(Duration::from_millis(10));
        builder
    }

    pub fn with_image(mut self, image: &str) -> Self {
        self.options = self.options.image(image);
        self
    }

    pub fn with_database(mut self, database: &str) -> Self {
        self.options = self.options.database(database);
        self
    }

    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.options = self.options.credentials(username, password);
        self
    }

    pub fn with_root_password(mut self, password: &str) -> Self {
        self.options = self.options.root_password(password);
        self
    }

    /// Set the readiness timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.options = self.options.startup_timeout(timeout);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.options = self.options.poll_interval(interval);
        self
    }

    /// Write `contents` to `fixture.cnf` in the temp dir and inject it at
    /// the default destination
    pub fn with_overlay(mut self, contents: &str) -> Self {
        let path = self.write_file("fixture.cnf", contents);
        self.options = self.options.config_overlay(path);
        self
    }

    /// Same as [`with_overlay`](Self::with_overlay) with an explicit
    /// container path
    pub fn with_overlay_at(mut self, contents: &str, destination: &str) -> Self {
        let path = self.write_file("fixture.cnf", contents);
        self.options = self.options.config_overlay_at(path, destination);
        self
    }

    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.options = self.options.env(key, value);
        self
    }

    pub fn with_container_logs(mut self) -> Self {
        self.options = self.options.forward_container_logs(true);
        self
    }

    pub fn with_docker_binary(mut self, binary: &str) -> Self {
        self.docker.binary = binary.to_string();
        self
    }

    /// Get the temp directory path
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Raw options as built so far
    pub fn options(&self) -> FixtureOptions {
        self.options.clone()
    }

    pub fn docker(&self) -> DockerSettings {
        self.docker.clone()
    }

    /// Options and docker settings as they would appear in a file
    pub fn file_config(&self) -> FileConfig {
        FileConfig {
            fixture: self.options.clone(),
            docker: self.docker.clone(),
        }
    }

    /// Serialize the configuration to `name` inside the temp dir
    pub fn write_toml(&self, name: &str) -> PathBuf {
        let contents =
            toml::to_string_pretty(&self.file_config()).expect("Failed to serialize config");
        self.write_file(name, &contents)
    }

    /// Validate the options
    pub fn try_build(&self) -> config::Result<FixtureConfig> {
        config::configure(self.options.clone())
    }

    /// Build the validated configuration (panics on invalid options)
    pub fn build(self) -> FixtureConfig {
        self.try_build().expect("Failed to build fixture config")
    }

    /// Build the configuration and keep the temp dir (and any overlay
    /// file in it) alive
    pub fn persist(self) -> (FixtureConfig, TempDir) {
        let config = self.try_build().expect("Failed to build fixture config");
        (config, self.temp_dir)
    }

    fn write_file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        fs::write(&path, contents).expect("Failed to write file");
        path
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
