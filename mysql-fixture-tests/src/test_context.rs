//! Mock-backed test context
//!
//! A [`TestContext`] owns a temp dir plus one [`MockRuntime`] and one
//! [`MockProvider`]. Fixtures built from it receive clones, so the context
//! keeps seeing every call they make, even after the fixture is dropped.

use crate::fixtures::ready_provider;
use crate::MockFixture;
use mysql_fixture::config::FixtureConfig;
use mysql_fixture::utils::database::mock::MockProvider;
use mysql_fixture::utils::runtime::mock::MockRuntime;
use mysql_fixture::{DatabaseFixture, LaunchSpec};
use std::fmt::{Debug, Display};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct TestContext {
    temp_dir: TempDir,
    runtime: MockRuntime,
    provider: MockProvider,
}

impl TestContext {
    /// Context whose database is ready on the first ping
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
            runtime: MockRuntime::new(),
            provider: ready_provider(),
        }
    }

    pub fn with_runtime(mut self, runtime: MockRuntime) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn with_provider(mut self, provider: MockProvider) -> Self {
        self.provider = provider;
        self
    }

    /// Fixture sharing this context's mocks
    pub fn fixture(&self, config: FixtureConfig) -> MockFixture {
        DatabaseFixture::with_parts(config, self.runtime.clone(), self.provider.clone())
    }

    pub fn runtime(&self) -> &MockRuntime {
        &self.runtime
    }

    pub fn provider(&self) -> &MockProvider {
        &self.provider
    }

    /// The most recent launch request (panics when nothing was launched)
    pub fn last_launch(&self) -> LaunchSpec {
        self.runtime
            .launches()
            .pop()
            .expect("No container was launched")
    }

    /// Every launched container has been torn down
    pub fn assert_no_leaks(&self) {
        let running = self.runtime.running.lock().unwrap().clone();
        assert!(
            running.is_empty(),
            "{} container(s) still running: {:?}",
            running.len(),
            running
        );
    }

    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Write `content` to `name` under the temp dir, creating parents
    pub fn create_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(&path, content).expect("Failed to write file");
        path
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Assertion helpers that report the error's `Display` text
pub trait ResultAssertions<T> {
    fn assert_ok(self) -> T;

    /// Assert an error whose message contains `needle`
    fn assert_err_contains(self, needle: &str);
}

impl<T: Debug, E: Display> ResultAssertions<T> for Result<T, E> {
    fn assert_ok(self) -> T {
        self.unwrap_or_else(|e| panic!("Expected Ok, got Err: {}", e))
    }

    fn assert_err_contains(self, needle: &str) {
        let message = match self {
            Ok(v) => panic!("Expected Err containing '{}', got Ok: {:?}", needle, v),
            Err(e) => e.to_string(),
        };
        assert!(
            message.contains(needle),
            "Error '{}' does not contain '{}'",
            message,
            needle
        );
    }
}
