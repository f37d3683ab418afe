//! Ephemeral MySQL fixture
//!
//! A [`DatabaseFixture`] owns exactly one container. Its lifecycle is
//! `NotStarted -> Starting -> Ready -> Stopped`; `Stopped` is terminal.
//!
//! ```no_run
//! use mysql_fixture::{DatabaseFixture, FixtureOptions};
//!
//! let mut fixture = DatabaseFixture::configure(
//!     FixtureOptions::new()
//!         .image("mysql:5.6")
//!         .database("openmrs")
//!         .credentials("test", "test"),
//! )?;
//! fixture.start()?;
//! let row = fixture.run_query("SELECT 1")?;
//! assert_eq!(row.get_i64(0), Some(1));
//! fixture.stop();
//! # Ok::<(), mysql_fixture::FixtureError>(())
//! ```
//!
//! All calls block. The default runtime and provider each drive a private
//! tokio runtime, so a fixture must not be created, used or dropped from
//! inside an async context; use `spawn_blocking` from async tests.

use crate::config::{configure, DockerSettings, FixtureConfig, FixtureOptions};
use crate::error::{FixtureError, Result};
use crate::logging::CONTAINER_TARGET;
use crate::utils::database::{ConnectionProvider, Endpoint, MySqlProvider, QueryRow};
use crate::utils::docker::FIXTURE_LABEL;
use crate::utils::runtime::{ContainerHandle, ContainerRuntime, DockerCli, FileOverlay, LaunchSpec};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Lines of container output attached to startup errors
const LOG_TAIL_LINES: usize = 20;

/// Lifecycle state of a fixture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureState {
    NotStarted,
    Starting,
    Ready,
    Stopped,
}

impl fmt::Display for FixtureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FixtureState::NotStarted => "not started",
            FixtureState::Starting => "starting",
            FixtureState::Ready => "ready",
            FixtureState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

enum Probe {
    Ready(Endpoint),
    Pending(String),
    Exited,
}

/// A disposable MySQL instance for one test or test suite.
///
/// Dropping the fixture stops it, so the container is released on every
/// exit path, panics included.
pub struct DatabaseFixture<R: ContainerRuntime = DockerCli, P: ConnectionProvider = MySqlProvider> {
    config: FixtureConfig,
    runtime: R,
    provider: P,
    state: FixtureState,
    container: Option<ContainerHandle>,
    endpoint: Option<Endpoint>,
}

impl DatabaseFixture {
    /// Fixture on the local docker daemon with the MySQL driver
    pub fn new(config: FixtureConfig) -> Result<Self> {
        Self::with_docker(config, &DockerSettings::default())
    }

    pub fn with_docker(config: FixtureConfig, docker: &DockerSettings) -> Result<Self> {
        let startup_error = |e: anyhow::Error| FixtureError::Startup {
            image: config.image.to_string(),
            message: format!("{:#}", e),
        };
        let runtime = DockerCli::new(docker).map_err(startup_error)?;
        let provider = MySqlProvider::new().map_err(startup_error)?;
        Ok(Self::with_parts(config, runtime, provider))
    }

    /// Validate `options` and build a fixture. No container is touched.
    pub fn configure(options: FixtureOptions) -> Result<Self> {
        let config = configure(options)?;
        Self::new(config)
    }
}

impl<R: ContainerRuntime, P: ConnectionProvider> DatabaseFixture<R, P> {
    /// Fixture with an injected runtime and connection provider
    pub fn with_parts(config: FixtureConfig, runtime: R, provider: P) -> Self {
        Self {
            config,
            runtime,
            provider,
            state: FixtureState::NotStarted,
            container: None,
            endpoint: None,
        }
    }

    pub fn state(&self) -> FixtureState {
        self.state
    }

    pub fn config(&self) -> &FixtureConfig {
        &self.config
    }

    /// Endpoint of a ready fixture
    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    /// Handle of the launched container, if any
    pub fn container(&self) -> Option<&ContainerHandle> {
        self.container.as_ref()
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Launch the container and block until the database answers or the
    /// startup timeout elapses.
    ///
    /// Returns the existing endpoint when already ready. After a failed
    /// start the fixture stays `Starting`; call [`stop`](Self::stop) to
    /// release whatever was launched.
    pub fn start(&mut self) -> Result<&Endpoint> {
        if self.state == FixtureState::Ready {
            debug!("Fixture already ready, reusing endpoint");
            return self.endpoint.as_ref().ok_or(FixtureError::InvalidState {
                operation: "start",
                state: self.state,
            });
        }
        if self.state != FixtureState::NotStarted {
            return Err(self.invalid_state("start"));
        }

        self.state = FixtureState::Starting;
        info!("Starting MySQL fixture from image {}", self.config.image);

        let spec = self.launch_spec();
        // `docker run` can fail after the daemon created the container, so
        // teardown must be able to find it by name alone
        self.container = Some(ContainerHandle {
            id: spec.name.clone(),
            name: spec.name.clone(),
        });
        let handle = self.runtime.launch(&spec).map_err(|e| FixtureError::Startup {
            image: spec.image.clone(),
            message: format!("{:#}", e),
        })?;
        self.container = Some(handle.clone());

        let endpoint = self.wait_until_ready(&handle)?;
        info!("MySQL fixture ready at {}", endpoint);

        self.state = FixtureState::Ready;
        Ok(self.endpoint.insert(endpoint))
    }

    /// Execute `sql` on a fresh connection and return the first row.
    ///
    /// A statement that yields no row is a query error. The fixture stays
    /// usable after any query error.
    pub fn run_query(&self, sql: &str) -> Result<QueryRow> {
        let endpoint = self.ready_endpoint("run a query")?;
        match self.provider.first_row(endpoint, sql) {
            Ok(Some(row)) => Ok(row),
            Ok(None) => Err(FixtureError::Query {
                sql: sql.to_string(),
                message: "statement returned no rows".to_string(),
            }),
            Err(e) => Err(FixtureError::Query {
                sql: sql.to_string(),
                message: format!("{:#}", e),
            }),
        }
    }

    /// Execute a statement that returns no rows (DDL, inserts, updates).
    /// Returns the number of affected rows.
    pub fn execute(&self, sql: &str) -> Result<u64> {
        let endpoint = self.ready_endpoint("execute a statement")?;
        self.provider
            .execute(endpoint, sql)
            .map_err(|e| FixtureError::Query {
                sql: sql.to_string(),
                message: format!("{:#}", e),
            })
    }

    /// Tear the container down. Never fails: teardown errors are logged.
    ///
    /// No-op when not started or already stopped.
    pub fn stop(&mut self) {
        match self.state {
            FixtureState::NotStarted | FixtureState::Stopped => {
                debug!("Stop requested while {}, nothing to do", self.state);
                return;
            }
            FixtureState::Starting | FixtureState::Ready => {}
        }

        if let Some(handle) = self.container.take() {
            if self.config.forward_container_logs {
                self.forward_logs(&handle);
            }
            info!("Stopping MySQL fixture container {}", handle.name);
            if let Err(e) = self.runtime.teardown(&handle) {
                warn!("Failed to tear down container {}: {:#}", handle.name, e);
            }
        }

        self.endpoint = None;
        self.state = FixtureState::Stopped;
    }

    fn launch_spec(&self) -> LaunchSpec {
        let mut labels = BTreeMap::new();
        labels.insert(FIXTURE_LABEL.to_string(), "1".to_string());
        labels.insert(
            format!("{}.created", FIXTURE_LABEL),
            chrono::Utc::now().to_rfc3339(),
        );
        labels.insert(
            format!("{}.database", FIXTURE_LABEL),
            self.config.database.clone(),
        );

        let file_overlays = self
            .config
            .config_overlay
            .iter()
            .map(|overlay| FileOverlay {
                source: overlay.source.clone(),
                destination: overlay.destination.clone(),
            })
            .collect();

        LaunchSpec {
            name: format!("{}-{}", FIXTURE_LABEL, uuid::Uuid::new_v4().simple()),
            image: self.config.image.to_string(),
            env: self.config.container_env(),
            file_overlays,
            exposed_ports: vec![self.config.container_port],
            bind_host: self.config.host.clone(),
            labels,
        }
    }

    /// Poll the readiness predicate until it passes or the deadline elapses
    fn wait_until_ready(&self, handle: &ContainerHandle) -> Result<Endpoint> {
        let deadline = Instant::now() + self.config.startup_timeout;
        let mut host_port = None;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let last_error = match self.probe(handle, &mut host_port, deadline) {
                Probe::Ready(endpoint) => {
                    debug!("Readiness check passed after {} attempt(s)", attempts);
                    return Ok(endpoint);
                }
                Probe::Exited => {
                    let tail = self.log_tail(handle);
                    return Err(FixtureError::Startup {
                        image: self.config.image.to_string(),
                        message: format!("container exited before becoming ready{}", tail),
                    });
                }
                Probe::Pending(reason) => reason,
            };

            let now = Instant::now();
            if now >= deadline {
                warn!(
                    "MySQL fixture not ready after {:?} ({} attempts)",
                    self.config.startup_timeout, attempts
                );
                if self.config.forward_container_logs {
                    self.forward_logs(handle);
                }
                return Err(FixtureError::StartupTimeout {
                    timeout: self.config.startup_timeout,
                    last_error,
                });
            }

            debug!("Database not ready yet: {}", last_error);
            std::thread::sleep(self.config.poll_interval.min(deadline - now));
        }
    }

    /// One readiness attempt; no call outlives `deadline`
    fn probe(
        &self,
        handle: &ContainerHandle,
        host_port: &mut Option<u16>,
        deadline: Instant,
    ) -> Probe {
        let remaining = || deadline.saturating_duration_since(Instant::now());

        match self.runtime.is_running(handle, remaining()) {
            Ok(true) => {}
            Ok(false) => return Probe::Exited,
            Err(e) => return Probe::Pending(format!("{:#}", e)),
        }

        let port = match *host_port {
            Some(port) => port,
            None => match self
                .runtime
                .mapped_port(handle, self.config.container_port, remaining())
            {
                Ok(port) => *host_port.insert(port),
                Err(e) => return Probe::Pending(format!("{:#}", e)),
            },
        };

        let endpoint = Endpoint {
            host: self.config.host.clone(),
            port,
            database: self.config.database.clone(),
            username: self.config.username.clone(),
            password: self.config.password.clone(),
        };

        match self.provider.ping(&endpoint, remaining()) {
            Ok(()) => Probe::Ready(endpoint),
            Err(e) => Probe::Pending(format!("{:#}", e)),
        }
    }

    fn ready_endpoint(&self, operation: &'static str) -> Result<&Endpoint> {
        match (self.state, self.endpoint.as_ref()) {
            (FixtureState::Ready, Some(endpoint)) => Ok(endpoint),
            _ => Err(self.invalid_state(operation)),
        }
    }

    fn invalid_state(&self, operation: &'static str) -> FixtureError {
        FixtureError::InvalidState {
            operation,
            state: self.state,
        }
    }

    fn log_tail(&self, handle: &ContainerHandle) -> String {
        match self.runtime.logs(handle) {
            Ok(logs) => {
                let lines: Vec<&str> = logs.lines().collect();
                if lines.is_empty() {
                    return String::new();
                }
                let start = lines.len().saturating_sub(LOG_TAIL_LINES);
                format!("; last container output:\n{}", lines[start..].join("\n"))
            }
            Err(e) => {
                debug!("Could not read container logs: {:#}", e);
                String::new()
            }
        }
    }

    fn forward_logs(&self, handle: &ContainerHandle) {
        match self.runtime.logs(handle) {
            Ok(logs) => {
                for line in logs.lines() {
                    info!(target: CONTAINER_TARGET, "[{}] {}", handle.name, line);
                }
            }
            Err(e) => warn!("Could not read logs of container {}: {:#}", handle.name, e),
        }
    }
}

impl<R: ContainerRuntime, P: ConnectionProvider> Drop for DatabaseFixture<R, P> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<R: ContainerRuntime, P: ConnectionProvider> fmt::Debug for DatabaseFixture<R, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseFixture")
            .field("image", &self.config.image.to_string())
            .field("state", &self.state)
            .field("container", &self.container)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}
