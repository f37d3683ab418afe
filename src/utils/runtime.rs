//! Container runtime abstraction
//!
//! The fixture talks to containers only through [`ContainerRuntime`], so the
//! lifecycle logic can be exercised against [`mock::MockRuntime`] without a
//! Docker daemon.

use crate::config::DockerSettings;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::runtime::Runtime;

/// A host file mounted into the container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOverlay {
    pub source: PathBuf,
    pub destination: String,
}

/// Everything needed to launch one container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub name: String,
    pub image: String,
    pub env: BTreeMap<String, String>,
    pub file_overlays: Vec<FileOverlay>,
    pub exposed_ports: Vec<u16>,
    /// Host interface the exposed ports are published on
    pub bind_host: String,
    pub labels: BTreeMap<String, String>,
}

/// Opaque reference to a launched container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    pub id: String,
    pub name: String,
}

/// Abstraction over a container runtime, enabling mocking in tests
pub trait ContainerRuntime: Send + Sync {
    /// Launch a container; returns once the runtime has accepted it
    fn launch(&self, spec: &LaunchSpec) -> Result<ContainerHandle>;

    /// Host port mapped to `container_port`; gives up after `timeout`
    fn mapped_port(
        &self,
        handle: &ContainerHandle,
        container_port: u16,
        timeout: Duration,
    ) -> Result<u16>;

    /// Whether the container process is still alive; gives up after `timeout`
    fn is_running(&self, handle: &ContainerHandle, timeout: Duration) -> Result<bool>;

    /// Combined stdout/stderr of the container so far
    fn logs(&self, handle: &ContainerHandle) -> Result<String>;

    /// Stop and remove the container, releasing its resources
    fn teardown(&self, handle: &ContainerHandle) -> Result<()>;
}

/// Runtime backed by the `docker` CLI
pub struct DockerCli {
    binary: String,
    command_timeout: Duration,
    runtime: Runtime,
}

impl DockerCli {
    pub fn new(settings: &DockerSettings) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to build tokio runtime for docker commands")?;

        Ok(Self {
            binary: settings.binary.clone(),
            command_timeout: settings.command_timeout(),
            runtime,
        })
    }

    /// Locate the docker binary on PATH before building the runtime
    pub fn locate(settings: &DockerSettings) -> Result<Self> {
        let path = which::which(&settings.binary)
            .with_context(|| format!("Docker binary '{}' not found", settings.binary))?;
        let mut cli = Self::new(settings)?;
        cli.binary = path.display().to_string();
        Ok(cli)
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Whether the daemon answers `docker version`
    pub fn is_available(&self) -> bool {
        super::docker::daemon_available(&self.runtime, &self.binary, Duration::from_secs(10))
    }

    /// Ids of every container carrying the fixture label
    pub fn list_fixture_containers(&self) -> Result<Vec<String>> {
        super::docker::list_fixture_containers(&self.runtime, &self.binary, self.command_timeout)
    }
}

impl std::fmt::Debug for DockerCli {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DockerCli")
            .field("binary", &self.binary)
            .field("command_timeout", &self.command_timeout)
            .finish()
    }
}

impl ContainerRuntime for DockerCli {
    fn launch(&self, spec: &LaunchSpec) -> Result<ContainerHandle> {
        super::docker::run_container(&self.runtime, &self.binary, spec, self.command_timeout)
    }

    fn mapped_port(
        &self,
        handle: &ContainerHandle,
        container_port: u16,
        timeout: Duration,
    ) -> Result<u16> {
        super::docker::host_port(
            &self.runtime,
            &self.binary,
            handle,
            container_port,
            timeout.min(self.command_timeout),
        )
    }

    fn is_running(&self, handle: &ContainerHandle, timeout: Duration) -> Result<bool> {
        let state = super::docker::inspect_state(
            &self.runtime,
            &self.binary,
            handle,
            timeout.min(self.command_timeout),
        )?;
        Ok(state.running)
    }

    fn logs(&self, handle: &ContainerHandle) -> Result<String> {
        super::docker::container_logs(&self.runtime, &self.binary, handle, self.command_timeout)
    }

    fn teardown(&self, handle: &ContainerHandle) -> Result<()> {
        super::docker::remove_container(&self.runtime, &self.binary, handle, self.command_timeout)
    }
}

/// Mock implementation for testing
/// Available for use in external test crates
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Recorded runtime call
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum RuntimeCall {
        Launch(LaunchSpec),
        MappedPort { id: String, port: u16 },
        IsRunning { id: String },
        Logs { id: String },
        Teardown { id: String },
    }

    /// Mock container runtime.
    ///
    /// Clones share state, so a test can keep one clone for assertions
    /// after handing another to a fixture.
    #[derive(Clone)]
    pub struct MockRuntime {
        /// Recorded calls
        pub calls: Arc<Mutex<Vec<RuntimeCall>>>,
        /// Ids of containers launched and not yet torn down
        pub running: Arc<Mutex<Vec<String>>>,
        host_port: Arc<Mutex<u16>>,
        logs: Arc<Mutex<String>>,
        fail_launch: Arc<Mutex<Option<String>>>,
        created_before_failure: Arc<Mutex<bool>>,
        inspect_delay: Arc<Mutex<Duration>>,
        fail_teardown: Arc<Mutex<bool>>,
        exits_after_launch: Arc<Mutex<bool>>,
        next_id: Arc<AtomicUsize>,
    }

    impl Default for MockRuntime {
        fn default() -> Self {
            Self {
                calls: Arc::default(),
                running: Arc::default(),
                host_port: Arc::new(Mutex::new(49153)),
                logs: Arc::default(),
                fail_launch: Arc::default(),
                created_before_failure: Arc::default(),
                inspect_delay: Arc::default(),
                fail_teardown: Arc::default(),
                exits_after_launch: Arc::default(),
                next_id: Arc::default(),
            }
        }
    }

    impl MockRuntime {
        pub fn new() -> Self {
            Self::default()
        }

        /// Configure the host port reported by `mapped_port`
        pub fn with_host_port(self, port: u16) -> Self {
            *self.host_port.lock().unwrap() = port;
            self
        }

        /// Configure container output returned by `logs`
        pub fn with_logs(self, logs: &str) -> Self {
            *self.logs.lock().unwrap() = logs.to_string();
            self
        }

        /// Make `launch` fail with the given message
        pub fn with_failing_launch(self, message: &str) -> Self {
            *self.fail_launch.lock().unwrap() = Some(message.to_string());
            self
        }

        /// Make `launch` fail after the container was created, the way
        /// `docker run` does when the host port cannot be bound
        pub fn with_failing_launch_after_create(self, message: &str) -> Self {
            *self.created_before_failure.lock().unwrap() = true;
            self.with_failing_launch(message)
        }

        /// Make `is_running` take `delay` (bounded by the caller's timeout)
        pub fn with_slow_inspect(self, delay: Duration) -> Self {
            *self.inspect_delay.lock().unwrap() = delay;
            self
        }

        /// Make `teardown` fail
        pub fn with_failing_teardown(self) -> Self {
            *self.fail_teardown.lock().unwrap() = true;
            self
        }

        /// Report launched containers as exited
        pub fn with_exiting_container(self) -> Self {
            *self.exits_after_launch.lock().unwrap() = true;
            self
        }

        /// Get all recorded calls
        pub fn get_calls(&self) -> Vec<RuntimeCall> {
            self.calls.lock().unwrap().clone()
        }

        /// Launch requests seen so far
        pub fn launches(&self) -> Vec<LaunchSpec> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter_map(|c| match c {
                    RuntimeCall::Launch(spec) => Some(spec.clone()),
                    _ => None,
                })
                .collect()
        }

        pub fn launch_count(&self) -> usize {
            self.launches().len()
        }

        pub fn teardown_count(&self) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| matches!(c, RuntimeCall::Teardown { .. }))
                .count()
        }

        /// Number of containers still alive
        pub fn running_count(&self) -> usize {
            self.running.lock().unwrap().len()
        }

        fn record_call(&self, call: RuntimeCall) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl ContainerRuntime for MockRuntime {
        fn launch(&self, spec: &LaunchSpec) -> Result<ContainerHandle> {
            self.record_call(RuntimeCall::Launch(spec.clone()));
            if let Some(ref message) = *self.fail_launch.lock().unwrap() {
                if *self.created_before_failure.lock().unwrap() {
                    // Only the name is known; docker accepts it wherever an id goes
                    self.running.lock().unwrap().push(spec.name.clone());
                }
                anyhow::bail!("Mock launch failure: {}", message);
            }

            let n = self.next_id.fetch_add(1, Ordering::SeqCst);
            let id = format!("mock{:060}", n);
            self.running.lock().unwrap().push(id.clone());
            Ok(ContainerHandle {
                id,
                name: spec.name.clone(),
            })
        }

        fn mapped_port(
            &self,
            handle: &ContainerHandle,
            container_port: u16,
            _timeout: Duration,
        ) -> Result<u16> {
            self.record_call(RuntimeCall::MappedPort {
                id: handle.id.clone(),
                port: container_port,
            });
            Ok(*self.host_port.lock().unwrap())
        }

        fn is_running(&self, handle: &ContainerHandle, timeout: Duration) -> Result<bool> {
            self.record_call(RuntimeCall::IsRunning {
                id: handle.id.clone(),
            });
            let delay = *self.inspect_delay.lock().unwrap();
            if !delay.is_zero() {
                std::thread::sleep(delay.min(timeout));
                if delay > timeout {
                    anyhow::bail!("docker inspect timed out after {:?}", timeout);
                }
            }
            if *self.exits_after_launch.lock().unwrap() {
                return Ok(false);
            }
            Ok(self.running.lock().unwrap().contains(&handle.id))
        }

        fn logs(&self, handle: &ContainerHandle) -> Result<String> {
            self.record_call(RuntimeCall::Logs {
                id: handle.id.clone(),
            });
            Ok(self.logs.lock().unwrap().clone())
        }

        fn teardown(&self, handle: &ContainerHandle) -> Result<()> {
            self.record_call(RuntimeCall::Teardown {
                id: handle.id.clone(),
            });
            if *self.fail_teardown.lock().unwrap() {
                anyhow::bail!("Mock teardown failure for {}", handle.name);
            }
            self.running
                .lock()
                .unwrap()
                .retain(|id| id != &handle.id && id != &handle.name);
            Ok(())
        }
    }
}
