use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Root structure of a fixture configuration file
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FileConfig {
    #[serde(default)]
    pub fixture: FixtureOptions,

    #[serde(default)]
    pub docker: DockerSettings,
}

/// Raw fixture options, as supplied by a caller or a config file.
///
/// Every field is optional here; [`FixtureConfig::configure`] checks that the
/// required ones are present and well formed.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct FixtureOptions {
    /// Image reference, e.g. `mysql:5.6`
    #[serde(default)]
    pub image: Option<String>,

    /// Database created on first boot
    #[serde(default)]
    pub database: Option<String>,

    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,

    /// Root password (defaults to `password`)
    #[serde(default)]
    pub root_password: Option<String>,

    /// Configuration file injected into the container
    #[serde(default)]
    pub config_overlay: Option<OverlayOptions>,

    /// Readiness timeout
    #[serde(default)]
    pub startup_timeout_seconds: Option<u64>,
    /// Readiness timeout with sub-second precision; wins over the seconds field
    #[serde(default)]
    pub startup_timeout_ms: Option<u64>,
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,

    #[serde(default)]
    pub container_port: Option<u16>,
    #[serde(default)]
    pub host: Option<String>,

    /// Extra environment variables passed to the container
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Forward container stdout/stderr into the tracing log before teardown
    #[serde(default)]
    pub forward_container_logs: Option<bool>,
}

impl FixtureOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn root_password(mut self, root_password: impl Into<String>) -> Self {
        self.root_password = Some(root_password.into());
        self
    }

    /// Inject a configuration file at the default destination
    pub fn config_overlay(mut self, source: impl Into<PathBuf>) -> Self {
        self.config_overlay = Some(OverlayOptions {
            source: source.into(),
            destination: None,
        });
        self
    }

    /// Inject a configuration file at an explicit container path
    pub fn config_overlay_at(
        mut self,
        source: impl Into<PathBuf>,
        destination: impl Into<String>,
    ) -> Self {
        self.config_overlay = Some(OverlayOptions {
            source: source.into(),
            destination: Some(destination.into()),
        });
        self
    }

    pub fn startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = Some(interval.as_millis() as u64);
        self
    }

    pub fn container_port(mut self, port: u16) -> Self {
        self.container_port = Some(port);
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn forward_container_logs(mut self, enabled: bool) -> Self {
        self.forward_container_logs = Some(enabled);
        self
    }

    /// Overlay `other` on top of `self`; fields set in `other` win
    pub fn merge(mut self, other: FixtureOptions) -> Self {
        self.image = other.image.or(self.image);
        self.database = other.database.or(self.database);
        self.username = other.username.or(self.username);
        self.password = other.password.or(self.password);
        self.root_password = other.root_password.or(self.root_password);
        self.config_overlay = other.config_overlay.or(self.config_overlay);
        // Either timeout field in `other` replaces both of ours
        if other.startup_timeout_seconds.is_some() || other.startup_timeout_ms.is_some() {
            self.startup_timeout_seconds = other.startup_timeout_seconds;
            self.startup_timeout_ms = other.startup_timeout_ms;
        }
        self.poll_interval_ms = other.poll_interval_ms.or(self.poll_interval_ms);
        self.container_port = other.container_port.or(self.container_port);
        self.host = other.host.or(self.host);
        self.env.extend(other.env);
        self.forward_container_logs = other.forward_container_logs.or(self.forward_container_logs);
        self
    }
}

/// Raw configuration-file overlay
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct OverlayOptions {
    pub source: PathBuf,
    #[serde(default)]
    pub destination: Option<String>,
}

/// Docker CLI settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct DockerSettings {
    #[serde(default = "default_docker_binary")]
    pub binary: String,

    /// Upper bound for a single docker command (image pulls included)
    #[serde(default = "default_command_timeout")]
    pub command_timeout_seconds: u64,
}

impl Default for DockerSettings {
    fn default() -> Self {
        Self {
            binary: default_docker_binary(),
            command_timeout_seconds: default_command_timeout(),
        }
    }
}

impl DockerSettings {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_seconds)
    }
}

/// Parsed image reference: `repository[:tag][@digest]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub repository: String,
    pub tag: Option<String>,
    pub digest: Option<String>,
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.repository)?;
        match (&self.tag, &self.digest) {
            (Some(tag), _) => write!(f, ":{}", tag)?,
            (None, None) => write!(f, ":latest")?,
            (None, Some(_)) => {}
        }
        if let Some(ref digest) = self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}

/// Configuration file copied into the container before the server starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigOverlay {
    /// Absolute host path
    pub source: PathBuf,
    /// Absolute container path
    pub destination: String,
}

/// Validated, immutable fixture configuration
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureConfig {
    pub image: ImageRef,
    pub database: String,
    pub username: String,
    pub password: String,
    pub root_password: String,
    pub config_overlay: Option<ConfigOverlay>,
    pub startup_timeout: Duration,
    pub poll_interval: Duration,
    pub container_port: u16,
    pub host: String,
    pub env: BTreeMap<String, String>,
    pub forward_container_logs: bool,
}

impl FixtureConfig {
    /// Environment passed to the container: credentials first, then the
    /// caller's extras (which may override them)
    pub fn container_env(&self) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        env.insert("MYSQL_DATABASE".to_string(), self.database.clone());
        env.insert("MYSQL_ROOT_PASSWORD".to_string(), self.root_password.clone());
        // The image refuses to create a second "root" account
        if self.username != "root" {
            env.insert("MYSQL_USER".to_string(), self.username.clone());
            env.insert("MYSQL_PASSWORD".to_string(), self.password.clone());
        }
        env.extend(self.env.clone());
        env
    }
}

// Default value functions

pub(crate) const DEFAULT_OVERLAY_DESTINATION: &str = "/etc/mysql/conf.d/fixture.cnf";
pub(crate) const DEFAULT_STARTUP_TIMEOUT_SECS: u64 = 120;
pub(crate) const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
pub(crate) const DEFAULT_CONTAINER_PORT: u16 = 3306;
pub(crate) const DEFAULT_HOST: &str = "127.0.0.1";

fn default_docker_binary() -> String { "docker".to_string() }
fn default_command_timeout() -> u64 { 300 }
