use super::types::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field '{0}'")]
    MissingField(&'static str),

    #[error("Invalid image reference '{0}': {1}")]
    InvalidImage(String, String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Fully validated configuration loaded from a file
#[derive(Debug, Clone)]
pub struct Config {
    pub fixture: FixtureConfig,
    pub docker: DockerSettings,
}

/// Load and validate configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let raw = load_file_config(path)?;
    let fixture = configure(raw.fixture)?;
    validate_docker(&raw.docker)?;
    Ok(Config {
        fixture,
        docker: raw.docker,
    })
}

/// Parse a TOML file without validating the fixture options.
///
/// A relative overlay source is resolved against the file's directory.
pub fn load_file_config<P: AsRef<Path>>(path: P) -> Result<FileConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    let mut config: FileConfig = toml::from_str(&contents)?;

    if let Some(ref mut overlay) = config.fixture.config_overlay {
        let source = expand_tilde(&overlay.source);
        if source.is_relative() {
            if let Some(dir) = path.parent() {
                overlay.source = dir.join(source);
            }
        } else {
            overlay.source = source;
        }
    }

    Ok(config)
}

/// Build a validated [`FixtureConfig`] from raw options. Touches nothing
/// except the overlay source, which must exist.
pub fn configure(options: FixtureOptions) -> Result<FixtureConfig> {
    let image = parse_image_ref(&required(options.image, "image")?)?;
    let database = required(options.database, "database")?;
    let username = required(options.username, "username")?;
    let password = required(options.password, "password")?;

    if database.len() > 64 || !database.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$') {
        return Err(ConfigError::ValidationError(format!(
            "Database name '{}' must be at most 64 characters of [A-Za-z0-9_$]",
            database
        )));
    }

    let root_password = match options.root_password {
        Some(p) if p.is_empty() => {
            return Err(ConfigError::ValidationError(
                "Root password must not be empty".to_string(),
            ))
        }
        Some(p) => p,
        None => password.clone(),
    };

    let config_overlay = options
        .config_overlay
        .map(resolve_overlay)
        .transpose()?;

    let startup_timeout = match (options.startup_timeout_ms, options.startup_timeout_seconds) {
        (Some(ms), _) => Duration::from_millis(ms),
        (None, Some(secs)) => Duration::from_secs(secs),
        (None, None) => Duration::from_secs(DEFAULT_STARTUP_TIMEOUT_SECS),
    };
    if startup_timeout.is_zero() {
        return Err(ConfigError::ValidationError(
            "Startup timeout must be greater than zero".to_string(),
        ));
    }

    let poll_interval =
        Duration::from_millis(options.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS));
    if poll_interval.is_zero() {
        return Err(ConfigError::ValidationError(
            "Poll interval must be greater than zero".to_string(),
        ));
    }

    let container_port = options.container_port.unwrap_or(DEFAULT_CONTAINER_PORT);
    if container_port == 0 {
        return Err(ConfigError::ValidationError(
            "Container port must not be 0".to_string(),
        ));
    }

    let host = options.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    if host.trim().is_empty() {
        return Err(ConfigError::ValidationError("Host must not be empty".to_string()));
    }

    for key in options.env.keys() {
        if key.is_empty() || key.contains('=') {
            return Err(ConfigError::ValidationError(format!(
                "Invalid environment variable name: '{}'",
                key
            )));
        }
    }

    Ok(FixtureConfig {
        image,
        database,
        username,
        password,
        root_password,
        config_overlay,
        startup_timeout,
        poll_interval,
        container_port,
        host,
        env: options.env,
        forward_container_logs: options.forward_container_logs.unwrap_or(false),
    })
}

impl FixtureConfig {
    /// See [`configure`]
    pub fn configure(options: FixtureOptions) -> Result<Self> {
        configure(options)
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingField(field)),
    }
}

fn resolve_overlay(overlay: OverlayOptions) -> Result<ConfigOverlay> {
    let source = expand_tilde(&overlay.source);
    if !source.is_file() {
        return Err(ConfigError::ValidationError(format!(
            "Config overlay file does not exist: {:?}",
            source
        )));
    }
    // Bind mounts need an absolute host path
    let source = fs::canonicalize(&source)?;

    let destination = overlay
        .destination
        .unwrap_or_else(|| DEFAULT_OVERLAY_DESTINATION.to_string());
    if !destination.starts_with('/') || destination.ends_with('/') {
        return Err(ConfigError::ValidationError(format!(
            "Config overlay destination must be an absolute file path: '{}'",
            destination
        )));
    }

    Ok(ConfigOverlay { source, destination })
}

/// Validate the `[docker]` table
pub fn validate_docker(docker: &DockerSettings) -> Result<()> {
    if docker.binary.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "Docker binary must not be empty".to_string(),
        ));
    }
    if docker.command_timeout_seconds == 0 {
        return Err(ConfigError::ValidationError(
            "Docker command timeout must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Parse `repository[:tag][@digest]`
pub fn parse_image_ref(image: &str) -> Result<ImageRef> {
    let invalid = |reason: &str| ConfigError::InvalidImage(image.to_string(), reason.to_string());

    if image.is_empty() {
        return Err(invalid("empty"));
    }
    if image.chars().any(char::is_whitespace) {
        return Err(invalid("contains whitespace"));
    }

    let (name, digest) = match image.split_once('@') {
        Some((name, digest)) => {
            if !digest.contains(':') {
                return Err(invalid("digest must be algorithm:hex"));
            }
            (name, Some(digest.to_string()))
        }
        None => (image, None),
    };

    // A colon after the last slash separates the tag; earlier colons
    // belong to a registry port
    let last_slash = name.rfind('/').map_or(0, |i| i + 1);
    let (repository, tag) = match name[last_slash..].rfind(':') {
        Some(i) => {
            let split = last_slash + i;
            (&name[..split], Some(name[split + 1..].to_string()))
        }
        None => (name, None),
    };

    if repository.is_empty() || repository.starts_with('/') || repository.ends_with('/') {
        return Err(invalid("missing repository"));
    }
    if !repository
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "._-/:".contains(c))
    {
        return Err(invalid("repository must be lowercase [a-z0-9._-/]"));
    }
    // Only a registry host (the first of several components) may carry a port
    let path = match repository.split_once('/') {
        Some((registry, path)) => {
            if let Some((host, port)) = registry.split_once(':') {
                if host.is_empty() || port.is_empty() || !port.chars().all(|c| c.is_ascii_digit()) {
                    return Err(invalid("malformed registry port"));
                }
            }
            path
        }
        None => repository,
    };
    if path.contains(':') {
        return Err(invalid("unexpected ':' in repository"));
    }
    if let Some(ref tag) = tag {
        if tag.is_empty()
            || tag.len() > 128
            || !tag.chars().all(|c| c.is_ascii_alphanumeric() || "._-".contains(c))
        {
            return Err(invalid("malformed tag"));
        }
    }

    Ok(ImageRef {
        repository: repository.to_string(),
        tag,
        digest,
    })
}

/// Expand tilde (~) in path
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}
