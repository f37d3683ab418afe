//! Docker CLI utilities for fixture containers

use super::command::{run_command, run_command_stdout};
use super::runtime::{ContainerHandle, LaunchSpec};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{debug, info};

/// Label attached to every container this crate launches
pub const FIXTURE_LABEL: &str = "mysql-fixture";

/// Subset of `docker inspect` `.State`
#[derive(Debug, Clone, Deserialize)]
pub struct ContainerState {
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Running")]
    pub running: bool,
    #[serde(rename = "ExitCode", default)]
    pub exit_code: i64,
    #[serde(rename = "Error", default)]
    pub error: String,
}

#[derive(Debug, Clone, Deserialize)]
struct PortBinding {
    #[serde(rename = "HostIp", default)]
    host_ip: String,
    #[serde(rename = "HostPort")]
    host_port: String,
}

/// Build the argument vector for `docker run`
pub fn build_run_args(spec: &LaunchSpec) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "-d".to_string(),
        "--name".to_string(),
        spec.name.clone(),
    ];

    for (key, value) in &spec.labels {
        args.push("--label".to_string());
        args.push(format!("{}={}", key, value));
    }

    for (key, value) in &spec.env {
        args.push("-e".to_string());
        args.push(format!("{}={}", key, value));
    }

    // Read-only bind mounts exist before the entrypoint runs, so the server
    // reads the overlay on its first start
    for overlay in &spec.file_overlays {
        args.push("-v".to_string());
        args.push(format!("{}:{}:ro", overlay.source.display(), overlay.destination));
    }

    for port in &spec.exposed_ports {
        args.push("-p".to_string());
        args.push(format!("{}::{}", spec.bind_host, port));
    }

    args.push(spec.image.clone());
    args
}

/// Launch a detached container and return its id
pub fn run_container(
    runtime: &Runtime,
    docker: &str,
    spec: &LaunchSpec,
    timeout: Duration,
) -> Result<ContainerHandle> {
    info!("Launching container {} from image {}", spec.name, spec.image);

    let args = build_run_args(spec);
    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
    let stdout = run_command_stdout(runtime, docker, &arg_refs, timeout)
        .with_context(|| format!("Failed to launch container from image {}", spec.image))?;

    // Pull progress can precede the id when the image is not cached
    let id = stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .context("docker run did not print a container id")?
        .to_string();

    info!("Container {} started ({})", spec.name, short_id(&id));
    Ok(ContainerHandle {
        id,
        name: spec.name.clone(),
    })
}

/// Inspect the container's state
pub fn inspect_state(
    runtime: &Runtime,
    docker: &str,
    handle: &ContainerHandle,
    timeout: Duration,
) -> Result<ContainerState> {
    let output = run_command_stdout(
        runtime,
        docker,
        &["inspect", "--format", "{{json .State}}", &handle.id],
        timeout,
    )?;
    serde_json::from_str(output.trim()).context("Failed to parse container state")
}

/// Resolve the host port bound to `container_port/tcp`
pub fn host_port(
    runtime: &Runtime,
    docker: &str,
    handle: &ContainerHandle,
    container_port: u16,
    timeout: Duration,
) -> Result<u16> {
    let output = run_command_stdout(
        runtime,
        docker,
        &["inspect", "--format", "{{json .NetworkSettings.Ports}}", &handle.id],
        timeout,
    )?;
    parse_host_port(&output, container_port)
}

/// Parse the `.NetworkSettings.Ports` JSON object
pub fn parse_host_port(json: &str, container_port: u16) -> Result<u16> {
    let ports: Option<HashMap<String, Option<Vec<PortBinding>>>> =
        serde_json::from_str(json.trim()).context("Failed to parse port bindings")?;

    let key = format!("{}/tcp", container_port);
    let bindings = ports
        .and_then(|mut p| p.remove(&key))
        .flatten()
        .with_context(|| format!("Port {} is not published", key))?;

    // Prefer the IPv4 binding when docker reports both families
    let binding = bindings
        .iter()
        .find(|b| !b.host_ip.contains(':'))
        .or_else(|| bindings.first())
        .with_context(|| format!("Port {} has no host binding", key))?;

    binding
        .host_port
        .parse::<u16>()
        .with_context(|| format!("Invalid host port: {}", binding.host_port))
}

/// Fetch everything the container has written to stdout and stderr
pub fn container_logs(
    runtime: &Runtime,
    docker: &str,
    handle: &ContainerHandle,
    timeout: Duration,
) -> Result<String> {
    let output = run_command(runtime, docker, &["logs", &handle.id], timeout)?;
    let mut logs = String::from_utf8_lossy(&output.stdout).to_string();
    logs.push_str(&String::from_utf8_lossy(&output.stderr));
    Ok(logs)
}

/// Force-remove the container and its anonymous volumes
pub fn remove_container(
    runtime: &Runtime,
    docker: &str,
    handle: &ContainerHandle,
    timeout: Duration,
) -> Result<()> {
    info!("Removing container {} ({})", handle.name, short_id(&handle.id));
    match run_command(runtime, docker, &["rm", "-f", "-v", &handle.id], timeout) {
        Ok(_) => Ok(()),
        Err(e) if e.to_string().contains("No such container") => {
            debug!("Container {} already gone", handle.name);
            Ok(())
        }
        Err(e) => Err(e.context(format!("Failed to remove container {}", handle.name))),
    }
}

/// List ids of all containers (running or not) carrying the fixture label
pub fn list_fixture_containers(
    runtime: &Runtime,
    docker: &str,
    timeout: Duration,
) -> Result<Vec<String>> {
    let filter = format!("label={}", FIXTURE_LABEL);
    let output = run_command_stdout(
        runtime,
        docker,
        &["ps", "-a", "--no-trunc", "--filter", &filter, "--format", "{{.ID}}"],
        timeout,
    )?;
    Ok(output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// Check that the docker daemon answers
pub fn daemon_available(runtime: &Runtime, docker: &str, timeout: Duration) -> bool {
    run_command(runtime, docker, &["version", "--format", "{{.Server.Version}}"], timeout).is_ok()
}

fn short_id(id: &str) -> &str {
    &id[..id.len().min(12)]
}
