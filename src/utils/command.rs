//! Child process helpers for the docker CLI

use anyhow::{Context, Result};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tokio::runtime::Runtime;
use tracing::debug;

/// Run `program` to completion on `runtime`.
///
/// Fails on a non-zero exit status (with trimmed stderr as the message) or
/// when `timeout` elapses, in which case the child is killed.
pub fn run_command(
    runtime: &Runtime,
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<Output> {
    let rendered = redact_args(args).join(" ");
    debug!("Running: {} {}", program, rendered);

    let output = runtime.block_on(async {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(output) => output.with_context(|| format!("Failed to execute {}", program)),
            Err(_) => anyhow::bail!("{} {} timed out after {:?}", program, rendered, timeout),
        }
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        debug!("{} exited with {:?}: {}", program, output.status.code(), stderr);
        anyhow::bail!(
            "Command failed with exit code {:?}: {}",
            output.status.code(),
            stderr
        );
    }

    Ok(output)
}

/// Run a command and return stdout as string
pub fn run_command_stdout(
    runtime: &Runtime,
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<String> {
    let output = run_command(runtime, program, args, timeout)?;
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Hide values of `KEY=value` pairs whose key looks like a secret
fn redact_args(args: &[&str]) -> Vec<String> {
    args.iter()
        .map(|arg| match arg.split_once('=') {
            Some((key, _)) if key.to_uppercase().contains("PASSWORD") => format!("{}=***", key),
            _ => arg.to_string(),
        })
        .collect()
}
