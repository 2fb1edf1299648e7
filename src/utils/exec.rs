//! External command execution.
//!
//! The template renderer, style compiler and script bundler are external
//! programs configured in `config.json`; this module runs them with captured
//! output and turns non-zero exits into readable errors.

use anyhow::{Context, Result, bail};
use std::{
    io::Write,
    path::Path,
    process::{Command, Stdio},
};

/// Run a configured command, returning its stdout as a string.
///
/// `command` is the argv prefix from config (`["sass", "--no-charset"]`),
/// `args` the per-invocation arguments appended to it.
pub fn run(
    root: &Path,
    command: &[String],
    args: &[String],
    envs: &[(&str, String)],
) -> Result<String> {
    let output = build_command(root, command, args, envs)?
        .output()
        .with_context(|| format!("failed to spawn `{}`", command_name(command)))?;

    check_status(command, &output.status, &output.stderr)?;
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Run a configured command feeding `input` on stdin, returning stdout.
pub fn run_with_stdin(
    root: &Path,
    command: &[String],
    args: &[String],
    envs: &[(&str, String)],
    input: &str,
) -> Result<String> {
    let mut child = build_command(root, command, args, envs)?
        .stdin(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to spawn `{}`", command_name(command)))?;

    // Scope the handle so stdin closes before waiting.
    {
        let mut stdin = child
            .stdin
            .take()
            .context("child process has no stdin handle")?;
        stdin.write_all(input.as_bytes())?;
    }

    let output = child
        .wait_with_output()
        .with_context(|| format!("`{}` did not finish", command_name(command)))?;

    check_status(command, &output.status, &output.stderr)?;
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn build_command(
    root: &Path,
    command: &[String],
    args: &[String],
    envs: &[(&str, String)],
) -> Result<Command> {
    let program = command
        .first()
        .context("tool command must have at least one element")?;

    let mut cmd = Command::new(program);
    cmd.args(&command[1..])
        .args(args)
        .current_dir(root)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    for (key, value) in envs {
        cmd.env(key, value);
    }

    Ok(cmd)
}

fn check_status(
    command: &[String],
    status: &std::process::ExitStatus,
    stderr: &[u8],
) -> Result<()> {
    if status.success() {
        return Ok(());
    }

    let detail = String::from_utf8_lossy(stderr);
    let detail = detail.trim();
    if detail.is_empty() {
        bail!("`{}` exited with {}", command_name(command), status);
    }
    bail!("`{}` failed: {}", command_name(command), detail);
}

fn command_name(command: &[String]) -> &str {
    command.first().map_or("<empty>", String::as_str)
}
