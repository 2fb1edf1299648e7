//! FTP deployment.
//!
//! Uploads built output trees to the remote host described in
//! `config-ftp.json`. Deployment is gated: every precondition failure is a
//! logged no-op, not an error; only a connection or upload failure after the
//! gates surfaces as [`DeployError`]. One file's failure aborts the
//! remaining uploads in that call (all-or-abort, not best-effort partial
//! sync), and the session is closed on every exit path.
//!
//! The remote side sits behind [`RemoteTransport`]/[`RemoteSession`] so the
//! gating and traversal logic is testable without a server.

use crate::config::{ConnectionConfig, DeployConfig, Mapping, Workspace};
use crate::state::{AssetType, PipelineState};
use crate::utils::fsx::format_file_size;
use crate::{log, vlog};
use parking_lot::MutexGuard;
use regex::Regex;
use std::{
    fs::{self, File},
    path::Path,
};
use suppaftp::{
    FtpStream, NativeTlsConnector, NativeTlsFtpStream, native_tls::TlsConnector, types::FileType,
};
use thiserror::Error;

/// Deployment failures past the precondition gates.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("connection to {host} failed: {detail}")]
    Connection { host: String, detail: String },

    #[error("upload failed for {file}: {detail}")]
    Upload { file: String, detail: String },
}

// ============================================================================
// Remote transport seam
// ============================================================================

pub trait RemoteSession {
    /// Create the remote directory path, parents included. Existing
    /// directories are fine.
    fn ensure_dir(&mut self, remote: &str) -> Result<(), DeployError>;

    fn upload_file(&mut self, local: &Path, remote: &str) -> Result<(), DeployError>;

    /// Best-effort goodbye; called on success and failure alike.
    fn close(&mut self);
}

pub trait RemoteTransport: Send + Sync {
    fn connect(&self, connection: &ConnectionConfig) -> Result<Box<dyn RemoteSession>, DeployError>;
}

// ============================================================================
// Deployment entry points
// ============================================================================

/// Deploy one named mapping.
///
/// Precondition chain, each failing gate a logged no-op:
/// 1. deploy config loaded, 2. output directory exists, 3. mapping exists,
/// 4. the mapping's asset type compiled successfully, 5. the expected
/// compiled files exist on disk.
pub fn deploy(
    state: &PipelineState,
    transport: &dyn RemoteTransport,
    workspace: &Workspace,
    mapping_name: &str,
) -> Result<(), DeployError> {
    let Some(config) = &workspace.deploy else {
        log!("warn"; "deploy config not loaded, deployment disabled");
        return Ok(());
    };

    let local_root = workspace.root.join(&config.deployment.local_folder);
    if !local_root.exists() {
        log!("warn"; "output directory missing, run a build first");
        return Ok(());
    }

    let Some(mapping) = config.deployment.mappings.get(mapping_name) else {
        log!("error"; "deploy mapping \"{mapping_name}\" not found in config");
        return Ok(());
    };

    if let Some(asset) = gating_asset(mapping_name)
        && !state.bundles.is_healthy(asset)
    {
        log!("warn"; "deploy skipped: {} build not successful yet", asset.name());
        return Ok(());
    }

    // Independent of the in-memory flag: catches outputs deleted between
    // build and deploy.
    let missing = missing_outputs(&local_root, mapping_name);
    if !missing.is_empty() {
        log!("warn"; "deploy skipped: missing compiled files: {}", missing.join(", "));
        return Ok(());
    }

    // All gates passed. Track the operation for graceful shutdown and hold
    // the asset-type output locks so a concurrent subset rebuild cannot
    // write the files being uploaded.
    let _operation = state.operations.begin();
    let _locks = output_locks_for(state, mapping_name);

    log!("deploy"; "deploying {}...", mapping.description);

    let mut session = transport.connect(&config.connection)?;
    let result = upload_mapping(session.as_mut(), &local_root, config, mapping);
    session.close();

    let uploaded = result?;
    log!("deploy"; "{} deployed ({uploaded} files)", mapping.description);
    Ok(())
}

/// Watcher-triggered deploy: only runs when auto-deploy mode is on, and
/// never lets a failure escape into the watch loop.
pub fn auto_deploy(
    state: &PipelineState,
    transport: &dyn RemoteTransport,
    workspace: &Workspace,
    mapping_name: &str,
) {
    if !state
        .auto_deploy
        .load(std::sync::atomic::Ordering::SeqCst)
    {
        return;
    }
    if workspace.deploy.is_none() {
        return;
    }

    log!("deploy"; "auto-deploy triggered for \"{mapping_name}\"");
    if let Err(e) = deploy(state, transport, workspace, mapping_name) {
        log!("error"; "auto-deploy failed: {e}");
    }
}

// ============================================================================
// Gates
// ============================================================================

/// The asset type whose bundle health gates this mapping. Image, font and
/// full-site deploys have no compile step to gate on.
fn gating_asset(mapping_name: &str) -> Option<AssetType> {
    match mapping_name {
        "styles" => Some(AssetType::Styles),
        "scripts" => Some(AssetType::Scripts),
        _ => None,
    }
}

/// Compiled files that must exist on disk before this mapping may deploy.
fn expected_outputs(mapping_name: &str) -> &'static [&'static str] {
    const STYLES: &[&str] = &["css/main.min.css", "css/core.min.css"];
    const SCRIPTS: &[&str] = &["js/main.min.js", "js/core.min.js"];
    const ALL: &[&str] = &[
        "css/main.min.css",
        "css/core.min.css",
        "js/main.min.js",
        "js/core.min.js",
    ];

    match mapping_name {
        "styles" => STYLES,
        "scripts" => SCRIPTS,
        "all" => ALL,
        _ => &[],
    }
}

fn missing_outputs(local_root: &Path, mapping_name: &str) -> Vec<String> {
    expected_outputs(mapping_name)
        .iter()
        .filter(|rel| !local_root.join(rel).exists())
        .map(|rel| (*rel).to_string())
        .collect()
}

type LockPair<'a> = (Option<MutexGuard<'a, ()>>, Option<MutexGuard<'a, ()>>);

fn output_locks_for<'a>(state: &'a PipelineState, mapping_name: &str) -> LockPair<'a> {
    match mapping_name {
        "scripts" => (Some(state.output_locks.scripts.lock()), None),
        "styles" => (None, Some(state.output_locks.styles.lock())),
        "all" => (
            Some(state.output_locks.scripts.lock()),
            Some(state.output_locks.styles.lock()),
        ),
        _ => (None, None),
    }
}

// ============================================================================
// Upload traversal
// ============================================================================

fn upload_mapping(
    session: &mut dyn RemoteSession,
    local_root: &Path,
    config: &DeployConfig,
    mapping: &Mapping,
) -> Result<usize, DeployError> {
    let local = if mapping.local == "." {
        local_root.to_path_buf()
    } else {
        local_root.join(&mapping.local)
    };

    if !local.exists() {
        log!("warn"; "local path does not exist: {}", local.display());
        return Ok(0);
    }

    let remote = join_remote(&config.deployment.base_path, &mapping.remote);
    session.ensure_dir(&remote)?;

    let excludes = compile_excludes(&mapping.exclude);
    upload_directory(session, &local, &remote, &excludes, &local)
}

/// Recursively upload a directory, skipping excluded names. The first failed
/// file aborts the remaining uploads.
fn upload_directory(
    session: &mut dyn RemoteSession,
    local_dir: &Path,
    remote_dir: &str,
    excludes: &[Regex],
    base: &Path,
) -> Result<usize, DeployError> {
    let mut entries: Vec<_> = fs::read_dir(local_dir)
        .map_err(|e| DeployError::Upload {
            file: local_dir.display().to_string(),
            detail: e.to_string(),
        })?
        .filter_map(Result::ok)
        .collect();
    entries.sort_by_key(|e| e.file_name());

    let mut uploaded = 0;

    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        if excludes.iter().any(|re| re.is_match(&name)) {
            vlog!("deploy"; "excluded: {name}");
            continue;
        }

        let path = entry.path();
        let remote_path = format!("{}/{name}", remote_dir.trim_end_matches('/'));

        if path.is_dir() {
            session.ensure_dir(&remote_path)?;
            uploaded += upload_directory(session, &path, &remote_path, excludes, base)?;
        } else {
            let size = path.metadata().map(|m| m.len()).unwrap_or(0);
            let rel = path.strip_prefix(base).unwrap_or(&path);

            match session.upload_file(&path, &remote_path) {
                Ok(()) => {
                    vlog!("deploy"; "{} - {} -> {remote_path}", rel.display(), format_file_size(size));
                    uploaded += 1;
                }
                Err(e) => {
                    log!("error"; "{} - {} failed -> {remote_path}", rel.display(), format_file_size(size));
                    return Err(e);
                }
            }
        }
    }

    Ok(uploaded)
}

/// Join base path and mapping subpath with forward slashes.
fn join_remote(base: &str, sub: &str) -> String {
    let base = base.trim_end_matches('/');
    let sub = sub.trim_start_matches("./").trim_matches('/');

    let joined = if sub.is_empty() || sub == "." {
        base.to_string()
    } else {
        format!("{base}/{sub}")
    };

    if joined.is_empty() {
        "/".to_string()
    } else {
        joined
    }
}

/// Compile `*`-wildcard patterns into anchored regexes over entry names.
fn compile_excludes(patterns: &[String]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| {
            let escaped = regex::escape(pattern).replace(r"\*", ".*");
            Regex::new(&format!("^{escaped}$")).ok()
        })
        .collect()
}

// ============================================================================
// FTP transport
// ============================================================================

/// Production transport speaking FTP (or explicit FTPS when
/// `connection.secure` is set).
pub struct FtpTransport;

enum FtpSession {
    Plain(FtpStream),
    Secure(NativeTlsFtpStream),
}

impl RemoteTransport for FtpTransport {
    fn connect(&self, connection: &ConnectionConfig) -> Result<Box<dyn RemoteSession>, DeployError> {
        let addr = if connection.host.contains(':') {
            connection.host.clone()
        } else {
            format!("{}:21", connection.host)
        };
        let host = addr.split(':').next().unwrap_or(&connection.host).to_string();

        let mut session = if connection.secure {
            let stream = NativeTlsFtpStream::connect(&addr)
                .map_err(|e| connection_error(&connection.host, e))?;
            let connector = TlsConnector::new()
                .map_err(|e| connection_error(&connection.host, e))?;
            let stream = stream
                .into_secure(NativeTlsConnector::from(connector), &host)
                .map_err(|e| connection_error(&connection.host, e))?;
            FtpSession::Secure(stream)
        } else {
            let stream =
                FtpStream::connect(&addr).map_err(|e| connection_error(&connection.host, e))?;
            FtpSession::Plain(stream)
        };

        session
            .login(&connection.user, &connection.password)
            .map_err(|e| connection_error(&connection.host, e))?;
        // Binary mode; text mode mangles bundles and images alike.
        let _ = session.binary();

        Ok(Box::new(session))
    }
}

fn connection_error(host: &str, detail: impl std::fmt::Display) -> DeployError {
    DeployError::Connection {
        host: host.to_string(),
        detail: detail.to_string(),
    }
}

impl FtpSession {
    fn login(&mut self, user: &str, password: &str) -> Result<(), suppaftp::FtpError> {
        match self {
            Self::Plain(s) => s.login(user, password),
            Self::Secure(s) => s.login(user, password),
        }
    }

    fn binary(&mut self) -> Result<(), suppaftp::FtpError> {
        match self {
            Self::Plain(s) => s.transfer_type(FileType::Binary),
            Self::Secure(s) => s.transfer_type(FileType::Binary),
        }
    }

    fn mkdir(&mut self, path: &str) -> Result<(), suppaftp::FtpError> {
        match self {
            Self::Plain(s) => s.mkdir(path),
            Self::Secure(s) => s.mkdir(path),
        }
    }

    fn put(&mut self, remote: &str, reader: &mut File) -> Result<u64, suppaftp::FtpError> {
        match self {
            Self::Plain(s) => s.put_file(remote, reader),
            Self::Secure(s) => s.put_file(remote, reader),
        }
    }

    fn quit(&mut self) -> Result<(), suppaftp::FtpError> {
        match self {
            Self::Plain(s) => s.quit(),
            Self::Secure(s) => s.quit(),
        }
    }
}

impl RemoteSession for FtpSession {
    fn ensure_dir(&mut self, remote: &str) -> Result<(), DeployError> {
        let absolute = remote.starts_with('/');
        let mut current = String::new();

        for part in remote.split('/').filter(|p| !p.is_empty() && *p != ".") {
            if current.is_empty() {
                current = if absolute {
                    format!("/{part}")
                } else {
                    part.to_string()
                };
            } else {
                current = format!("{current}/{part}");
            }
            // mkdir on an existing directory fails; that's fine
            let _ = self.mkdir(&current);
        }

        Ok(())
    }

    fn upload_file(&mut self, local: &Path, remote: &str) -> Result<(), DeployError> {
        let upload_error = |detail: String| DeployError::Upload {
            file: local.display().to_string(),
            detail,
        };

        let mut reader = File::open(local).map_err(|e| upload_error(e.to_string()))?;
        self.put(remote, &mut reader)
            .map(|_| ())
            .map_err(|e| upload_error(e.to_string()))
    }

    fn close(&mut self) {
        let _ = self.quit();
    }
}

// ============================================================================
// Tests
// ============================================================================
