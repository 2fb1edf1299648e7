//! Development server with live reload support.
//!
//! A lightweight HTTP server over the build output directory, built on
//! `tiny_http`:
//!
//! - Static file serving from `dist` with automatic `index.html` resolution
//! - Port auto-retry when the base port is taken
//! - Live-reload client injected into served HTML pages
//! - File watching and auto-rebuild (via the `watch` module)
//! - Keyboard shortcuts and graceful shutdown (via the `session` module)
//!
//! The server blocks on the main thread until shutdown unblocks it.

use crate::compile::Toolchain;
use crate::config::cfg;
use crate::deploy::RemoteTransport;
use crate::reload::{self, LiveReload};
use crate::state::PipelineState;
use crate::{build, log, session, watch};
use anyhow::{Context, Result};
use std::{
    fs,
    io::Cursor,
    net::{IpAddr, SocketAddr},
    path::{Path, PathBuf},
    sync::Arc,
    sync::atomic::Ordering,
};
use tiny_http::{Header, Request, Response, Server, StatusCode};

/// Try binding to port, retry with incremented port if in use
const MAX_PORT_RETRIES: u16 = 10;

// ============================================================================
// Server Entry Point
// ============================================================================

/// Run serve mode: initial build, HTTP server, reload hub, watcher,
/// keyboard session. Blocks until shutdown.
pub fn serve_site(
    state: &'static PipelineState,
    toolchain: &'static Toolchain,
    transport: &'static dyn RemoteTransport,
    interface: &str,
    base_port: u16,
    watch_enabled: bool,
) -> Result<()> {
    let interface: IpAddr = interface.parse().context("invalid serve interface")?;

    // Initial build before anything is served.
    let report = build::run_build(state, toolchain, &cfg())?;
    build::log_report(state, &report);

    let (server, addr) = try_bind_port(interface, base_port, MAX_PORT_RETRIES)?;
    let server = Arc::new(server);

    // Live reload hub; prefers the adjacent port, any free one otherwise.
    let reloader = LiveReload::bind(interface, addr.port() + 1)
        .or_else(|_| LiveReload::bind(interface, 0))?;

    // Keep the handle alive for the whole serve session; dropping it stops
    // the watcher.
    let _watcher = if watch_enabled {
        Some(watch::start(
            state,
            toolchain,
            transport,
            Some(Arc::clone(&reloader)),
        )?)
    } else {
        None
    };

    session::start(state, toolchain, transport, Arc::clone(&server));

    log!("serve"; "http://{addr}");
    log!("serve"; "live reload on port {}", reloader.port());
    if watch_enabled {
        log!("watch"; "auto-deploy: {}", if state.auto_deploy.load(Ordering::SeqCst) { "on" } else { "off" });
    }
    session::log_shortcuts();

    // Handle requests in main thread (blocks until shutdown unblocks)
    for request in server.incoming_requests() {
        if state.shutdown.is_shutting_down() {
            break;
        }
        if let Err(e) = handle_request(request, &reloader) {
            log!("serve"; "request error: {e}");
        }
    }

    Ok(())
}

/// Try to bind to a port, retrying with incremented port numbers if in use.
fn try_bind_port(
    interface: IpAddr,
    base_port: u16,
    max_retries: u16,
) -> Result<(Server, SocketAddr)> {
    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                return Ok((server, addr));
            }
            Err(_) if offset + 1 < max_retries => {
                // Will retry silently
                continue;
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "failed to bind after {} attempts (ports {}-{}): {}",
                    max_retries,
                    base_port,
                    port,
                    e
                ));
            }
        }
    }
    unreachable!()
}

// ============================================================================
// Request Handling
// ============================================================================

/// Resolve a request path against the serve root.
///
/// Resolution order: exact file, then directory `index.html`.
fn lookup(serve_root: &Path, url: &str) -> Option<PathBuf> {
    // Decode URL-encoded characters (e.g., %20 -> space)
    let url_path = urlencoding::decode(url)
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_default();

    // Strip query string (e.g., ?t=123456) before resolving; cache-busting
    // URLs like "main.min.css?t=123" must still hit the file.
    let path_without_query = url_path.split('?').next().unwrap_or(&url_path);
    let request_path = path_without_query.trim_matches('/');
    let local_path = serve_root.join(request_path);

    if local_path.is_file() {
        return Some(local_path);
    }

    if local_path.is_dir() {
        let index = local_path.join("index.html");
        if index.is_file() {
            return Some(index);
        }
    }

    None
}

fn handle_request(request: Request, reloader: &Arc<LiveReload>) -> Result<()> {
    let workspace = cfg();

    match lookup(&workspace.output(), request.url()) {
        Some(path) => serve_file(request, &path, reloader),
        None => serve_not_found(request),
    }
}

// ============================================================================
// Response Helpers
// ============================================================================

/// Serve a file with appropriate content type; HTML pages get the reload
/// client injected.
fn serve_file(request: Request, path: &Path, reloader: &Arc<LiveReload>) -> Result<()> {
    let content_type = guess_content_type(path);

    let body = if content_type.starts_with("text/html") {
        let html =
            fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        reload::inject(&html, reloader.port()).into_bytes()
    } else {
        fs::read(path).with_context(|| format!("failed to read {}", path.display()))?
    };

    let response = Response::from_data(body)
        .with_header(Header::from_bytes("Content-Type", content_type).unwrap());

    request.respond(response)?;
    Ok(())
}

/// Serve 404 Not Found response.
fn serve_not_found(request: Request) -> Result<()> {
    let response = Response::new(
        StatusCode(404),
        vec![Header::from_bytes("Content-Type", "text/plain").unwrap()],
        Cursor::new("404 Not Found"),
        Some(13),
        None,
    );
    request.respond(response)?;
    Ok(())
}

// ============================================================================
// Content Type Detection
// ============================================================================

/// Guess MIME content type from file extension.
///
/// Returns `application/octet-stream` for unknown extensions.
fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        // Web content
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json" | "map") => "application/json; charset=utf-8",
        Some("xml") => "application/xml; charset=utf-8",

        // Images
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        Some("mp4") => "video/mp4",

        // Fonts
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",

        // Documents
        Some("txt") => "text/plain; charset=utf-8",

        // Default binary
        _ => "application/octet-stream",
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_guess_content_type() {
        assert_eq!(
            guess_content_type(Path::new("index.html")),
            "text/html; charset=utf-8"
        );
        assert_eq!(
            guess_content_type(Path::new("css/main.min.css")),
            "text/css; charset=utf-8"
        );
        assert_eq!(
            guess_content_type(Path::new("js/core.min.js")),
            "application/javascript; charset=utf-8"
        );
        assert_eq!(guess_content_type(Path::new("img/logo.svg")), "image/svg+xml");
        assert_eq!(
            guess_content_type(Path::new("fonts/inter.woff2")),
            "font/woff2"
        );
        assert_eq!(
            guess_content_type(Path::new("mystery.bin")),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_lookup_resolution_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("index.html"), "root").unwrap();
        fs::write(dir.path().join("sub/index.html"), "sub").unwrap();
        fs::write(dir.path().join("css main.css"), "spaced").unwrap();

        // exact file
        assert_eq!(
            lookup(dir.path(), "/index.html"),
            Some(dir.path().join("index.html"))
        );
        // directory index
        assert_eq!(
            lookup(dir.path(), "/sub/"),
            Some(dir.path().join("sub/index.html"))
        );
        // root
        assert_eq!(lookup(dir.path(), "/"), Some(dir.path().join("index.html")));
        // query strings stripped
        assert_eq!(
            lookup(dir.path(), "/index.html?t=12345"),
            Some(dir.path().join("index.html"))
        );
        // url decoding
        assert_eq!(
            lookup(dir.path(), "/css%20main.css"),
            Some(dir.path().join("css main.css"))
        );
        // missing
        assert_eq!(lookup(dir.path(), "/nope.html"), None);
    }

    #[test]
    fn test_try_bind_port_retries_past_taken_port() {
        let interface: IpAddr = "127.0.0.1".parse().unwrap();

        // Occupy a port, then ask for it as the base.
        let taken = TcpListener::bind((interface, 0)).unwrap();
        let base = taken.local_addr().unwrap().port();

        let (_server, addr) = try_bind_port(interface, base, MAX_PORT_RETRIES).unwrap();
        assert_ne!(addr.port(), base);
        assert!(addr.port() > base);
    }
}
