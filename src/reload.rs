//! Live reload transport.
//!
//! A WebSocket hub that connected browsers subscribe to; rebuild handlers
//! fire a scope message ("css", "js" or "all") and the injected client
//! script either swaps stylesheets in place or reloads the page. Absent hub
//! (non-serve modes) means no reload calls are ever made - the transport is
//! a capability, not a requirement.

use crate::vlog;
use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::{
    net::{IpAddr, TcpListener, TcpStream},
    sync::Arc,
    thread,
};
use tungstenite::{Message, WebSocket};

/// What the browser should refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadScope {
    Css,
    Js,
    All,
}

impl ReloadScope {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Css => "css",
            Self::Js => "js",
            Self::All => "all",
        }
    }
}

/// WebSocket broadcast hub for connected browser clients.
pub struct LiveReload {
    clients: Mutex<Vec<WebSocket<TcpStream>>>,
    port: u16,
}

impl LiveReload {
    /// Bind the hub and start accepting clients on a background thread.
    ///
    /// Port 0 picks an ephemeral port; the chosen one is in [`Self::port`].
    pub fn bind(interface: IpAddr, port: u16) -> Result<Arc<Self>> {
        let listener = TcpListener::bind((interface, port))
            .with_context(|| format!("failed to bind live reload port {port}"))?;
        let port = listener.local_addr()?.port();

        let hub = Arc::new(Self {
            clients: Mutex::new(Vec::new()),
            port,
        });

        let accept_hub = Arc::clone(&hub);
        thread::spawn(move || {
            for stream in listener.incoming().filter_map(Result::ok) {
                match tungstenite::accept(stream) {
                    Ok(socket) => accept_hub.clients.lock().push(socket),
                    Err(e) => vlog!("serve"; "reload handshake failed: {e}"),
                }
            }
        });

        Ok(hub)
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn client_count(&self) -> usize {
        self.clients.lock().len()
    }

    /// Fire-and-forget broadcast; dead clients are pruned on send.
    pub fn reload(&self, scope: ReloadScope) {
        let mut clients = self.clients.lock();
        clients.retain_mut(|socket| socket.send(Message::text(scope.as_str())).is_ok());

        if !clients.is_empty() {
            vlog!("serve"; "reload ({}) -> {} client(s)", scope.as_str(), clients.len());
        }
    }
}

// ============================================================================
// Client injection
// ============================================================================

/// The reload client injected into served HTML pages.
pub fn client_script(port: u16) -> String {
    format!(
        r#"<script>
(function () {{
  var ws = new WebSocket("ws://" + location.hostname + ":{port}");
  ws.onmessage = function (event) {{
    if (event.data === "css") {{
      document.querySelectorAll("link[rel=stylesheet]").forEach(function (link) {{
        link.href = link.href.split("?")[0] + "?t=" + Date.now();
      }});
    }} else {{
      location.reload();
    }}
  }};
}})();
</script>"#
    )
}

/// Inject the reload client into an HTML document, just before `</body>`
/// when present.
pub fn inject(html: &str, port: u16) -> String {
    let script = client_script(port);
    match html.rfind("</body>") {
        Some(index) => {
            let mut out = String::with_capacity(html.len() + script.len());
            out.push_str(&html[..index]);
            out.push_str(&script);
            out.push_str(&html[index..]);
            out
        }
        None => format!("{html}{script}"),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn test_inject_before_body_close() {
        let html = "<html><body><p>hi</p></body></html>";
        let out = inject(html, 4000);

        let script_at = out.find("<script>").unwrap();
        let body_close = out.find("</body>").unwrap();
        assert!(script_at < body_close);
        assert!(out.contains(":4000"));
    }

    #[test]
    fn test_inject_without_body_appends() {
        let out = inject("plain fragment", 4000);
        assert!(out.starts_with("plain fragment"));
        assert!(out.contains("WebSocket"));
    }

    #[test]
    fn test_broadcast_reaches_client() {
        let hub = LiveReload::bind("127.0.0.1".parse().unwrap(), 0).unwrap();

        let (mut client, _) =
            tungstenite::connect(format!("ws://127.0.0.1:{}", hub.port())).unwrap();

        // wait for the accept thread to register the client
        let deadline = Instant::now() + Duration::from_secs(2);
        while hub.client_count() == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(hub.client_count(), 1);

        hub.reload(ReloadScope::Css);

        let message = client.read().unwrap();
        assert_eq!(message.to_text().unwrap(), "css");
    }

    #[test]
    fn test_dead_clients_are_pruned() {
        let hub = LiveReload::bind("127.0.0.1".parse().unwrap(), 0).unwrap();

        {
            let (mut client, _) =
                tungstenite::connect(format!("ws://127.0.0.1:{}", hub.port())).unwrap();
            let deadline = Instant::now() + Duration::from_secs(2);
            while hub.client_count() == 0 && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(10));
            }
            let _ = client.close(None);
        }

        // sends to the closed socket fail and the entry drops out
        let deadline = Instant::now() + Duration::from_secs(2);
        while hub.client_count() > 0 && Instant::now() < deadline {
            hub.reload(ReloadScope::All);
            thread::sleep(Duration::from_millis(20));
        }
        assert_eq!(hub.client_count(), 0);
    }
}
