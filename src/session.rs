//! Interactive session control: keyboard shortcuts and graceful shutdown.
//!
//! Keypresses map to configured actions (`config-ftp.json` shortcuts) and
//! are dispatched as messages to a consumer thread, fire-and-forget, so the
//! input listener stays responsive while a build or deploy runs. Shutdown is
//! a one-way state machine: stop taking commands, wait (bounded) for
//! in-flight deploys to drain, restore the terminal, unblock the HTTP
//! server.

use crate::config::cfg;
use crate::deploy::{self, RemoteTransport};
use crate::state::PipelineState;
use crate::{build, log, logger};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::{
    io::IsTerminal,
    sync::{
        Arc,
        mpsc::{self, Sender},
    },
    thread,
    time::Duration,
};
use tiny_http::Server;

/// Bounded wait for in-flight operations before shutdown force-proceeds.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Keyboard poll interval; also bounds shutdown latency of the input loop.
const INPUT_POLL: Duration = Duration::from_millis(200);

// ============================================================================
// Actions
// ============================================================================

/// Dispatchable session commands, named in the deploy config shortcuts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Build,
    DeployStyles,
    DeployScripts,
    DeployImages,
    DeployFonts,
    DeployAll,
    ToggleAutoDeploy,
}

impl Action {
    /// Parse the action name used in `config-ftp.json`.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "build" => Some(Self::Build),
            "deployStyles" => Some(Self::DeployStyles),
            "deployScripts" => Some(Self::DeployScripts),
            "deployImages" => Some(Self::DeployImages),
            "deployFonts" => Some(Self::DeployFonts),
            "deployAll" => Some(Self::DeployAll),
            "toggleAutoDeploy" => Some(Self::ToggleAutoDeploy),
            _ => None,
        }
    }

    /// The deploy mapping this action targets, if it is a deploy.
    pub const fn mapping(self) -> Option<&'static str> {
        match self {
            Self::DeployStyles => Some("styles"),
            Self::DeployScripts => Some("scripts"),
            Self::DeployImages => Some("images"),
            Self::DeployFonts => Some("fonts"),
            Self::DeployAll => Some("all"),
            Self::Build | Self::ToggleAutoDeploy => None,
        }
    }
}

// ============================================================================
// Session startup
// ============================================================================

/// Spawn the command consumer, the keyboard listener (tty only) and the
/// interrupt handler.
pub fn start(
    state: &'static PipelineState,
    toolchain: &'static crate::compile::Toolchain,
    transport: &'static dyn RemoteTransport,
    server: Arc<Server>,
) {
    let (tx, rx) = mpsc::channel::<Action>();

    // Commands run sequentially here, off the input thread.
    thread::spawn(move || {
        for action in rx {
            if state.shutdown.is_shutting_down() {
                break;
            }
            run_action(state, toolchain, transport, action);
        }
    });

    {
        let server = Arc::clone(&server);
        if std::io::stdin().is_terminal() {
            thread::spawn(move || keyboard_loop(state, tx, server));
        }
    }

    // Covers non-tty runs and terminals where the key listener is not active.
    let result = ctrlc::set_handler(move || shutdown(state, &server));
    if let Err(e) = result {
        log!("warn"; "failed to set interrupt handler: {e}");
    }
}

fn run_action(
    state: &'static PipelineState,
    toolchain: &crate::compile::Toolchain,
    transport: &dyn RemoteTransport,
    action: Action,
) {
    match action {
        Action::Build => {
            let workspace = cfg();
            match build::run_build(state, toolchain, &workspace) {
                Ok(report) => build::log_report(state, &report),
                Err(e) => log!("error"; "build failed: {e:#}"),
            }
        }
        Action::ToggleAutoDeploy => {
            use std::sync::atomic::Ordering;
            let enabled = !state.auto_deploy.load(Ordering::SeqCst);
            state.auto_deploy.store(enabled, Ordering::SeqCst);
            log!("deploy"; "auto-deploy: {}", if enabled { "on" } else { "off" });
        }
        _ => {
            let Some(mapping) = action.mapping() else {
                return;
            };
            let workspace = cfg();
            if let Err(e) = deploy::deploy(state, transport, &workspace, mapping) {
                log!("error"; "{mapping} deployment failed: {e}");
            }
        }
    }
}

// ============================================================================
// Keyboard input
// ============================================================================

fn keyboard_loop(state: &'static PipelineState, tx: Sender<Action>, server: Arc<Server>) {
    if enable_raw_mode().is_err() {
        return;
    }

    loop {
        if state.shutdown.is_shutting_down() {
            break;
        }

        match event::poll(INPUT_POLL) {
            Ok(true) => {
                let Ok(Event::Key(key)) = event::read() else {
                    continue;
                };
                if key.kind != KeyEventKind::Press {
                    continue;
                }

                if key.code == KeyCode::Char('c')
                    && key.modifiers.contains(KeyModifiers::CONTROL)
                {
                    shutdown(state, &server);
                    break;
                }

                if let KeyCode::Char(c) = key.code {
                    dispatch_key(c.to_ascii_lowercase(), &tx);
                }
            }
            Ok(false) => {}
            Err(_) => break,
        }
    }

    let _ = disable_raw_mode();
}

/// Map a pressed character onto its configured action. Unrecognized keys are
/// ignored; recognized ones are sent without waiting for completion.
fn dispatch_key(key: char, tx: &Sender<Action>) {
    let workspace = cfg();
    let Some(config) = &workspace.deploy else {
        return;
    };
    let Some(shortcut) = config.shortcuts.get(&key.to_string()) else {
        return;
    };

    match Action::parse(&shortcut.action) {
        Some(action) => {
            log!("serve"; "command received: {}", shortcut.description);
            let _ = tx.send(action);
        }
        None => log!("warn"; "unknown action in shortcuts: {}", shortcut.action),
    }
}

/// Print the configured shortcut table (serve mode startup).
pub fn log_shortcuts() {
    let workspace = cfg();
    let Some(config) = &workspace.deploy else {
        log!("warn"; "deploy config not found, deployment shortcuts disabled");
        return;
    };
    if config.shortcuts.is_empty() {
        return;
    }

    let mut keys: Vec<_> = config.shortcuts.iter().collect();
    keys.sort_by(|a, b| a.0.cmp(b.0));
    for (key, shortcut) in keys {
        log!("serve"; "  [{}] {}", key.to_uppercase(), shortcut.description);
    }
    log!("serve"; "press ctrl+c to exit");
}

// ============================================================================
// Shutdown
// ============================================================================

/// Run the graceful shutdown sequence. Idempotent: only the first caller
/// does the work.
pub fn shutdown(state: &PipelineState, server: &Server) {
    if !state.shutdown.begin() {
        return;
    }

    log!("serve"; "shutting down gracefully...");

    let active = state.operations.count();
    if active > 0 {
        log!("serve"; "waiting for {active} operation(s) to complete...");
        if !state.operations.wait_drained(SHUTDOWN_TIMEOUT) {
            log!("warn"; "forcing exit ({} operation(s) still active)", state.operations.count());
        }
    }

    let _ = disable_raw_mode();
    server.unblock();
    state.shutdown.terminate();

    if logger::verbose() {
        log!("serve"; "goodbye");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_action_parse_known_names() {
        assert_eq!(Action::parse("build"), Some(Action::Build));
        assert_eq!(Action::parse("deployStyles"), Some(Action::DeployStyles));
        assert_eq!(Action::parse("deployScripts"), Some(Action::DeployScripts));
        assert_eq!(Action::parse("deployImages"), Some(Action::DeployImages));
        assert_eq!(Action::parse("deployFonts"), Some(Action::DeployFonts));
        assert_eq!(Action::parse("deployAll"), Some(Action::DeployAll));
        assert_eq!(
            Action::parse("toggleAutoDeploy"),
            Some(Action::ToggleAutoDeploy)
        );
        assert_eq!(Action::parse("rm -rf"), None);
        assert_eq!(Action::parse(""), None);
    }

    #[test]
    fn test_action_mappings() {
        assert_eq!(Action::DeployStyles.mapping(), Some("styles"));
        assert_eq!(Action::DeployScripts.mapping(), Some("scripts"));
        assert_eq!(Action::DeployAll.mapping(), Some("all"));
        assert_eq!(Action::Build.mapping(), None);
        assert_eq!(Action::ToggleAutoDeploy.mapping(), None);
    }

    #[test]
    fn test_shutdown_with_no_operations_is_fast() {
        let state = PipelineState::new();
        let server = Server::http("127.0.0.1:0").unwrap();

        let started = Instant::now();
        shutdown(&state, &server);

        assert!(started.elapsed() < Duration::from_millis(500));
        assert!(state.shutdown.is_shutting_down());

        // second call is a no-op
        shutdown(&state, &server);
    }

    #[test]
    fn test_shutdown_waits_for_draining_operations() {
        let state = PipelineState::new();
        let server = Server::http("127.0.0.1:0").unwrap();

        let token = state.operations.begin();
        thread::scope(|s| {
            s.spawn(move || {
                thread::sleep(Duration::from_millis(150));
                drop(token);
            });

            let started = Instant::now();
            shutdown(&state, &server);

            // waited for the drain, but nowhere near the 5s bound
            assert!(started.elapsed() >= Duration::from_millis(100));
            assert!(started.elapsed() < Duration::from_secs(2));
        });
    }
}
