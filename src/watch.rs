//! File system watcher and change dispatcher.
//!
//! One `notify` watcher feeds an event router which categorizes paths and
//! forwards them to a dedicated worker thread per category. Within a
//! category, changes are handled strictly in order (a second change waits
//! for the running handler); across categories, handlers are independent.
//!
//! ```text
//! ┌──────────┐   ┌─────────────┐   ┌────────────────────────────────┐
//! │ notify   │──▶│ route_events│──▶│ scripts   (debounce, 150ms)    │
//! │ events   │   │ (categorize)│   │ templates (queued, immediate)  │
//! └──────────┘   └─────────────┘   │ styles    (queued)             │
//!                                  │ images    (queued, add/remove) │
//!                                  │ config    (reload + full build)│
//!                                  └────────────────────────────────┘
//! ```
//!
//! Script bursts are debounced with *drop* semantics: only the last event of
//! a burst triggers a rebuild. Template changes queue without dropping -
//! every saved change renders. The two pumps stay separate.

use crate::compile::{Toolchain, assets};
use crate::config::{
    CONFIG_FILE, DEPLOY_FILE, IMAGE_EXTENSIONS, PAGES_FILE, Workspace, cfg, handle,
    normalize_path,
};
use crate::deploy::{self, RemoteTransport};
use crate::reload::{LiveReload, ReloadScope};
use crate::state::PipelineState;
use crate::{build, log, logger, vlog};
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        mpsc::{self, Receiver, RecvTimeoutError, Sender},
    },
    thread,
    time::{Duration, Instant},
};

/// Script change coalescing window.
const SCRIPT_DEBOUNCE: Duration = Duration::from_millis(150);

/// Receive timeout while a debounce pump has nothing pending.
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

// =============================================================================
// Change events
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

#[derive(Debug, Clone)]
pub struct Change {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// Watched file category; determines the rebuild strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCategory {
    Scripts,
    Templates,
    Styles,
    Images,
    Config,
}

// =============================================================================
// Path classification
// =============================================================================

/// Check if path is a temp/backup file (editor artifacts).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

/// Categorize a changed path, or `None` when it is not watched.
fn categorize(path: &Path, workspace: &Workspace) -> Option<FileCategory> {
    if is_temp_file(path) {
        return None;
    }

    let path = normalize_path(path);
    let name = path.file_name()?.to_str()?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    // Only the root documents count as config; same-named files elsewhere
    // are ordinary sources.
    if (name == CONFIG_FILE || name == PAGES_FILE || name == DEPLOY_FILE)
        && path.parent() == Some(workspace.root.as_path())
    {
        return Some(FileCategory::Config);
    }

    if path.starts_with(workspace.images_dir()) {
        return IMAGE_EXTENSIONS
            .contains(&ext.to_ascii_lowercase().as_str())
            .then_some(FileCategory::Images);
    }

    if path.starts_with(workspace.scripts_dir()) && ext == "js" {
        return Some(FileCategory::Scripts);
    }

    if ext == workspace.build.tools.template_ext && path.starts_with(workspace.root.join("src")) {
        return Some(FileCategory::Templates);
    }

    if path.starts_with(workspace.components_dir())
        && (ext == workspace.build.tools.style_ext || ext == "scss")
    {
        return Some(FileCategory::Styles);
    }

    None
}

const fn change_kind(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Created),
        EventKind::Modify(_) => Some(ChangeKind::Modified),
        EventKind::Remove(_) => Some(ChangeKind::Removed),
        _ => None,
    }
}

// =============================================================================
// Worker pumps
// =============================================================================

/// Debounce-with-drop: a burst of changes collapses into one handler call
/// for the *last* change, fired once the window stays quiet. Superseded
/// changes are dropped, never queued.
pub fn debounce_pump(rx: Receiver<Change>, window: Duration, mut handle: impl FnMut(Change)) {
    let mut pending: Option<Change> = None;

    loop {
        let timeout = if pending.is_some() { window } else { IDLE_TIMEOUT };
        match rx.recv_timeout(timeout) {
            Ok(change) => pending = Some(change),
            Err(RecvTimeoutError::Timeout) => {
                if let Some(change) = pending.take() {
                    handle(change);
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// Queue-without-drop: every change runs, strictly in arrival order.
pub fn queue_pump(rx: Receiver<Change>, mut handle: impl FnMut(Change)) {
    for change in rx {
        handle(change);
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Everything a change handler needs; cheap to clone into worker threads.
#[derive(Clone)]
struct HandlerContext {
    state: &'static PipelineState,
    toolchain: &'static Toolchain,
    transport: &'static dyn RemoteTransport,
    reloader: Option<Arc<LiveReload>>,
}

impl HandlerContext {
    fn send_reload(&self, scope: ReloadScope) {
        if let Some(reloader) = &self.reloader {
            reloader.reload(scope);
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// One line per failure; the chain only in verbose mode.
fn report_error(error: &anyhow::Error) {
    if logger::verbose() {
        log!("error"; "{error:#}");
    } else {
        log!("error"; "{error}");
    }
}

fn on_script_change(ctx: &HandlerContext, change: Change) {
    if change.kind == ChangeKind::Removed {
        return;
    }

    let workspace = cfg();
    let name = file_name(&change.path);
    let started = Instant::now();

    match build::rebuild_scripts(ctx.state, ctx.toolchain, &workspace) {
        Ok(()) => {
            log!("watch"; "script changed: {name} ({}ms)", started.elapsed().as_millis());
            ctx.send_reload(ReloadScope::Js);
            deploy::auto_deploy(ctx.state, ctx.transport, &workspace, "scripts");
        }
        Err(e) => {
            // no reload and no deploy for a broken bundle
            log!("watch"; "script changed: {name} - failed ({}ms)", started.elapsed().as_millis());
            report_error(&e);
        }
    }
}

fn on_template_change(ctx: &HandlerContext, change: Change) {
    if change.kind == ChangeKind::Removed {
        return;
    }

    let workspace = cfg();
    let name = file_name(&change.path);
    let started = Instant::now();

    match build::rebuild_templates(ctx.state, ctx.toolchain, &workspace) {
        Ok(()) => {
            log!("watch"; "template changed: {name} ({}ms)", started.elapsed().as_millis());
            ctx.send_reload(ReloadScope::All);
            deploy::auto_deploy(ctx.state, ctx.transport, &workspace, "styles");
        }
        Err(e) => {
            log!("watch"; "template changed: {name} - failed ({}ms)", started.elapsed().as_millis());
            report_error(&e);
        }
    }
}

fn on_style_change(ctx: &HandlerContext, change: Change) {
    if change.kind == ChangeKind::Removed {
        return;
    }

    let workspace = cfg();
    let name = file_name(&change.path);
    let started = Instant::now();

    match build::rebuild_styles(ctx.state, ctx.toolchain, &workspace) {
        Ok(()) => {
            log!("watch"; "style changed: {name} ({}ms)", started.elapsed().as_millis());
            ctx.send_reload(ReloadScope::Css);
            deploy::auto_deploy(ctx.state, ctx.transport, &workspace, "styles");
        }
        Err(e) => {
            log!("watch"; "style changed: {name} - failed ({}ms)", started.elapsed().as_millis());
            report_error(&e);
        }
    }
}

/// Modify refreshes the whole image tree; add and remove touch only the one
/// mirrored output file.
fn on_image_change(ctx: &HandlerContext, change: Change) {
    let workspace = cfg();
    let name = file_name(&change.path);

    let result = match change.kind {
        ChangeKind::Created => assets::copy_single_image(&workspace, &change.path),
        ChangeKind::Removed => assets::remove_image_output(&workspace, &change.path),
        ChangeKind::Modified => assets::clean_images(&workspace)
            .and_then(|()| assets::copy_images(&workspace).map(|_| ())),
    };

    match result {
        Ok(()) => {
            vlog!("watch"; "image {}: {name}", verb(change.kind));
            ctx.send_reload(ReloadScope::All);
        }
        Err(e) => report_error(&e),
    }
}

const fn verb(kind: ChangeKind) -> &'static str {
    match kind {
        ChangeKind::Created => "added",
        ChangeKind::Modified => "changed",
        ChangeKind::Removed => "removed",
    }
}

fn on_config_change(ctx: &HandlerContext, change: Change) {
    if change.kind == ChangeKind::Removed {
        return;
    }

    match handle::reload_documents() {
        Ok(false) => {} // content unchanged, e.g. editor touch
        Ok(true) => {
            log!("watch"; "config changed: {}, rebuilding...", file_name(&change.path));
            let workspace = cfg();
            match build::run_build(ctx.state, ctx.toolchain, &workspace) {
                Ok(report) => {
                    build::log_report(ctx.state, &report);
                    ctx.send_reload(ReloadScope::All);
                }
                Err(e) => report_error(&e),
            }
        }
        Err(e) => {
            log!("error"; "config reload failed, keeping previous config: {e:#}");
        }
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

struct CategoryChannels {
    scripts: Sender<Change>,
    templates: Sender<Change>,
    styles: Sender<Change>,
    images: Sender<Change>,
    config: Sender<Change>,
}

fn spawn_workers(ctx: &HandlerContext) -> CategoryChannels {
    let (scripts, scripts_rx) = mpsc::channel();
    let (templates, templates_rx) = mpsc::channel();
    let (styles, styles_rx) = mpsc::channel();
    let (images, images_rx) = mpsc::channel();
    let (config, config_rx) = mpsc::channel();

    {
        let ctx = ctx.clone();
        thread::spawn(move || {
            debounce_pump(scripts_rx, SCRIPT_DEBOUNCE, move |c| on_script_change(&ctx, c));
        });
    }
    {
        let ctx = ctx.clone();
        thread::spawn(move || queue_pump(templates_rx, move |c| on_template_change(&ctx, c)));
    }
    {
        let ctx = ctx.clone();
        thread::spawn(move || queue_pump(styles_rx, move |c| on_style_change(&ctx, c)));
    }
    {
        let ctx = ctx.clone();
        thread::spawn(move || queue_pump(images_rx, move |c| on_image_change(&ctx, c)));
    }
    {
        let ctx = ctx.clone();
        thread::spawn(move || queue_pump(config_rx, move |c| on_config_change(&ctx, c)));
    }

    CategoryChannels {
        scripts,
        templates,
        styles,
        images,
        config,
    }
}

fn route_events(
    rx: Receiver<notify::Result<Event>>,
    state: &'static PipelineState,
    channels: CategoryChannels,
) {
    for event in rx {
        if state.shutdown.is_shutting_down() {
            break;
        }

        let event = match event {
            Ok(event) => event,
            Err(e) => {
                log!("watch"; "error: {e}");
                continue;
            }
        };

        let Some(kind) = change_kind(&event.kind) else {
            continue;
        };

        let workspace = cfg();
        for path in event.paths {
            let Some(category) = categorize(&path, &workspace) else {
                continue;
            };
            let change = Change { path, kind };
            // a worker that died takes its category with it; nothing to do
            let _ = match category {
                FileCategory::Scripts => channels.scripts.send(change),
                FileCategory::Templates => channels.templates.send(change),
                FileCategory::Styles => channels.styles.send(change),
                FileCategory::Images => channels.images.send(change),
                FileCategory::Config => channels.config.send(change),
            };
        }
    }
}

/// Keeps the underlying watcher alive; dropping it stops all watching.
pub struct WatcherHandle {
    _watcher: notify::RecommendedWatcher,
}

/// Start watching the project. Returns a handle that must be kept alive for
/// the duration of serve mode.
pub fn start(
    state: &'static PipelineState,
    toolchain: &'static Toolchain,
    transport: &'static dyn RemoteTransport,
    reloader: Option<Arc<LiveReload>>,
) -> Result<WatcherHandle> {
    let workspace = cfg();

    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(tx).context("failed to create file watcher")?;

    let src = workspace.root.join("src");
    if src.exists() {
        watcher
            .watch(&src, RecursiveMode::Recursive)
            .with_context(|| format!("failed to watch {}", src.display()))?;
    }
    // root itself, non-recursive: picks up the config documents
    watcher
        .watch(&workspace.root, RecursiveMode::NonRecursive)
        .with_context(|| format!("failed to watch {}", workspace.root.display()))?;

    let ctx = HandlerContext {
        state,
        toolchain,
        transport,
        reloader,
    };
    let channels = spawn_workers(&ctx);
    thread::spawn(move || route_events(rx, state, channels));

    log!("watch"; "monitoring src/ and config documents");
    Ok(WatcherHandle { _watcher: watcher })
}

// =============================================================================
// Tests
// =============================================================================
