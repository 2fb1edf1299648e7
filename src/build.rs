//! Build orchestration.
//!
//! Sequences the compiler adapters into one atomic build:
//!
//! ```text
//! run_build()
//!     │
//!     ├── clean output directory (remove + recreate skeleton)
//!     ├── copy images ─┬─ copy fonts ─┬─ copy favicon     (concurrent)
//!     ├── core scripts ─┴─ core styles                    (concurrent)
//!     ├── render templates          (per-file recoverable)
//!     ├── main styles               (after templates: class scanning)
//!     └── main scripts
//! ```
//!
//! Every task runs under a timer that records into [`BuildStats`] even when
//! the task fails; time-to-failure is diagnostic data. A style or script
//! failure clears the matching bundle health flag and aborts the remaining
//! sequence. Whole builds are serialized by the pipeline build lock so two
//! clean phases can never overlap.

use crate::compile::{Toolchain, assets, scripts, styles, templates};
use crate::config::{OUTPUT_SKELETON, Workspace};
use crate::state::{AssetType, BuildStats, PipelineState};
use crate::{log, logger, vlog};
use anyhow::{Context, Result};
use std::{
    fs,
    time::{Duration, Instant},
};

/// Outcome of one completed build.
#[derive(Debug, Clone, Copy)]
pub struct BuildReport {
    pub duration: Duration,
    pub build_number: u64,
}

// ============================================================================
// Entry Points
// ============================================================================

/// Run one full build. Serialized against other builds via the build lock.
pub fn run_build(
    state: &PipelineState,
    toolchain: &Toolchain,
    workspace: &Workspace,
) -> Result<BuildReport> {
    let _guard = state.build_lock.lock();

    let build_number = state.stats.begin();
    if build_number == 1 {
        log!("build"; "starting (mode: {})", mode_name(workspace));
    } else {
        vlog!("build"; "rebuilding...");
    }

    let result = run_sequence(state, toolchain, workspace);
    let duration = state.stats.finish(result.is_ok());

    result.map(|()| BuildReport {
        duration,
        build_number,
    })
}

/// Asset-only build: clean, static assets and core bundles. No templates,
/// no main bundles.
pub fn run_core(
    state: &PipelineState,
    toolchain: &Toolchain,
    workspace: &Workspace,
) -> Result<BuildReport> {
    let _guard = state.build_lock.lock();

    let build_number = state.stats.begin();
    log!("build"; "starting core build");

    let result = (|| -> Result<()> {
        timed(&state.stats, "clean", || clean_output(workspace))?;
        copy_static_assets(state, workspace)?;
        build_core_bundles(state, toolchain, workspace)
    })();
    let duration = state.stats.finish(result.is_ok());

    result.map(|()| BuildReport {
        duration,
        build_number,
    })
}

// ============================================================================
// Watched subset rebuilds
// ============================================================================
//
// No clean phase and no stats recording (the watch handler reports elapsed
// time itself), but the same flag discipline, and the per-asset-type output
// lock so an overlapping deploy never reads a half-written bundle.

/// Rebuild the main script bundle (script file changed).
pub fn rebuild_scripts(
    state: &PipelineState,
    toolchain: &Toolchain,
    workspace: &Workspace,
) -> Result<()> {
    let _build = state.build_lock.lock();
    let _output = state.output_locks.scripts.lock();
    guarded(state, AssetType::Scripts, || {
        scripts::build_main(workspace, toolchain)
    })
}

/// Rebuild the main stylesheet (style file changed).
pub fn rebuild_styles(
    state: &PipelineState,
    toolchain: &Toolchain,
    workspace: &Workspace,
) -> Result<()> {
    let _build = state.build_lock.lock();
    let _output = state.output_locks.styles.lock();
    guarded(state, AssetType::Styles, || {
        styles::build_main(workspace, toolchain)
    })
}

/// Re-render templates, then rebuild the main stylesheet (template changed;
/// generated class names may have moved).
pub fn rebuild_templates(
    state: &PipelineState,
    toolchain: &Toolchain,
    workspace: &Workspace,
) -> Result<()> {
    let _build = state.build_lock.lock();
    templates::render_pages(workspace, toolchain)?;

    let _output = state.output_locks.styles.lock();
    guarded(state, AssetType::Styles, || {
        styles::build_main(workspace, toolchain)
    })
}

// ============================================================================
// Build Sequence
// ============================================================================

fn run_sequence(
    state: &PipelineState,
    toolchain: &Toolchain,
    workspace: &Workspace,
) -> Result<()> {
    timed(&state.stats, "clean", || clean_output(workspace))?;
    copy_static_assets(state, workspace)?;
    build_core_bundles(state, toolchain, workspace)?;

    timed(&state.stats, "templates", || {
        templates::render_pages(workspace, toolchain).map(|_| ())
    })?;

    guarded(state, AssetType::Styles, || {
        timed(&state.stats, "main styles", || {
            styles::build_main(workspace, toolchain)
        })
    })?;

    guarded(state, AssetType::Scripts, || {
        timed(&state.stats, "main scripts", || {
            scripts::build_main(workspace, toolchain)
        })
    })?;

    Ok(())
}

/// Remove the output directory and recreate its fixed skeleton.
fn clean_output(workspace: &Workspace) -> Result<()> {
    let output = workspace.output();
    if output.exists() {
        fs::remove_dir_all(&output)
            .with_context(|| format!("failed to clear {}", output.display()))?;
    }
    for dir in OUTPUT_SKELETON {
        fs::create_dir_all(output.join(dir))?;
    }
    Ok(())
}

/// Images, fonts and favicon own disjoint output subtrees, so they copy
/// concurrently.
fn copy_static_assets(state: &PipelineState, workspace: &Workspace) -> Result<()> {
    let (images, rest) = rayon::join(
        || {
            timed(&state.stats, "copy images", || {
                assets::copy_images(workspace).map(|_| ())
            })
        },
        || {
            rayon::join(
                || {
                    timed(&state.stats, "copy fonts", || {
                        assets::copy_fonts(workspace).map(|_| ())
                    })
                },
                || timed(&state.stats, "copy favicon", || assets::copy_favicon(workspace)),
            )
        },
    );

    images?;
    let (fonts, favicon) = rest;
    fonts?;
    favicon
}

/// Core bundles write to independent files, so they compile concurrently.
fn build_core_bundles(
    state: &PipelineState,
    toolchain: &Toolchain,
    workspace: &Workspace,
) -> Result<()> {
    let (core_scripts, core_styles) = rayon::join(
        || {
            guarded(state, AssetType::Scripts, || {
                timed(&state.stats, "core scripts", || {
                    scripts::build_core(workspace, toolchain)
                })
            })
        },
        || {
            guarded(state, AssetType::Styles, || {
                timed(&state.stats, "core styles", || {
                    styles::build_core(workspace, toolchain)
                })
            })
        },
    );

    core_scripts?;
    core_styles
}

// ============================================================================
// Task wrappers
// ============================================================================

/// Run a task under a timer. The duration is recorded even when the task
/// fails, before the error propagates.
fn timed<T>(
    stats: &BuildStats,
    name: &'static str,
    task: impl FnOnce() -> Result<T>,
) -> Result<T> {
    let started = Instant::now();
    let result = task();
    stats.record(name, started.elapsed());
    result
}

/// Run a compile task that owns a bundle health flag: success sets it,
/// failure clears it before the error propagates.
fn guarded<T>(
    state: &PipelineState,
    asset: AssetType,
    task: impl FnOnce() -> Result<T>,
) -> Result<T> {
    match task() {
        Ok(value) => {
            state.bundles.set(asset, true);
            Ok(value)
        }
        Err(e) => {
            state.bundles.set(asset, false);
            Err(e)
        }
    }
}

const fn mode_name(workspace: &Workspace) -> &'static str {
    if workspace.build.minify {
        "production"
    } else {
        "development"
    }
}

// ============================================================================
// Reporting
// ============================================================================

/// Log the finished build: a one-liner normally, per-task timings on the
/// first build or in verbose mode.
pub fn log_report(state: &PipelineState, report: &BuildReport) {
    let millis = report.duration.as_millis();

    if !logger::verbose() && report.build_number > 1 {
        log!("build"; "ready ({millis}ms)");
        return;
    }

    let finished = chrono::Local::now().format("%H:%M:%S");
    log!("build"; "done in {millis}ms, finished {finished}");

    let mut tasks = state.stats.tasks();
    tasks.sort_by(|a, b| b.1.cmp(&a.1));

    let total = report.duration.as_millis().max(1) as f64;
    for (name, duration) in tasks {
        let task_millis = duration.as_millis();
        let percent = task_millis as f64 / total * 100.0;
        log!("build"; "  {name:<14} {task_millis}ms ({percent:.1}%)");
    }
}

// ============================================================================
// Tests
// ============================================================================
