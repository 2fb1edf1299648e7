//! Script bundle tasks.
//!
//! Two bundles with different shapes:
//! - **core**: the configured vendor sources concatenated in order, each
//!   preceded by a path marker comment. No module wrapping is ever injected;
//!   minification (when on) runs over the finished concatenation.
//! - **main**: the site entry point bundled through the script tool.

use super::toolchain::Toolchain;
use crate::config::Workspace;
use crate::{log, vlog};
use anyhow::{Context, Result};
use std::fs;

pub const CORE_BUNDLE: &str = "js/core.min.js";
pub const MAIN_BUNDLE: &str = "js/main.min.js";

/// Concatenate the configured core sources, in config order.
///
/// Missing files are skipped with a warning rather than failing the build;
/// the config list routinely points at optional vendor drops.
pub fn concat_sources(workspace: &Workspace) -> Result<String> {
    let mut bundle = String::new();

    for source in &workspace.build.scripts {
        let path = workspace.root.join(source);
        if !path.exists() {
            log!("warn"; "skipping missing file: {}", source.display());
            continue;
        }

        let code = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        bundle.push_str(&format!("\n// === {} ===\n", source.display()));
        bundle.push_str(&code);
        bundle.push('\n');
    }

    Ok(bundle)
}

/// Build `dist/js/core.min.js` from the configured source list.
pub fn build_core(workspace: &Workspace, toolchain: &Toolchain) -> Result<()> {
    let concatenated = concat_sources(workspace)?;

    let code = if workspace.build.minify {
        toolchain.scripts.minify(&concatenated)?
    } else {
        concatenated
    };

    let out = workspace.output().join(CORE_BUNDLE);
    fs::write(&out, code).with_context(|| format!("failed to write {}", out.display()))?;

    vlog!("build"; "core script bundle written: {CORE_BUNDLE}");
    Ok(())
}

/// Build `dist/js/main.min.js` from the `src/js/main.js` entry.
pub fn build_main(workspace: &Workspace, toolchain: &Toolchain) -> Result<()> {
    let entry = workspace.script_entry();
    let output = toolchain.scripts.bundle(&entry, workspace.build.minify)?;

    let out = workspace.output().join(MAIN_BUNDLE);
    fs::write(&out, output.code)
        .with_context(|| format!("failed to write {}", out.display()))?;

    if let Some(map) = output.source_map {
        fs::write(workspace.output().join(format!("{MAIN_BUNDLE}.map")), map)?;
    }

    vlog!("build"; "main script bundle written: {MAIN_BUNDLE}");
    Ok(())
}
