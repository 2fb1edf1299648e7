//! Template rendering.
//!
//! Renders enabled pages to `dist/<name>.html`. A failing page logs one
//! line and the rest keep rendering; template errors are per-file, unlike
//! style and script failures which abort the build.

use super::toolchain::{PageContext, Toolchain};
use crate::config::Workspace;
use crate::{log, vlog};
use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Render all enabled templates. Returns the number rendered successfully.
pub fn render_pages(workspace: &Workspace, toolchain: &Toolchain) -> Result<usize> {
    let pages = resolve_pages(workspace)?;
    let mut rendered = 0;

    for page in &pages {
        match render_one(workspace, toolchain, page) {
            Ok(name) => {
                rendered += 1;
                vlog!("build"; "rendered {name}");
            }
            Err(e) => log!("error"; "{e:#}"),
        }
    }

    vlog!("build"; "rendered {rendered}/{} pages", pages.len());
    Ok(rendered)
}

/// Resolve the template files to render from the pages manifest.
///
/// `all` (or an empty list) renders every non-partial template in the pages
/// directory; otherwise only enabled entries that exist on disk.
pub fn resolve_pages(workspace: &Workspace) -> Result<Vec<PathBuf>> {
    let pages_dir = workspace.pages_dir();
    let ext = workspace.build.tools.template_ext.as_str();

    if workspace.pages.render_all() {
        let mut found: Vec<PathBuf> = fs::read_dir(&pages_dir)
            .with_context(|| format!("failed to read {}", pages_dir.display()))?
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| is_page_template(p, ext))
            .collect();
        found.sort();
        return Ok(found);
    }

    Ok(workspace
        .pages
        .enabled()
        .map(|src| pages_dir.join(src))
        .filter(|p| p.exists())
        .collect())
}

/// A renderable page: right extension, not a `_`-prefixed partial.
fn is_page_template(path: &Path, ext: &str) -> bool {
    let matches_ext = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e == ext);
    let is_partial = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('_'));

    matches_ext && !is_partial
}

fn render_one(workspace: &Workspace, toolchain: &Toolchain, page: &Path) -> Result<String> {
    let stem = page
        .file_stem()
        .and_then(|s| s.to_str())
        .context("template file has no valid stem")?;

    let context = PageContext {
        page_title: title_from_stem(stem),
        body_class: format!("page-{stem}"),
    };

    let html = toolchain.renderer.render(page, &context)?;

    let out = workspace.output().join(format!("{stem}.html"));
    fs::write(&out, html).with_context(|| format!("failed to write {}", out.display()))?;

    Ok(format!("{stem}.html"))
}

/// `landing-page` -> `Landing Page`
fn title_from_stem(stem: &str) -> String {
    stem.split(['-', '_'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
