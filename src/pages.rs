//! `pages` subcommand: sync the manifest with the templates on disk.
//!
//! New template files get a disabled entry appended to `pages.json`;
//! existing entries are left untouched so hand-edited flags survive.

use crate::config::{PageEntry, Workspace};
use crate::log;
use anyhow::{Context, Result};
use std::fs;

/// Add manifest entries for templates missing from `pages.json`.
///
/// Returns how many entries were added.
pub fn sync_manifest(workspace: &Workspace) -> Result<usize> {
    let pages_dir = workspace.pages_dir();
    let ext = workspace.build.tools.template_ext.as_str();

    let mut names: Vec<String> = fs::read_dir(&pages_dir)
        .with_context(|| format!("failed to read {}", pages_dir.display()))?
        .filter_map(Result::ok)
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| {
            !name.starts_with('_') && name.rsplit_once('.').is_some_and(|(_, e)| e == ext)
        })
        .collect();
    names.sort();

    let mut manifest = workspace.pages.clone();
    let mut added = 0;

    for name in names {
        if !manifest.contains(&name) {
            manifest.pages.push(PageEntry {
                enabled: false,
                src: name,
            });
            added += 1;
        }
    }

    if added > 0 {
        let json = serde_json::to_string_pretty(&manifest)?;
        fs::write(workspace.pages_path(), json + "\n")
            .with_context(|| format!("failed to write {}", workspace.pages_path().display()))?;
        log!("pages"; "added {added} new page(s) to pages.json");
    } else {
        log!("pages"; "pages.json is up to date");
    }

    Ok(added)
}
