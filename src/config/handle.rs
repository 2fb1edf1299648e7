//! Global workspace handle with atomic reload support.
//!
//! Uses `arc-swap` for lock-free reads and atomic replacement, enabling
//! hot-reload of `config.json`/`pages.json` during watch mode. Holders never
//! keep a stale reference for long: every component re-reads via [`cfg`] at
//! the start of each operation and observes the latest documents.

use super::{CONFIG_FILE, DEPLOY_FILE, PAGES_FILE, Workspace};
use crate::utils::hash;
use arc_swap::ArcSwap;
use std::{
    fs,
    sync::{
        Arc, LazyLock,
        atomic::{AtomicU64, Ordering},
    },
};

/// Global workspace storage with atomic replacement support.
static WORKSPACE: LazyLock<ArcSwap<Workspace>> =
    LazyLock::new(|| ArcSwap::from_pointee(Workspace::default()));

/// Hash of the last-loaded `config.json` + `pages.json` content.
static CONTENT_HASH: AtomicU64 = AtomicU64::new(0);

/// Get the current workspace as `Arc<Workspace>`.
///
/// Lock-free read; the `Arc` auto-derefs to `&Workspace`.
#[inline]
pub fn cfg() -> Arc<Workspace> {
    WORKSPACE.load_full()
}

/// Initialize the global workspace (called once at startup).
pub fn init(workspace: Workspace) {
    CONTENT_HASH.store(document_hash(&workspace).unwrap_or(0), Ordering::Relaxed);
    WORKSPACE.store(Arc::new(workspace));
}

/// Re-read the configuration documents, replacing the stored workspace.
///
/// Returns `false` when the document content is identical to the last load.
/// On a parse error the previous workspace stays in place and the error is
/// returned for the caller to report.
pub fn reload_documents() -> anyhow::Result<bool> {
    let current = cfg();

    let new_hash = document_hash(&current)?;
    if new_hash == CONTENT_HASH.load(Ordering::Relaxed) {
        return Ok(false);
    }

    let reloaded = Workspace::load(&current.root)?;

    WORKSPACE.store(Arc::new(reloaded));
    CONTENT_HASH.store(new_hash, Ordering::Relaxed);

    Ok(true)
}

/// Hash the raw content of the hot-reloadable documents. The deploy config
/// is optional; absence hashes as empty.
fn document_hash(workspace: &Workspace) -> anyhow::Result<u64> {
    let config = fs::read(workspace.root.join(CONFIG_FILE))?;
    let pages = fs::read(workspace.root.join(PAGES_FILE))?;
    let deploy = fs::read(workspace.root.join(DEPLOY_FILE)).unwrap_or_default();

    Ok(hash::compute(&config)
        ^ hash::compute(&pages).rotate_left(1)
        ^ hash::compute(&deploy).rotate_left(2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_hash_changes_with_content() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), r#"{"js": []}"#).unwrap();
        fs::write(dir.path().join(PAGES_FILE), r#"{"all": true}"#).unwrap();

        let ws = Workspace::load(dir.path()).unwrap();
        let first = document_hash(&ws).unwrap();

        fs::write(dir.path().join(CONFIG_FILE), r#"{"js": ["new.js"]}"#).unwrap();
        let second = document_hash(&ws).unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn test_document_hash_order_sensitive() {
        // Swapping the two documents' contents must not collide.
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "aaa").unwrap();
        fs::write(dir.path().join(PAGES_FILE), "bbb").unwrap();
        let ws = Workspace {
            root: dir.path().to_path_buf(),
            ..Workspace::default()
        };
        let first = document_hash(&ws).unwrap();

        fs::write(dir.path().join(CONFIG_FILE), "bbb").unwrap();
        fs::write(dir.path().join(PAGES_FILE), "aaa").unwrap();
        let second = document_hash(&ws).unwrap();

        assert_ne!(first, second);
    }
}
