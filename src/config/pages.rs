//! `pages.json` - page enablement manifest.
//!
//! Drives which templates are rendered to HTML. With `all` set (or an empty
//! list) every non-partial template in the pages directory is rendered;
//! otherwise only entries flagged `enabled`.

use serde::{Deserialize, Serialize};

/// `pages.json` - which pages get rendered.
///
/// # Example
/// ```json
/// {
///   "all": false,
///   "pages": [
///     { "enabled": true, "src": "index.pug" },
///     { "enabled": false, "src": "about.pug" }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PagesManifest {
    /// Render every non-partial template, ignoring the list.
    pub all: bool,

    /// Per-page enablement entries, in manifest order.
    pub pages: Vec<PageEntry>,
}

/// One entry in the pages manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PageEntry {
    pub enabled: bool,

    /// Template file name relative to the pages directory.
    pub src: String,
}

impl PagesManifest {
    /// True when the manifest asks for every page to be rendered.
    pub fn render_all(&self) -> bool {
        self.all || self.pages.is_empty()
    }

    /// File names of enabled pages, in manifest order.
    pub fn enabled(&self) -> impl Iterator<Item = &str> {
        self.pages
            .iter()
            .filter(|p| p.enabled)
            .map(|p| p.src.as_str())
    }

    /// True when `src` already has an entry (enabled or not).
    pub fn contains(&self, src: &str) -> bool {
        self.pages.iter().any(|p| p.src == src)
    }
}
