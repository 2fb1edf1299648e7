//! `config.json` - general build configuration.
//!
//! Lists the ordered source files for the core bundles, the font globs and
//! the minification switch, plus the external tool commands used to render
//! templates and compile styles and scripts.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `config.json` - build pipeline configuration.
///
/// # Example
/// ```json
/// {
///   "js": ["plugins/swiper.js", "src/js/vendor.js"],
///   "css": ["plugins/swiper.css"],
///   "font": ["src/assets/fonts/**"],
///   "minify": false
/// }
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Ordered script sources concatenated into the core bundle.
    #[serde(rename = "js")]
    pub scripts: Vec<PathBuf>,

    /// Ordered style sources imported into the core stylesheet.
    #[serde(rename = "css")]
    pub styles: Vec<PathBuf>,

    /// Font directory globs (`dir/**` form), copied into `dist/fonts`.
    #[serde(rename = "font")]
    pub fonts: Vec<String>,

    /// Minify bundle output (production mode).
    #[serde(default = "defaults::r#false")]
    #[educe(Default = defaults::r#false())]
    pub minify: bool,

    /// External tool commands.
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// `"tools"` object in config.json - external collaborator commands.
///
/// Each command is an argv prefix; extra arguments are appended per task.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct ToolsConfig {
    /// Template renderer command (reads a source file, writes HTML to stdout).
    #[serde(default = "defaults::build::tools::render")]
    #[educe(Default = defaults::build::tools::render())]
    pub render: Vec<String>,

    /// Style compiler command (reads an import list on stdin, writes CSS to stdout).
    #[serde(default = "defaults::build::tools::style")]
    #[educe(Default = defaults::build::tools::style())]
    pub style: Vec<String>,

    /// Script bundler/minifier command.
    #[serde(default = "defaults::build::tools::script")]
    #[educe(Default = defaults::build::tools::script())]
    pub script: Vec<String>,

    /// Template file extension watched and rendered.
    #[serde(default = "defaults::build::tools::template_ext")]
    #[educe(Default = defaults::build::tools::template_ext())]
    pub template_ext: String,

    /// Style file extension watched and compiled.
    #[serde(default = "defaults::build::tools::style_ext")]
    #[educe(Default = defaults::build::tools::style_ext())]
    pub style_ext: String,
}
