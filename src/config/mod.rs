//! Workspace configuration management.
//!
//! Three JSON documents, paths fixed by convention at the project root:
//!
//! | File              | Purpose                                 |
//! |-------------------|-----------------------------------------|
//! | `config.json`     | Bundle sources, fonts, minify, tools    |
//! | `pages.json`      | Page enablement manifest                |
//! | `config-ftp.json` | Deployment target (optional)            |
//!
//! Source and output directories are likewise fixed: `src/js`, `src/pages`,
//! `src/components`, `src/assets/img` in; `dist/{js,css,img,fonts}` out.

mod build;
pub mod defaults;
mod deploy;
mod error;
pub mod handle;
mod pages;

pub use build::{BuildConfig, ToolsConfig};
pub use deploy::{ConnectionConfig, DeployConfig, Mapping, Shortcut};
pub use error::ConfigError;
pub use handle::cfg;
pub use pages::{PageEntry, PagesManifest};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::{
    env, fs,
    path::{Path, PathBuf},
};

/// General build configuration document.
pub const CONFIG_FILE: &str = "config.json";
/// Page enablement manifest.
pub const PAGES_FILE: &str = "pages.json";
/// Optional deployment configuration.
pub const DEPLOY_FILE: &str = "config-ftp.json";

/// Output directory skeleton, recreated by every full build.
pub const OUTPUT_SKELETON: &[&str] = &["", "js", "css", "img", "fonts"];

/// Image extensions copied from the asset tree.
pub const IMAGE_EXTENSIONS: &[&str] = &["svg", "png", "jpg", "jpeg", "gif", "webp", "mp4"];

// ============================================================================
// Workspace
// ============================================================================

/// The loaded project: root path plus the three configuration documents.
///
/// Lives behind [`handle::cfg`] for the process lifetime; hot reload replaces
/// the stored value so holders observe updates on their next `cfg()` call.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    /// Absolute project root.
    pub root: PathBuf,

    /// `config.json`
    pub build: BuildConfig,

    /// `pages.json`
    pub pages: PagesManifest,

    /// `config-ftp.json`, absent when deployment is disabled.
    pub deploy: Option<DeployConfig>,
}

impl Workspace {
    /// Load all configuration documents from `root`.
    ///
    /// Missing or malformed `config.json`/`pages.json` is fatal; a missing
    /// `config-ftp.json` only disables deployment.
    pub fn load(root: &Path) -> Result<Self> {
        let root = normalize_path(root);

        let build = read_json(&root.join(CONFIG_FILE))?;
        let pages = read_json(&root.join(PAGES_FILE))?;

        let deploy_path = root.join(DEPLOY_FILE);
        let deploy = if deploy_path.exists() {
            Some(read_json(&deploy_path)?)
        } else {
            None
        };

        Ok(Self {
            root,
            build,
            pages,
            deploy,
        })
    }

    // ------------------------------------------------------------------
    // Path conventions
    // ------------------------------------------------------------------

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn pages_path(&self) -> PathBuf {
        self.root.join(PAGES_FILE)
    }

    /// Build output directory.
    pub fn output(&self) -> PathBuf {
        self.root.join("dist")
    }

    /// Watched script sources (main bundle inputs).
    pub fn scripts_dir(&self) -> PathBuf {
        self.root.join("src/js")
    }

    /// Main script bundle entry point.
    pub fn script_entry(&self) -> PathBuf {
        self.root.join("src/js/main.js")
    }

    /// Template sources rendered to HTML.
    pub fn pages_dir(&self) -> PathBuf {
        self.root.join("src/pages")
    }

    /// Style component sources (main stylesheet inputs).
    pub fn components_dir(&self) -> PathBuf {
        self.root.join("src/components")
    }

    /// Image asset tree, mirrored into `dist/img`.
    pub fn images_dir(&self) -> PathBuf {
        self.root.join("src/assets/img")
    }

    pub fn favicon(&self) -> PathBuf {
        self.root.join("src/assets/favicon.ico")
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    /// Check the configured external tool commands are installed.
    ///
    /// The script tool is only required when minification is on; plain
    /// concatenation needs no external help.
    pub fn validate(&self) -> Result<()> {
        check_command_installed("tools.render", &self.build.tools.render)?;
        check_command_installed("tools.style", &self.build.tools.style)?;

        if self.build.minify {
            check_command_installed("tools.script", &self.build.tools.script)?;
        }

        Ok(())
    }
}

/// Check if a command is installed and available
fn check_command_installed(field: &str, command: &[String]) -> Result<()> {
    let cmd = command.first().ok_or_else(|| {
        ConfigError::Validation(format!("{field} must have at least one element"))
    })?;

    which::which(cmd)
        .with_context(|| format!("`{cmd}` ({field}) not found. Please install it first."))?;

    Ok(())
}

/// Read and deserialize one JSON document.
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content =
        fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
    serde_json::from_str(&content).map_err(|err| ConfigError::Json(path.to_path_buf(), err))
}

/// Normalize a path to absolute, using canonicalize if the path exists
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        }
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn write_minimal_configs(root: &Path) {
        fs::write(root.join(CONFIG_FILE), r#"{"js": ["a.js"], "css": []}"#).unwrap();
        fs::write(root.join(PAGES_FILE), r#"{"all": true, "pages": []}"#).unwrap();
    }

    #[test]
    fn test_load_without_deploy_config() {
        let dir = tempfile::tempdir().unwrap();
        write_minimal_configs(dir.path());

        let ws = Workspace::load(dir.path()).unwrap();

        assert!(ws.deploy.is_none());
        assert_eq!(ws.build.scripts, vec![PathBuf::from("a.js")]);
        assert!(ws.pages.render_all());
        assert!(ws.root.is_absolute());
    }

    #[test]
    fn test_load_with_deploy_config() {
        let dir = tempfile::tempdir().unwrap();
        write_minimal_configs(dir.path());
        fs::write(
            dir.path().join(DEPLOY_FILE),
            r#"{
                "connection": { "host": "h", "user": "u", "password": "p" },
                "deployment": { "mappings": {} }
            }"#,
        )
        .unwrap();

        let ws = Workspace::load(dir.path()).unwrap();
        assert!(ws.deploy.is_some());
    }

    #[test]
    fn test_load_missing_config_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        // no config.json at all
        assert!(Workspace::load(dir.path()).is_err());
    }

    #[test]
    fn test_load_malformed_pages_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "{}").unwrap();
        fs::write(dir.path().join(PAGES_FILE), "{nope").unwrap();

        let err = Workspace::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("pages.json"));
    }

    #[test]
    fn test_path_conventions() {
        let ws = Workspace {
            root: PathBuf::from("/proj"),
            ..Workspace::default()
        };

        assert_eq!(ws.output(), PathBuf::from("/proj/dist"));
        assert_eq!(ws.scripts_dir(), PathBuf::from("/proj/src/js"));
        assert_eq!(ws.pages_dir(), PathBuf::from("/proj/src/pages"));
        assert_eq!(ws.images_dir(), PathBuf::from("/proj/src/assets/img"));
        assert_eq!(ws.config_path(), PathBuf::from("/proj/config.json"));
    }

    #[test]
    fn test_validate_requires_nonempty_command() {
        let mut ws = Workspace::default();
        ws.build.tools.render = vec![];
        assert!(ws.validate().is_err());
    }
}
