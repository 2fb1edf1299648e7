//! External collaborator seams.
//!
//! The template renderer, style compiler and script bundler are external
//! programs; the pipeline talks to them through these traits so the
//! orchestration logic never depends on a particular tool. Production
//! implementations run the commands configured in `config.json`; tests swap
//! in in-memory fakes.
//!
//! Command contracts:
//! - **render**: `cmd <source>` with `PAGE_TITLE`/`BODY_CLASS` env vars set,
//!   HTML on stdout.
//! - **style**: `cmd [--minify]` with an `@import` list on stdin, CSS on
//!   stdout.
//! - **script**: `cmd <entry> --bundle [--minify]` with code on stdout, or
//!   `cmd --minify` with code on stdin for plain minification.

use super::error::CompileError;
use crate::config::ToolsConfig;
use crate::utils::exec;
use std::path::{Path, PathBuf};

/// Context handed to the template renderer for each page.
#[derive(Debug, Clone)]
pub struct PageContext {
    pub page_title: String,
    pub body_class: String,
}

/// Style compiler result.
#[derive(Debug, Clone)]
pub struct StyleOutput {
    pub css: String,
    pub source_map: Option<String>,
}

/// Script bundler result.
#[derive(Debug, Clone)]
pub struct ScriptOutput {
    pub code: String,
    pub source_map: Option<String>,
}

// ============================================================================
// Traits
// ============================================================================

pub trait TemplateRenderer: Send + Sync {
    /// Render one template source file to an HTML string.
    fn render(&self, source: &Path, context: &PageContext) -> Result<String, CompileError>;
}

pub trait StyleCompiler: Send + Sync {
    /// Compile an ordered list of style sources into one stylesheet.
    fn compile(&self, sources: &[PathBuf], minify: bool) -> Result<StyleOutput, CompileError>;
}

pub trait ScriptBundler: Send + Sync {
    /// Bundle an entry file and its imports into one script.
    fn bundle(&self, entry: &Path, minify: bool) -> Result<ScriptOutput, CompileError>;

    /// Minify already-concatenated code without bundling or wrapping it.
    fn minify(&self, code: &str) -> Result<String, CompileError>;
}

/// The three collaborators bundled together, built once at startup.
pub struct Toolchain {
    pub renderer: Box<dyn TemplateRenderer>,
    pub styles: Box<dyn StyleCompiler>,
    pub scripts: Box<dyn ScriptBundler>,
}

impl Toolchain {
    /// Command-backed toolchain from the `tools` section of config.json.
    pub fn from_config(root: &Path, tools: &ToolsConfig) -> Self {
        Self {
            renderer: Box::new(CommandRenderer {
                root: root.to_path_buf(),
                command: tools.render.clone(),
            }),
            styles: Box::new(CommandStyleCompiler {
                root: root.to_path_buf(),
                command: tools.style.clone(),
            }),
            scripts: Box::new(CommandBundler {
                root: root.to_path_buf(),
                command: tools.script.clone(),
            }),
        }
    }
}

// ============================================================================
// Command-backed implementations
// ============================================================================

struct CommandRenderer {
    root: PathBuf,
    command: Vec<String>,
}

impl TemplateRenderer for CommandRenderer {
    fn render(&self, source: &Path, context: &PageContext) -> Result<String, CompileError> {
        let envs = [
            ("PAGE_TITLE", context.page_title.clone()),
            ("BODY_CLASS", context.body_class.clone()),
        ];

        exec::run(
            &self.root,
            &self.command,
            &[source.display().to_string()],
            &envs,
        )
        .map_err(|e| CompileError::Template {
            file: source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            detail: format!("{e:#}"),
        })
    }
}

struct CommandStyleCompiler {
    root: PathBuf,
    command: Vec<String>,
}

impl StyleCompiler for CommandStyleCompiler {
    fn compile(&self, sources: &[PathBuf], minify: bool) -> Result<StyleOutput, CompileError> {
        // Forward slashes keep the manifest portable across platforms.
        let manifest: String = sources
            .iter()
            .map(|p| format!("@import \"{}\";\n", p.display().to_string().replace('\\', "/")))
            .collect();

        let minify_arg = ["--minify".to_string()];
        let args: &[String] = if minify { &minify_arg } else { &[] };

        let css = exec::run_with_stdin(&self.root, &self.command, args, &[], &manifest)
            .map_err(|e| CompileError::Style {
                detail: format!("{e:#}"),
            })?;

        Ok(StyleOutput {
            css,
            source_map: None,
        })
    }
}

struct CommandBundler {
    root: PathBuf,
    command: Vec<String>,
}

impl ScriptBundler for CommandBundler {
    fn bundle(&self, entry: &Path, minify: bool) -> Result<ScriptOutput, CompileError> {
        let mut args = vec![entry.display().to_string(), "--bundle".to_string()];
        if minify {
            args.push("--minify".to_string());
        }

        let code = exec::run(&self.root, &self.command, &args, &[]).map_err(|e| {
            CompileError::Script {
                detail: format!("{e:#}"),
            }
        })?;

        Ok(ScriptOutput {
            code,
            source_map: None,
        })
    }

    fn minify(&self, code: &str) -> Result<String, CompileError> {
        exec::run_with_stdin(
            &self.root,
            &self.command,
            &["--minify".to_string()],
            &[],
            code,
        )
        .map_err(|e| CompileError::Script {
            detail: format!("{e:#}"),
        })
    }
}

// ============================================================================
// Test fakes (shared across the crate's test modules)
// ============================================================================


// ============================================================================
// Tests
// ============================================================================
