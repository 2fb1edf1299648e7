//! Stylesheet tasks.
//!
//! The core stylesheet imports the configured vendor sources in order; the
//! main stylesheet compiles every component source under `src/components`.
//! Main styles run after template rendering so class scanning in the style
//! tool sees fresh HTML.

use super::toolchain::{StyleOutput, Toolchain};
use crate::config::Workspace;
use crate::vlog;
use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

pub const CORE_STYLESHEET: &str = "css/core.min.css";
pub const MAIN_STYLESHEET: &str = "css/main.min.css";

/// Build `dist/css/core.min.css` from the configured source list.
pub fn build_core(workspace: &Workspace, toolchain: &Toolchain) -> Result<()> {
    let sources: Vec<PathBuf> = workspace
        .build
        .styles
        .iter()
        .map(|s| workspace.root.join(s))
        .collect();

    let output = toolchain.styles.compile(&sources, workspace.build.minify)?;
    write_stylesheet(&workspace.output().join(CORE_STYLESHEET), output)?;

    vlog!("build"; "core stylesheet written: {CORE_STYLESHEET}");
    Ok(())
}

/// Build `dist/css/main.min.css` from the component sources.
pub fn build_main(workspace: &Workspace, toolchain: &Toolchain) -> Result<()> {
    let sources = collect_component_sources(workspace);

    let output = toolchain.styles.compile(&sources, workspace.build.minify)?;
    write_stylesheet(&workspace.output().join(MAIN_STYLESHEET), output)?;

    vlog!("build"; "main stylesheet written: {MAIN_STYLESHEET}");
    Ok(())
}

/// Collect style sources under `src/components`, sorted for a stable
/// compile order.
fn collect_component_sources(workspace: &Workspace) -> Vec<PathBuf> {
    let style_ext = workspace.build.tools.style_ext.as_str();

    let mut sources: Vec<PathBuf> = WalkDir::new(workspace.components_dir())
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e == style_ext || e == "scss")
        })
        .collect();

    sources.sort();
    sources
}

/// Write the stylesheet, its map file, and the map reference comment.
fn write_stylesheet(path: &Path, output: StyleOutput) -> Result<()> {
    let mut css = output.css;

    if output.source_map.is_some() {
        let map_name = format!(
            "{}.map",
            path.file_name().unwrap_or_default().to_string_lossy()
        );
        css.push_str(&format!("\n/*# sourceMappingURL={map_name} */"));
    }

    fs::write(path, css).with_context(|| format!("failed to write {}", path.display()))?;

    if let Some(map) = output.source_map {
        let map_path = path.with_file_name(format!(
            "{}.map",
            path.file_name().unwrap_or_default().to_string_lossy()
        ));
        fs::write(&map_path, map)
            .with_context(|| format!("failed to write {}", map_path.display()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::toolchain::fakes;

    fn workspace() -> (tempfile::TempDir, Workspace) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("dist/css")).unwrap();
        let ws = Workspace {
            root: dir.path().to_path_buf(),
            ..Workspace::default()
        };
        (dir, ws)
    }

    #[test]
    fn test_core_stylesheet_compiles_config_sources() {
        let (_dir, mut ws) = workspace();
        fs::write(ws.root.join("vendor.css"), ".vendor { color: red }").unwrap();
        ws.build.styles = vec![PathBuf::from("vendor.css")];

        build_core(&ws, &fakes::toolchain()).unwrap();

        let css = fs::read_to_string(ws.output().join(CORE_STYLESHEET)).unwrap();
        assert!(css.contains(".vendor"));
    }

    #[test]
    fn test_main_stylesheet_sources_sorted() {
        let (_dir, ws) = workspace();
        let components = ws.components_dir();
        fs::create_dir_all(components.join("zeta")).unwrap();
        fs::create_dir_all(components.join("alpha")).unwrap();
        fs::write(components.join("zeta/z.sass"), ".z { }").unwrap();
        fs::write(components.join("alpha/a.sass"), ".a { }").unwrap();
        fs::write(components.join("alpha/readme.txt"), "not a style").unwrap();

        let sources = collect_component_sources(&ws);

        assert_eq!(sources.len(), 2);
        assert!(sources[0].ends_with("alpha/a.sass"));
        assert!(sources[1].ends_with("zeta/z.sass"));
    }

    #[test]
    fn test_main_stylesheet_written() {
        let (_dir, ws) = workspace();
        let components = ws.components_dir();
        fs::create_dir_all(&components).unwrap();
        fs::write(components.join("base.sass"), ".base { margin: 0 }").unwrap();

        build_main(&ws, &fakes::toolchain()).unwrap();

        let css = fs::read_to_string(ws.output().join(MAIN_STYLESHEET)).unwrap();
        assert!(css.contains(".base"));
    }

    #[test]
    fn test_failing_compiler_propagates() {
        let (_dir, ws) = workspace();
        let mut toolchain = fakes::toolchain();
        toolchain.styles = Box::new(fakes::FailingStyles);

        let err = build_main(&ws, &toolchain).unwrap_err();
        assert!(err.to_string().contains("style compilation failed"));
    }

    #[test]
    fn test_source_map_reference_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.min.css");

        write_stylesheet(
            &path,
            StyleOutput {
                css: ".a { }".into(),
                source_map: Some("{\"version\":3}".into()),
            },
        )
        .unwrap();

        let css = fs::read_to_string(&path).unwrap();
        assert!(css.contains("/*# sourceMappingURL=main.min.css.map */"));
        assert!(dir.path().join("main.min.css.map").exists());
    }
}
