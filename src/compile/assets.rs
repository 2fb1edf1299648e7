//! Static asset copying: images, fonts, favicon.
//!
//! Full copies mirror the source tree under `dist`. The watcher also needs
//! single-file operations for image add/remove events, which stay O(1) in
//! tree size.

use crate::config::{IMAGE_EXTENSIONS, Workspace};
use crate::utils::fsx;
use crate::vlog;
use anyhow::{Context, Result};
use std::{fs, path::Path};

/// Copy the whole image tree into `dist/img`, filtered by extension.
pub fn copy_images(workspace: &Workspace) -> Result<usize> {
    let copied = fsx::copy_tree_filtered(
        &workspace.images_dir(),
        &workspace.output().join("img"),
        Some(IMAGE_EXTENSIONS),
    )?;
    vlog!("build"; "copied {copied} images");
    Ok(copied)
}

/// Remove and recreate `dist/img` ahead of a full image re-copy.
pub fn clean_images(workspace: &Workspace) -> Result<()> {
    let img = workspace.output().join("img");
    if img.exists() {
        fs::remove_dir_all(&img)
            .with_context(|| format!("failed to clear {}", img.display()))?;
    }
    fs::create_dir_all(&img)?;
    Ok(())
}

/// Copy one added image, preserving its relative path under `dist/img`.
pub fn copy_single_image(workspace: &Workspace, source: &Path) -> Result<()> {
    if !is_image(source) {
        return Ok(());
    }

    let rel = source
        .strip_prefix(workspace.images_dir())
        .with_context(|| format!("{} is outside the image tree", source.display()))?;
    let dest = workspace.output().join("img").join(rel);

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(source, &dest)
        .with_context(|| format!("failed to copy {}", source.display()))?;

    vlog!("watch"; "copied: {}", rel.display());
    Ok(())
}

/// Delete the output file mirroring a removed source image.
pub fn remove_image_output(workspace: &Workspace, source: &Path) -> Result<()> {
    let rel = source
        .strip_prefix(workspace.images_dir())
        .with_context(|| format!("{} is outside the image tree", source.display()))?;
    let dest = workspace.output().join("img").join(rel);

    if dest.exists() {
        fs::remove_file(&dest)
            .with_context(|| format!("failed to remove {}", dest.display()))?;
        vlog!("watch"; "removed: {}", rel.display());
    }
    Ok(())
}

/// Copy each configured font directory into `dist/fonts`.
pub fn copy_fonts(workspace: &Workspace) -> Result<usize> {
    let dest = workspace.output().join("fonts");
    let mut copied = 0;

    for glob in &workspace.build.fonts {
        let dir = glob.trim_end_matches("/**").trim_end_matches("/*");
        copied += fsx::copy_tree(&workspace.root.join(dir), &dest)?;
    }

    vlog!("build"; "copied {copied} fonts");
    Ok(copied)
}

/// Copy the favicon when present.
pub fn copy_favicon(workspace: &Workspace) -> Result<()> {
    let favicon = workspace.favicon();
    if favicon.exists() {
        fs::copy(&favicon, workspace.output().join("favicon.ico"))
            .with_context(|| format!("failed to copy {}", favicon.display()))?;
    }
    Ok(())
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace() -> (tempfile::TempDir, Workspace) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/assets/img/icons")).unwrap();
        fs::create_dir_all(dir.path().join("dist/img")).unwrap();
        fs::create_dir_all(dir.path().join("dist/fonts")).unwrap();
        let ws = Workspace {
            root: dir.path().to_path_buf(),
            ..Workspace::default()
        };
        (dir, ws)
    }

    #[test]
    fn test_copy_images_filters_extensions() {
        let (_dir, ws) = workspace();
        fs::write(ws.images_dir().join("logo.svg"), "<svg/>").unwrap();
        fs::write(ws.images_dir().join("icons/pin.png"), "png").unwrap();
        fs::write(ws.images_dir().join("readme.md"), "skip").unwrap();

        let copied = copy_images(&ws).unwrap();

        assert_eq!(copied, 2);
        assert!(ws.output().join("img/logo.svg").exists());
        assert!(ws.output().join("img/icons/pin.png").exists());
        assert!(!ws.output().join("img/readme.md").exists());
    }

    #[test]
    fn test_single_image_copy_touches_only_one_output() {
        let (_dir, ws) = workspace();
        fs::write(ws.images_dir().join("old.png"), "old").unwrap();
        copy_images(&ws).unwrap();

        // a new file arrives
        let added = ws.images_dir().join("icons/logo.svg");
        fs::write(&added, "<svg/>").unwrap();
        copy_single_image(&ws, &added).unwrap();

        // exactly the mirrored file appears, the existing output is untouched
        assert!(ws.output().join("img/icons/logo.svg").exists());
        assert_eq!(
            fs::read_to_string(ws.output().join("img/old.png")).unwrap(),
            "old"
        );

        let count = walkdir::WalkDir::new(ws.output().join("img"))
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .count();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_single_image_copy_ignores_non_images() {
        let (_dir, ws) = workspace();
        let stray = ws.images_dir().join("notes.txt");
        fs::write(&stray, "text").unwrap();

        copy_single_image(&ws, &stray).unwrap();
        assert!(!ws.output().join("img/notes.txt").exists());
    }

    #[test]
    fn test_remove_image_output() {
        let (_dir, ws) = workspace();
        let source = ws.images_dir().join("gone.webp");
        fs::write(&source, "img").unwrap();
        copy_single_image(&ws, &source).unwrap();
        assert!(ws.output().join("img/gone.webp").exists());

        remove_image_output(&ws, &source).unwrap();
        assert!(!ws.output().join("img/gone.webp").exists());

        // removing again is a no-op
        remove_image_output(&ws, &source).unwrap();
    }

    #[test]
    fn test_clean_images_resets_output() {
        let (_dir, ws) = workspace();
        fs::write(ws.output().join("img/stale.png"), "stale").unwrap();

        clean_images(&ws).unwrap();

        assert!(ws.output().join("img").exists());
        assert!(!ws.output().join("img/stale.png").exists());
    }

    #[test]
    fn test_copy_fonts_from_globs() {
        let (_dir, mut ws) = workspace();
        fs::create_dir_all(ws.root.join("src/assets/fonts/inter")).unwrap();
        fs::write(ws.root.join("src/assets/fonts/inter/inter.woff2"), "font").unwrap();
        ws.build.fonts = vec!["src/assets/fonts/**".into()];

        let copied = copy_fonts(&ws).unwrap();

        assert_eq!(copied, 1);
        assert!(ws.output().join("fonts/inter/inter.woff2").exists());
    }

    #[test]
    fn test_copy_favicon_when_present() {
        let (_dir, ws) = workspace();
        copy_favicon(&ws).unwrap(); // absent: no-op
        assert!(!ws.output().join("favicon.ico").exists());

        fs::write(ws.favicon(), "icon").unwrap();
        copy_favicon(&ws).unwrap();
        assert!(ws.output().join("favicon.ico").exists());
    }
}
