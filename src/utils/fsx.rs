//! Filesystem helpers shared by the asset tasks and deployment.

use anyhow::{Context, Result};
use std::{fs, path::Path};
use walkdir::WalkDir;

/// Copy a directory tree, mirroring relative paths.
///
/// Returns the number of files copied. Missing source is a no-op.
pub fn copy_tree(src: &Path, dest: &Path) -> Result<usize> {
    copy_tree_filtered(src, dest, None)
}

/// Copy a directory tree keeping only files whose extension (lowercased)
/// appears in `extensions`. `None` copies everything.
pub fn copy_tree_filtered(
    src: &Path,
    dest: &Path,
    extensions: Option<&[&str]>,
) -> Result<usize> {
    if !src.exists() {
        return Ok(0);
    }

    let mut copied = 0;
    for entry in WalkDir::new(src).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if let Some(exts) = extensions {
            let matches = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| exts.contains(&e.to_ascii_lowercase().as_str()));
            if !matches {
                continue;
            }
        }

        let rel = path.strip_prefix(src).expect("walkdir stays under src");
        let target = dest.join(rel);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::copy(path, &target)
            .with_context(|| format!("failed to copy {}", path.display()))?;
        copied += 1;
    }

    Ok(copied)
}

/// Format a byte count for upload logs (`0 B`, `13.4 KB`, `2.0 MB`).
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 B".into();
    }

    let exp = (bytes.ilog2() / 10).min(UNITS.len() as u32 - 1) as usize;
    if exp == 0 {
        return format!("{bytes} B");
    }

    let value = bytes as f64 / 1024f64.powi(exp as i32);
    format!("{:.1} {}", value, UNITS[exp])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_tree_mirrors_structure() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        fs::create_dir_all(src.path().join("nested/deep")).unwrap();
        fs::write(src.path().join("top.txt"), "a").unwrap();
        fs::write(src.path().join("nested/deep/leaf.txt"), "b").unwrap();

        let copied = copy_tree(src.path(), dest.path()).unwrap();

        assert_eq!(copied, 2);
        assert_eq!(
            fs::read_to_string(dest.path().join("nested/deep/leaf.txt")).unwrap(),
            "b"
        );
    }

    #[test]
    fn test_copy_tree_filtered_by_extension() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        fs::write(src.path().join("logo.svg"), "<svg/>").unwrap();
        fs::write(src.path().join("notes.txt"), "skip me").unwrap();
        fs::write(src.path().join("photo.JPG"), "jpeg").unwrap();

        let copied = copy_tree_filtered(src.path(), dest.path(), Some(&["svg", "jpg"])).unwrap();

        assert_eq!(copied, 2);
        assert!(dest.path().join("logo.svg").exists());
        assert!(dest.path().join("photo.JPG").exists());
        assert!(!dest.path().join("notes.txt").exists());
    }

    #[test]
    fn test_copy_tree_missing_source_is_noop() {
        let dest = tempfile::tempdir().unwrap();
        let copied = copy_tree(Path::new("/no/such/dir"), dest.path()).unwrap();
        assert_eq!(copied, 0);
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1023), "1023 B");
        assert_eq!(format_file_size(1024), "1.0 KB");
        assert_eq!(format_file_size(13_700), "13.4 KB");
        assert_eq!(format_file_size(2 * 1024 * 1024), "2.0 MB");
    }
}
