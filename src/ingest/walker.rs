//! File discovery — walks the root and lists candidate source files.

use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tracing::debug;

/// List every regular file under `root`, in sorted order.
///
/// Directories named in `ignore_dirs` are never descended into. Hidden
/// files are included; `.gitignore` rules apply only when
/// `respect_gitignore` is set.
pub fn discover_files(root: &Path, ignore_dirs: &[String], respect_gitignore: bool) -> Vec<PathBuf> {
    let skip = ignore_dirs.to_vec();

    let files: Vec<PathBuf> = WalkBuilder::new(root)
        .standard_filters(false)
        .git_ignore(respect_gitignore)
        .require_git(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(move |entry| {
            let is_dir = entry.file_type().map_or(false, |ft| ft.is_dir());
            if entry.depth() == 0 || !is_dir {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            !skip.iter().any(|dir| *dir == name)
        })
        .build()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map_or(false, |ft| ft.is_file()))
        .map(|entry| entry.into_path())
        .collect();

    debug!(root = %root.display(), files = files.len(), "discovered files");
    files
}
