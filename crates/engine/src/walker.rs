//! Component A — File Walker.
//!
//! Directly generalizes `codescope-server/src/scan.rs`'s `walk_files_parallel`:
//! the same `ignore::WalkBuilder` + `build_parallel().run(...)` shape, the
//! same `filter_entry` early-skip of noisy directories, the same
//! strip-prefix + forward-slash-normalize handling for relative paths. Two
//! differences from the teacher: glob include/exclude (the teacher only has
//! a flat extension allow-list) via `globset`, and a stable sort by full
//! path before returning (spec.md §4.A "Policy") instead of leaving the
//! parallel walk's nondeterministic order in place.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use tracing::warn;

use crate::config::WalkerConfig;

fn build_globset(patterns: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        if let Ok(glob) = Glob::new(pattern) {
            builder.add(glob);
        } else {
            warn!(pattern = %pattern, "ignoring invalid glob pattern");
        }
    }
    builder.build().unwrap_or_else(|_| GlobSetBuilder::new().build().unwrap())
}

/// An enumerated candidate file (absolute + root-relative path).
#[derive(Debug, Clone)]
pub struct WalkedFile {
    pub abs_path: PathBuf,
    pub rel_path: String,
    pub ext: String,
}

/// Enumerate candidate files under `config.root`, honoring include/exclude
/// globs and the extension allow-list (spec.md §4.A contract). Safe to call
/// concurrently on disjoint roots (spec.md §4.A "Re-entrancy") since it opens
/// no shared mutable state beyond the per-call result buffer.
pub fn walk(config: &WalkerConfig) -> Vec<WalkedFile> {
    let include = build_globset(&config.include);
    let exclude = build_globset(&config.exclude);
    let has_include = !config.include.is_empty();

    let results: Mutex<Vec<WalkedFile>> = Mutex::new(Vec::new());
    let skip_dirs = config.skip_dirs.clone();
    let root = config.root.clone();
    let max_file_size = config.max_file_size;

    WalkBuilder::new(&config.root)
        .hidden(true)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .follow_links(config.follow_symlinks)
        .threads(rayon::current_num_threads().min(12))
        .filter_entry(move |entry| {
            if entry.file_type().is_some_and(|ft| ft.is_dir()) {
                let name = entry.file_name().to_string_lossy();
                return !skip_dirs.contains(name.as_ref());
            }
            true
        })
        .build_parallel()
        .run(|| {
            let include = &include;
            let exclude = &exclude;
            let has_include = has_include;
            let root = &root;
            let extensions = &config.extensions;
            let results = &results;
            Box::new(move |entry| {
                let entry = match entry {
                    Ok(e) => e,
                    Err(_) => return ignore::WalkState::Continue,
                };
                if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                    return ignore::WalkState::Continue;
                }

                let abs_path = entry.path().to_path_buf();
                let ext = abs_path.extension().and_then(|e| e.to_str()).unwrap_or("").to_string();
                if !extensions.is_empty() && !extensions.contains(&ext) {
                    return ignore::WalkState::Continue;
                }

                let rel_path =
                    abs_path.strip_prefix(root).unwrap_or(&abs_path).to_string_lossy().replace('\\', "/");

                if has_include && !include.is_match(&rel_path) {
                    return ignore::WalkState::Continue;
                }
                if exclude.is_match(&rel_path) {
                    return ignore::WalkState::Continue;
                }

                match entry.metadata() {
                    Ok(meta) if meta.len() > max_file_size => {
                        warn!(path = %rel_path, size = meta.len(), max = max_file_size, "skipping oversized file");
                        return ignore::WalkState::Continue;
                    }
                    Err(_) => return ignore::WalkState::Continue,
                    _ => {}
                }

                results.lock().unwrap().push(WalkedFile { abs_path, rel_path, ext });
                ignore::WalkState::Continue
            })
        });

    let mut files = results.into_inner().unwrap();
    // Stable iteration order: lexicographic by full path (spec.md §4.A "Policy").
    files.sort_by(|a, b| a.abs_path.cmp(&b.abs_path));
    files
}

/// Check if `path` matches `pattern` (used by `SearchOptions.pathFilter`).
pub fn path_matches_glob(path: &Path, pattern: &str) -> bool {
    Glob::new(pattern)
        .map(|g| g.compile_matcher().is_match(path))
        .unwrap_or(false)
}
