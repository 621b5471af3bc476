//! Walks the scan root and returns candidate files with an accepted extension.

use crate::models::Candidate;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Accepted extensions, without the dot; matched case-insensitively.
    pub extensions: Vec<String>,
    pub excludes: Vec<String>,
    pub skip_hidden: bool,
    /// Directories never descended into (e.g. an output root nested in the scan root).
    pub prune: Vec<PathBuf>,
}

pub fn discover(root: &Path, opts: &ScanOptions) -> anyhow::Result<Vec<Candidate>> {
    let exclude_set = build_globset(&opts.excludes)?;
    let extensions: Vec<String> = opts
        .extensions
        .iter()
        .map(|e| e.trim_start_matches('.').to_lowercase())
        .collect();

    let mut found = Vec::new();
    let mut seen = HashSet::new();
    // Directory links are not followed; file links are accepted once per target.
    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || should_descend(e.path(), opts, &exclude_set))
    {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                debug!(error = %err, "skipping unreadable entry");
                continue;
            }
        };
        let file_type = entry.file_type();
        let path = entry.path();
        if !(file_type.is_file() || (file_type.is_symlink() && path.is_file())) {
            continue;
        }
        if !has_extension(path, &extensions) {
            continue;
        }
        let physical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if !seen.insert(physical) {
            debug!(path = %path.display(), "already discovered through another link");
            continue;
        }
        found.push(Candidate {
            path: path.to_path_buf(),
            relative_dir: relative_dir(root, path),
        });
    }
    Ok(found)
}

fn relative_dir(root: &Path, path: &Path) -> PathBuf {
    path.parent()
        .and_then(|parent| parent.strip_prefix(root).ok())
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

pub fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_lowercase();
            extensions.iter().any(|accepted| *accepted == e)
        })
        .unwrap_or(false)
}

fn build_globset(patterns: &[String]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat)?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

fn should_descend(path: &Path, opts: &ScanOptions, excludes: &GlobSet) -> bool {
    if excludes.is_match(path) {
        return false;
    }
    if opts.skip_hidden && is_hidden(path) {
        return false;
    }
    !opts.prune.iter().any(|p| p == path)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}
