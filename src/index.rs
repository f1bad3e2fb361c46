//! Repository structure indexer.
//!
//! Walks an extracted repository tree and produces the sorted path list,
//! per-extension statistics, and recognized key files that evidence
//! composition builds on. Ignored directories are pruned before descent,
//! so their contents never appear in any output. Traversal is unbounded
//! by design; very large trees are a known scale limitation.

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use std::path::Path;
use walkdir::WalkDir;

use crate::config::AnalysisConfig;
use crate::models::{IndexResult, RepoStats};

/// Filenames never worth indexing.
const NOISE_FILES: &[&str] = &[".DS_Store"];

pub fn index_repository(root: &Path, analysis: &AnalysisConfig) -> Result<IndexResult> {
    let ignore_dirs: HashSet<&str> = analysis.ignore_dirs.iter().map(String::as_str).collect();
    let key_names: HashSet<&str> = analysis.key_files.iter().map(String::as_str).collect();
    let exclude_set = build_globset(&analysis.exclude_globs)?;

    let mut tree = Vec::new();
    let mut key_files = Vec::new();
    let mut stats = RepoStats::default();

    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return true;
        }
        entry
            .file_name()
            .to_str()
            .map(|name| !ignore_dirs.contains(name))
            .unwrap_or(true)
    });

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_string();
        if NOISE_FILES.contains(&name.as_str()) {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) {
            continue;
        }

        stats.files += 1;
        *stats.extensions.entry(extension_key(&name)).or_insert(0) += 1;

        if key_names.contains(name.as_str()) || name.eq_ignore_ascii_case("readme.md") {
            key_files.push(rel_str.clone());
        }

        tree.push(rel_str);
    }

    // Sorted once after traversal; walk order is filesystem-dependent.
    tree.sort();
    key_files.sort();

    Ok(IndexResult {
        tree,
        key_files,
        stats,
    })
}

/// Extension statistics key: leading dot kept, empty string for files
/// without an extension (dotfiles count as extensionless).
fn extension_key(name: &str) -> String {
    match Path::new(name).extension() {
        Some(ext) => format!(".{}", ext.to_string_lossy()),
        None => String::new(),
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
