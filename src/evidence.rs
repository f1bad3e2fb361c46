//! Evidence package composition.
//!
//! Selects and bounds a subset of the index (a structure slice, the full
//! statistics, and the content of a handful of prioritized files) into
//! the single serializable object handed to the generation step. All
//! bounds come from [`AnalysisConfig`]; composition is deterministic for
//! a given index.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::config::AnalysisConfig;
use crate::models::{EvidencePackage, IndexResult};

/// Substituted for files that cannot be read at composition time.
/// Composition never fails on a per-file basis.
pub const UNREADABLE_SENTINEL: &str = "[Error reading file]";

pub fn compose_evidence(
    index: &IndexResult,
    root: &Path,
    analysis: &AnalysisConfig,
) -> EvidencePackage {
    let structure: Vec<String> = index
        .tree
        .iter()
        .take(analysis.structure_limit)
        .cloned()
        .collect();

    let mut files_content = BTreeMap::new();
    for rel_path in prioritized_candidates(index, analysis)
        .into_iter()
        .take(analysis.content_file_limit)
    {
        let content = read_file_content(&root.join(&rel_path), analysis.content_line_limit);
        files_content.insert(rel_path, content);
    }

    EvidencePackage {
        structure,
        stats: index.stats.clone(),
        files_content,
    }
}

/// Candidate files for content inclusion, in priority order: manifests,
/// then readmes, then recognized entry points, path-sorted within each
/// tier and deduplicated.
fn prioritized_candidates(index: &IndexResult, analysis: &AnalysisConfig) -> Vec<String> {
    let is_readme = |path: &str| basename(path).eq_ignore_ascii_case("readme.md");

    let mut manifests: Vec<String> = index
        .key_files
        .iter()
        .filter(|p| !is_readme(p))
        .cloned()
        .collect();
    let mut readmes: Vec<String> = index
        .key_files
        .iter()
        .filter(|p| is_readme(p))
        .cloned()
        .collect();

    let entry_names: HashSet<&str> = analysis.entry_points.iter().map(String::as_str).collect();
    let mut entry_points: Vec<String> = index
        .tree
        .iter()
        .filter(|p| entry_names.contains(basename(p)))
        .cloned()
        .collect();

    manifests.sort();
    readmes.sort();
    entry_points.sort();

    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    for path in manifests.into_iter().chain(readmes).chain(entry_points) {
        if seen.insert(path.clone()) {
            candidates.push(path);
        }
    }
    candidates
}

/// Read a file as text, substituting undecodable bytes and truncating
/// after `line_limit` lines with an explicit marker. Files that cannot be
/// read yield [`UNREADABLE_SENTINEL`] instead of an error.
pub fn read_file_content(path: &Path, line_limit: usize) -> String {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(_) => return UNREADABLE_SENTINEL.to_string(),
    };

    let text = String::from_utf8_lossy(&bytes);

    let mut out = String::new();
    for (i, line) in text.lines().enumerate() {
        if i >= line_limit {
            out.push_str(&format!("\n... (truncated after {} lines)", line_limit));
            break;
        }
        if i > 0 {
            out.push('\n');
        }
        out.push_str(line);
    }
    out
}

fn basename(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RepoStats;
    use std::fs;
    use tempfile::TempDir;

    fn index_of(tree: &[&str], key_files: &[&str]) -> IndexResult {
        IndexResult {
            tree: tree.iter().map(|s| s.to_string()).collect(),
            key_files: key_files.iter().map(|s| s.to_string()).collect(),
            stats: RepoStats {
                files: tree.len() as u64,
                extensions: Default::default(),
            },
        }
    }

    #[test]
    fn test_structure_is_capped() {
        let tmp = TempDir::new().unwrap();
        let paths: Vec<String> = (0..500).map(|i| format!("f{:04}.txt", i)).collect();
        let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
        let index = index_of(&refs, &[]);

        let analysis = AnalysisConfig::default();
        let evidence = compose_evidence(&index, tmp.path(), &analysis);

        assert_eq!(evidence.structure.len(), 300);
        assert_eq!(evidence.structure[0], "f0000.txt");
        assert_eq!(evidence.stats.files, 500);
    }

    #[test]
    fn test_files_content_is_capped_at_limit() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();

        let mut tree = Vec::new();
        for i in 0..15 {
            let name = format!("dir{:02}/Cargo.toml", i);
            fs::create_dir_all(root.join(format!("dir{:02}", i))).unwrap();
            fs::write(root.join(&name), "[package]").unwrap();
            tree.push(name);
        }
        let refs: Vec<&str> = tree.iter().map(String::as_str).collect();
        let index = index_of(&refs, &refs);

        let analysis = AnalysisConfig::default();
        let evidence = compose_evidence(&index, root, &analysis);

        assert_eq!(evidence.files_content.len(), 10);
    }

    #[test]
    fn test_small_repo_includes_all_key_files() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::write(root.join("README.md"), "# Demo").unwrap();
        fs::write(root.join("package.json"), "{}").unwrap();

        let index = index_of(
            &["README.md", "package.json"],
            &["README.md", "package.json"],
        );
        let evidence = compose_evidence(&index, root, &AnalysisConfig::default());

        assert_eq!(evidence.files_content.len(), 2);
        assert_eq!(
            evidence.files_content.get("README.md").unwrap(),
            "# Demo"
        );
    }

    #[test]
    fn test_priority_order_manifest_readme_entry_point() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        for name in ["README.md", "Cargo.toml", "main.py", "extra.txt"] {
            fs::write(root.join(name), "x").unwrap();
        }

        let index = index_of(
            &["Cargo.toml", "README.md", "extra.txt", "main.py"],
            &["Cargo.toml", "README.md"],
        );

        let mut analysis = AnalysisConfig::default();
        analysis.content_file_limit = 2;
        let evidence = compose_evidence(&index, root, &analysis);

        // The manifest and the readme outrank the entry point when the
        // cap engages.
        assert!(evidence.files_content.contains_key("Cargo.toml"));
        assert!(evidence.files_content.contains_key("README.md"));
        assert!(!evidence.files_content.contains_key("main.py"));
    }

    #[test]
    fn test_candidates_are_deduplicated() {
        // app.py is both a key-file hit and an entry point in some trees;
        // it must only be counted once against the cap.
        let index = index_of(&["app.py"], &["app.py"]);
        let analysis = AnalysisConfig::default();
        let candidates = prioritized_candidates(&index, &analysis);
        assert_eq!(candidates, vec!["app.py"]);
    }

    #[test]
    fn test_files_content_keys_subset_of_tree() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::write(root.join("README.md"), "# Demo").unwrap();

        let index = index_of(&["README.md"], &["README.md"]);
        let evidence = compose_evidence(&index, root, &AnalysisConfig::default());

        for key in evidence.files_content.keys() {
            assert!(index.tree.contains(key));
        }
    }

    #[test]
    fn test_truncation_marker_above_line_limit() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("long.txt");
        let body: String = (0..1000).map(|i| format!("line {}\n", i)).collect();
        fs::write(&path, body).unwrap();

        let content = read_file_content(&path, 100);

        assert!(content.ends_with("... (truncated after 100 lines)"));
        assert!(content.contains("line 99"));
        assert!(!content.contains("line 100\n"));
    }

    #[test]
    fn test_no_marker_at_exact_limit() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("exact.txt");
        fs::write(&path, "a\nb\nc").unwrap();

        let content = read_file_content(&path, 3);

        assert_eq!(content, "a\nb\nc");
    }

    #[test]
    fn test_undecodable_bytes_are_substituted() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("binary.dat");
        fs::write(&path, [0x66, 0x6f, 0x6f, 0xff, 0xfe, 0x62, 0x61, 0x72]).unwrap();

        let content = read_file_content(&path, 100);

        assert!(content.starts_with("foo"));
        assert!(content.contains('\u{FFFD}'));
        assert!(content.ends_with("bar"));
    }

    #[test]
    fn test_unreadable_file_yields_sentinel() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("does-not-exist.txt");

        assert_eq!(read_file_content(&missing, 100), UNREADABLE_SENTINEL);
    }
}
