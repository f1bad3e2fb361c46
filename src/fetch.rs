//! Repository archive acquisition.
//!
//! Resolves a repository URL to a default-branch zip snapshot, downloads
//! it into a job-scoped working directory, and extracts it in place. No
//! branch discovery happens: the configured archive suffix always targets
//! the repository's HEAD reference.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::FetchConfig;

/// Failure modes for archive acquisition (no panic; the pipeline records
/// the message and fails the job).
#[derive(Debug)]
pub enum FetchError {
    /// The repository URL points at a host outside the allow-list.
    UnsupportedSource(String),
    /// Transport or HTTP-status failure retrieving the archive.
    Download(String),
    /// The downloaded archive could not be unpacked.
    Extraction(String),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::UnsupportedSource(e) => write!(f, "unsupported repository source: {}", e),
            FetchError::Download(e) => write!(f, "archive download failed: {}", e),
            FetchError::Extraction(e) => write!(f, "archive extraction failed: {}", e),
        }
    }
}

impl std::error::Error for FetchError {}

/// Download and extract `repo_url` into `workdir`, returning the local
/// path of the repository root.
///
/// A zip snapshot normally unpacks to a single `<repo>-<ref>` top-level
/// directory, which becomes the root; archives with any other layout fall
/// back to the extraction directory itself. The archive file is deleted
/// after extraction, best-effort.
pub async fn fetch_repository(
    fetch: &FetchConfig,
    repo_url: &str,
    workdir: &Path,
) -> Result<PathBuf, FetchError> {
    validate_source(fetch, repo_url)?;
    let url = archive_url(fetch, repo_url);

    std::fs::create_dir_all(workdir)
        .map_err(|e| FetchError::Download(format!("failed to create working directory: {}", e)))?;
    let zip_path = workdir.join("repo.zip");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(fetch.timeout_secs))
        .build()
        .map_err(|e| FetchError::Download(e.to_string()))?;

    let response = client
        .get(&url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| FetchError::Download(format!("failed to download {}: {}", url, e)))?;

    let bytes = response
        .bytes()
        .await
        .map_err(|e| FetchError::Download(format!("failed to read archive body: {}", e)))?;

    std::fs::write(&zip_path, &bytes)
        .map_err(|e| FetchError::Download(format!("failed to write archive: {}", e)))?;

    extract_archive(&zip_path, workdir)?;

    let _ = std::fs::remove_file(&zip_path);

    resolve_repo_root(workdir)
}

/// Reject URLs outside the configured hosting domains before any network
/// traffic happens.
pub fn validate_source(fetch: &FetchConfig, repo_url: &str) -> Result<(), FetchError> {
    let parsed = reqwest::Url::parse(repo_url).map_err(|e| {
        FetchError::UnsupportedSource(format!("invalid repository URL '{}': {}", repo_url, e))
    })?;

    let host = parsed.host_str().ok_or_else(|| {
        FetchError::UnsupportedSource(format!("repository URL '{}' has no host", repo_url))
    })?;

    if !fetch.allowed_hosts.iter().any(|h| h == host) {
        return Err(FetchError::UnsupportedSource(format!(
            "host '{}' is not an allowed archive source",
            host
        )));
    }

    Ok(())
}

/// `owner/repo` path component of a repository URL, used as the
/// repository's display name.
pub fn repo_full_name(repo_url: &str) -> Result<String, FetchError> {
    let parsed = reqwest::Url::parse(repo_url).map_err(|e| {
        FetchError::UnsupportedSource(format!("invalid repository URL '{}': {}", repo_url, e))
    })?;

    let name = parsed
        .path()
        .trim_matches('/')
        .trim_end_matches(".git")
        .to_string();

    if name.is_empty() {
        return Err(FetchError::UnsupportedSource(format!(
            "repository URL '{}' has no path",
            repo_url
        )));
    }

    Ok(name)
}

fn archive_url(fetch: &FetchConfig, repo_url: &str) -> String {
    format!(
        "{}{}",
        repo_url.trim_end_matches('/'),
        fetch.archive_suffix
    )
}

pub(crate) fn extract_archive(zip_path: &Path, target: &Path) -> Result<(), FetchError> {
    let file = File::open(zip_path).map_err(|e| FetchError::Extraction(e.to_string()))?;

    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| FetchError::Extraction(format!("invalid zip archive: {}", e)))?;

    archive
        .extract(target)
        .map_err(|e| FetchError::Extraction(e.to_string()))?;

    Ok(())
}

/// Exactly one extracted top-level directory → that directory; anything
/// else → the extraction directory (flat-layout fallback). Stray files
/// next to a single directory do not defeat the lookup.
pub(crate) fn resolve_repo_root(workdir: &Path) -> Result<PathBuf, FetchError> {
    let entries =
        std::fs::read_dir(workdir).map_err(|e| FetchError::Extraction(e.to_string()))?;

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| FetchError::Extraction(e.to_string()))?;
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            dirs.push(entry.path());
        }
    }

    if dirs.len() == 1 {
        Ok(dirs.remove(0))
    } else {
        Ok(workdir.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn test_fetch_config() -> FetchConfig {
        FetchConfig::default()
    }

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        for (name, body) in entries {
            zip.start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_validate_source_accepts_allowed_host() {
        let fetch = test_fetch_config();
        assert!(validate_source(&fetch, "https://github.com/acme/demo").is_ok());
    }

    #[test]
    fn test_validate_source_rejects_other_host() {
        let fetch = test_fetch_config();
        let err = validate_source(&fetch, "https://gitlab.com/acme/demo").unwrap_err();
        assert!(matches!(err, FetchError::UnsupportedSource(_)));
    }

    #[test]
    fn test_validate_source_rejects_garbage() {
        let fetch = test_fetch_config();
        let err = validate_source(&fetch, "not a url").unwrap_err();
        assert!(matches!(err, FetchError::UnsupportedSource(_)));
    }

    #[test]
    fn test_archive_url_appends_suffix() {
        let fetch = test_fetch_config();
        assert_eq!(
            archive_url(&fetch, "https://github.com/acme/demo"),
            "https://github.com/acme/demo/archive/HEAD.zip"
        );
        // Trailing slash must not produce a double slash.
        assert_eq!(
            archive_url(&fetch, "https://github.com/acme/demo/"),
            "https://github.com/acme/demo/archive/HEAD.zip"
        );
    }

    #[test]
    fn test_repo_full_name() {
        assert_eq!(
            repo_full_name("https://github.com/acme/demo").unwrap(),
            "acme/demo"
        );
        assert_eq!(
            repo_full_name("https://github.com/acme/demo.git").unwrap(),
            "acme/demo"
        );
        assert!(repo_full_name("https://github.com/").is_err());
    }

    #[test]
    fn test_extract_and_resolve_single_top_dir() {
        let tmp = TempDir::new().unwrap();
        let zip_path = tmp.path().join("repo.zip");
        write_zip(
            &zip_path,
            &[
                ("demo-main/README.md", "# Demo"),
                ("demo-main/src/main.rs", "fn main() {}"),
            ],
        );

        extract_archive(&zip_path, tmp.path()).unwrap();
        std::fs::remove_file(&zip_path).unwrap();

        let root = resolve_repo_root(tmp.path()).unwrap();
        assert_eq!(root, tmp.path().join("demo-main"));
        assert!(root.join("README.md").exists());
    }

    #[test]
    fn test_resolve_flat_layout_falls_back() {
        let tmp = TempDir::new().unwrap();
        let zip_path = tmp.path().join("repo.zip");
        write_zip(&zip_path, &[("README.md", "# Flat"), ("main.py", "pass")]);

        extract_archive(&zip_path, tmp.path()).unwrap();
        std::fs::remove_file(&zip_path).unwrap();

        let root = resolve_repo_root(tmp.path()).unwrap();
        assert_eq!(root, tmp.path());
    }

    #[test]
    fn test_corrupt_archive_is_extraction_error() {
        let tmp = TempDir::new().unwrap();
        let zip_path = tmp.path().join("repo.zip");
        std::fs::write(&zip_path, b"this is not a zip").unwrap();

        let err = extract_archive(&zip_path, tmp.path()).unwrap_err();
        assert!(matches!(err, FetchError::Extraction(_)));
    }
}
