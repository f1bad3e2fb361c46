use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub workdir: WorkdirConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub queue: QueueConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

/// Where per-job working directories live. Each job extracts its archive
/// under `<root>/<job id>`; the directory is removed when the pipeline
/// exits unless `keep` is set.
#[derive(Debug, Deserialize, Clone)]
pub struct WorkdirConfig {
    #[serde(default = "default_workdir_root")]
    pub root: PathBuf,
    #[serde(default)]
    pub keep: bool,
}

impl Default for WorkdirConfig {
    fn default() -> Self {
        Self {
            root: default_workdir_root(),
            keep: false,
        }
    }
}

fn default_workdir_root() -> PathBuf {
    PathBuf::from("data/repos")
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    /// Hosts a repository URL may point at. Anything else is rejected
    /// before any network traffic happens.
    #[serde(default = "default_allowed_hosts")]
    pub allowed_hosts: Vec<String>,
    /// Appended to the repository URL to request a default-branch zip
    /// snapshot. No branch discovery is performed.
    #[serde(default = "default_archive_suffix")]
    pub archive_suffix: String,
    #[serde(default = "default_fetch_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            allowed_hosts: default_allowed_hosts(),
            archive_suffix: default_archive_suffix(),
            timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

fn default_allowed_hosts() -> Vec<String> {
    vec!["github.com".to_string()]
}
fn default_archive_suffix() -> String {
    "/archive/HEAD.zip".to_string()
}
fn default_fetch_timeout_secs() -> u64 {
    60
}

/// Indexing and evidence-composition bounds.
#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisConfig {
    /// Maximum tree entries included in the evidence structure slice.
    #[serde(default = "default_structure_limit")]
    pub structure_limit: usize,
    /// Maximum files whose content is included in the evidence.
    #[serde(default = "default_content_file_limit")]
    pub content_file_limit: usize,
    /// Lines kept per included file before the truncation marker.
    #[serde(default = "default_content_line_limit")]
    pub content_line_limit: usize,
    /// Directory names pruned before descent; their contents never appear
    /// in any output.
    #[serde(default = "default_ignore_dirs")]
    pub ignore_dirs: Vec<String>,
    /// Basenames recognized as key files (manifests and readmes).
    #[serde(default = "default_key_files")]
    pub key_files: Vec<String>,
    /// Basenames recognized as common application entry points.
    #[serde(default = "default_entry_points")]
    pub entry_points: Vec<String>,
    /// Extra exclude patterns applied to relative paths during indexing.
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            structure_limit: default_structure_limit(),
            content_file_limit: default_content_file_limit(),
            content_line_limit: default_content_line_limit(),
            ignore_dirs: default_ignore_dirs(),
            key_files: default_key_files(),
            entry_points: default_entry_points(),
            exclude_globs: Vec::new(),
        }
    }
}

fn default_structure_limit() -> usize {
    300
}
fn default_content_file_limit() -> usize {
    10
}
fn default_content_line_limit() -> usize {
    100
}

fn default_ignore_dirs() -> Vec<String> {
    [
        ".git",
        ".github",
        ".vscode",
        ".idea",
        "node_modules",
        "dist",
        "build",
        "coverage",
        "__pycache__",
        ".venv",
        "venv",
        "env",
        "target",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_key_files() -> Vec<String> {
    [
        "README.md",
        "pyproject.toml",
        "requirements.txt",
        "package.json",
        "Dockerfile",
        "docker-compose.yml",
        "pom.xml",
        "build.gradle",
        "go.mod",
        "Cargo.toml",
        "Makefile",
        "CMakeLists.txt",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_entry_points() -> Vec<String> {
    [
        "main.py", "app.py", "index.js", "server.js", "manage.py", "main.rs", "main.go",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Text-generation backend settings. Endpoint, model, and sampling
/// parameters are fixed per deployment, not per request.
#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_generation_endpoint(),
            model: default_generation_model(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_output_tokens: default_max_output_tokens(),
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

fn default_generation_endpoint() -> String {
    "http://localhost:11434/api/generate".to_string()
}
fn default_generation_model() -> String {
    "qwen3".to_string()
}
fn default_temperature() -> f64 {
    0.3
}
fn default_top_p() -> f64 {
    0.9
}
fn default_max_output_tokens() -> u32 {
    4096
}
fn default_generation_timeout_secs() -> u64 {
    120
}

/// Background job queue sizing. One worker processes one job fully before
/// taking the next; the channel bound rejects new analyses under load.
#[derive(Debug, Deserialize, Clone)]
pub struct QueueConfig {
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,
    #[serde(default = "default_queue_workers")]
    pub workers: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
            workers: default_queue_workers(),
        }
    }
}

fn default_queue_capacity() -> usize {
    32
}
fn default_queue_workers() -> usize {
    2
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;

    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.analysis.structure_limit == 0 {
        anyhow::bail!("analysis.structure_limit must be > 0");
    }
    if config.analysis.content_file_limit == 0 {
        anyhow::bail!("analysis.content_file_limit must be > 0");
    }
    if config.analysis.content_line_limit == 0 {
        anyhow::bail!("analysis.content_line_limit must be > 0");
    }

    if config.fetch.allowed_hosts.is_empty() {
        anyhow::bail!("fetch.allowed_hosts must not be empty");
    }

    if config.generation.endpoint.is_empty() {
        anyhow::bail!("generation.endpoint must not be empty");
    }
    if config.generation.model.is_empty() {
        anyhow::bail!("generation.model must not be empty");
    }
    if !(0.0..=1.0).contains(&config.generation.temperature) {
        anyhow::bail!("generation.temperature must be in [0.0, 1.0]");
    }
    if !(0.0..=1.0).contains(&config.generation.top_p) {
        anyhow::bail!("generation.top_p must be in [0.0, 1.0]");
    }

    if config.queue.capacity == 0 {
        anyhow::bail!("queue.capacity must be >= 1");
    }
    if config.queue.workers == 0 {
        anyhow::bail!("queue.workers must be >= 1");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_toml() -> &'static str {
        r#"
[db]
path = "data/scribe.db"

[server]
bind = "127.0.0.1:8087"
"#
    }

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config: Config = toml::from_str(minimal_toml()).unwrap();
        validate(&config).unwrap();

        assert_eq!(config.analysis.structure_limit, 300);
        assert_eq!(config.analysis.content_file_limit, 10);
        assert_eq!(config.analysis.content_line_limit, 100);
        assert!(config.analysis.ignore_dirs.iter().any(|d| d == ".git"));
        assert!(config.analysis.key_files.iter().any(|f| f == "README.md"));
        assert_eq!(config.fetch.allowed_hosts, vec!["github.com"]);
        assert_eq!(config.fetch.archive_suffix, "/archive/HEAD.zip");
        assert_eq!(config.queue.workers, 2);
        assert!(!config.workdir.keep);
    }

    #[test]
    fn test_zero_cap_rejected() {
        let mut config: Config = toml::from_str(minimal_toml()).unwrap();
        config.analysis.content_file_limit = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_empty_allowed_hosts_rejected() {
        let mut config: Config = toml::from_str(minimal_toml()).unwrap();
        config.fetch.allowed_hosts.clear();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_sampling_range_rejected() {
        let mut config: Config = toml::from_str(minimal_toml()).unwrap();
        config.generation.temperature = 1.5;
        assert!(validate(&config).is_err());
    }
}
