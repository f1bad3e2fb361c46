//! Core data models used throughout repo-scribe.
//!
//! These types represent the repositories, analysis jobs, and evidence
//! packages that flow through the analysis pipeline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Lifecycle state of an [`AnalysisJob`].
///
/// Transitions are monotonic: `PENDING → RUNNING → {DONE | ERROR}`.
/// `DONE` and `ERROR` are terminal; a job never re-enters `RUNNING`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Error,
}

impl JobStatus {
    /// Stable textual form, as stored in SQLite and returned by the API.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Done => "DONE",
            JobStatus::Error => "ERROR",
        }
    }

    /// Parse the stored textual form back into a status.
    pub fn parse(s: &str) -> Result<Self, String> {
        match s {
            "PENDING" => Ok(JobStatus::Pending),
            "RUNNING" => Ok(JobStatus::Running),
            "DONE" => Ok(JobStatus::Done),
            "ERROR" => Ok(JobStatus::Error),
            other => Err(format!("invalid job status: {}", other)),
        }
    }

    /// A terminal job accepts no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered source repository.
#[derive(Debug, Clone)]
pub struct Repository {
    pub id: String,
    /// `owner/repo` path derived from the URL.
    pub full_name: String,
    pub url: String,
    pub created_at: i64,
}

/// One analysis request and its lifecycle record.
#[derive(Debug, Clone)]
pub struct AnalysisJob {
    pub id: String,
    pub repository_id: String,
    pub status: JobStatus,
    /// Serialized [`EvidencePackage`], persisted as soon as composition
    /// succeeds so failed jobs keep partial evidence for diagnosis.
    pub evidence_json: Option<String>,
    pub error_message: Option<String>,
    pub created_at: i64,
    pub finished_at: Option<i64>,
}

/// The markdown document produced for a completed job.
#[derive(Debug, Clone)]
pub struct GeneratedDocument {
    pub id: String,
    pub job_id: String,
    pub content_md: String,
    /// SHA-256 of `content_md`, for staleness detection.
    pub content_hash: String,
    pub created_at: i64,
}

/// Aggregate file statistics for an indexed repository.
///
/// Extension keys keep their leading dot (`".rs"`); files without an
/// extension are counted under the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoStats {
    pub files: u64,
    pub extensions: BTreeMap<String, u64>,
}

/// Output of a repository traversal.
#[derive(Debug, Clone)]
pub struct IndexResult {
    /// Relative file paths, lexicographically sorted. Ignored directories
    /// are pruned during traversal and never appear here.
    pub tree: Vec<String>,
    /// Relative paths of recognized manifest/readme files, in tree order.
    pub key_files: Vec<String>,
    pub stats: RepoStats,
}

/// The bounded, serializable summary of a repository handed to the
/// generation step.
///
/// Invariant: every key of `files_content` also appears in the full tree
/// the package was composed from. Values are either real (possibly
/// truncated) text or the unreadable-file sentinel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidencePackage {
    /// Leading slice of the sorted tree, capped by configuration.
    pub structure: Vec<String>,
    pub stats: RepoStats,
    /// Relative path → truncated content, capped by configuration.
    pub files_content: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            JobStatus::Pending,
            JobStatus::Running,
            JobStatus::Done,
            JobStatus::Error,
        ] {
            assert_eq!(JobStatus::parse(status.as_str()), Ok(status));
        }
    }

    #[test]
    fn test_status_parse_rejects_unknown() {
        assert!(JobStatus::parse("QUEUED").is_err());
        assert!(JobStatus::parse("pending").is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Done.is_terminal());
        assert!(JobStatus::Error.is_terminal());
    }

    #[test]
    fn test_evidence_serialization_is_stable() {
        let mut files_content = BTreeMap::new();
        files_content.insert("README.md".to_string(), "# Demo".to_string());
        let evidence = EvidencePackage {
            structure: vec!["README.md".to_string()],
            stats: RepoStats::default(),
            files_content,
        };
        let a = serde_json::to_string(&evidence).unwrap();
        let b = serde_json::to_string(&evidence).unwrap();
        assert_eq!(a, b);

        let back: EvidencePackage = serde_json::from_str(&a).unwrap();
        assert_eq!(back.structure, evidence.structure);
    }
}
