//! Storage operations for repositories, analysis jobs, and documents.
//!
//! One function per operation, keyed by record id. Job status transitions
//! are guarded in SQL (`WHERE status = ...`) so the PENDING → RUNNING →
//! terminal ordering holds even if a caller misbehaves; a terminal job is
//! never updated again.

use anyhow::{anyhow, Result};
use sha2::{Digest, Sha256};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{AnalysisJob, GeneratedDocument, JobStatus, Repository};

fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

// ============ Repositories ============

/// Insert a repository, reusing the existing record when the URL is
/// already registered.
pub async fn create_repository(
    pool: &SqlitePool,
    full_name: &str,
    url: &str,
) -> Result<Repository> {
    if let Some(existing) = get_repository_by_url(pool, url).await? {
        return Ok(existing);
    }

    let repo = Repository {
        id: Uuid::new_v4().to_string(),
        full_name: full_name.to_string(),
        url: url.to_string(),
        created_at: now_ts(),
    };

    sqlx::query("INSERT INTO repositories (id, full_name, url, created_at) VALUES (?, ?, ?, ?)")
        .bind(&repo.id)
        .bind(&repo.full_name)
        .bind(&repo.url)
        .bind(repo.created_at)
        .execute(pool)
        .await?;

    Ok(repo)
}

pub async fn get_repository(pool: &SqlitePool, id: &str) -> Result<Option<Repository>> {
    let row = sqlx::query("SELECT id, full_name, url, created_at FROM repositories WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.map(|r| row_to_repository(&r)).transpose()
}

pub async fn get_repository_by_url(pool: &SqlitePool, url: &str) -> Result<Option<Repository>> {
    let row = sqlx::query("SELECT id, full_name, url, created_at FROM repositories WHERE url = ?")
        .bind(url)
        .fetch_optional(pool)
        .await?;

    row.map(|r| row_to_repository(&r)).transpose()
}

pub async fn list_repositories(pool: &SqlitePool) -> Result<Vec<Repository>> {
    let rows =
        sqlx::query("SELECT id, full_name, url, created_at FROM repositories ORDER BY created_at")
            .fetch_all(pool)
            .await?;

    rows.iter().map(row_to_repository).collect()
}

fn row_to_repository(row: &SqliteRow) -> Result<Repository> {
    Ok(Repository {
        id: row.try_get("id")?,
        full_name: row.try_get("full_name")?,
        url: row.try_get("url")?,
        created_at: row.try_get("created_at")?,
    })
}

// ============ Analysis jobs ============

/// Create a job in PENDING state.
pub async fn create_job(pool: &SqlitePool, repository_id: &str) -> Result<AnalysisJob> {
    let job = AnalysisJob {
        id: Uuid::new_v4().to_string(),
        repository_id: repository_id.to_string(),
        status: JobStatus::Pending,
        evidence_json: None,
        error_message: None,
        created_at: now_ts(),
        finished_at: None,
    };

    sqlx::query(
        "INSERT INTO analysis_jobs (id, repository_id, status, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&job.id)
    .bind(&job.repository_id)
    .bind(job.status.as_str())
    .bind(job.created_at)
    .execute(pool)
    .await?;

    Ok(job)
}

pub async fn get_job(pool: &SqlitePool, id: &str) -> Result<Option<AnalysisJob>> {
    let row = sqlx::query(
        "SELECT id, repository_id, status, evidence_json, error_message, created_at, finished_at \
         FROM analysis_jobs WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(|r| row_to_job(&r)).transpose()
}

pub async fn list_jobs(pool: &SqlitePool) -> Result<Vec<AnalysisJob>> {
    let rows = sqlx::query(
        "SELECT id, repository_id, status, evidence_json, error_message, created_at, finished_at \
         FROM analysis_jobs ORDER BY created_at DESC",
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_job).collect()
}

/// PENDING → RUNNING. Committed before any fallible pipeline step so a
/// poller never observes a stale PENDING once work has begun.
pub async fn mark_running(pool: &SqlitePool, job_id: &str) -> Result<()> {
    let result = sqlx::query(
        "UPDATE analysis_jobs SET status = 'RUNNING' WHERE id = ? AND status = 'PENDING'",
    )
    .bind(job_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(anyhow!("job {} is not PENDING", job_id));
    }
    Ok(())
}

/// Persist serialized evidence, independent of downstream success.
pub async fn save_evidence(pool: &SqlitePool, job_id: &str, evidence_json: &str) -> Result<()> {
    sqlx::query("UPDATE analysis_jobs SET evidence_json = ? WHERE id = ?")
        .bind(evidence_json)
        .bind(job_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// RUNNING → DONE, recording the finish timestamp.
pub async fn mark_done(pool: &SqlitePool, job_id: &str) -> Result<()> {
    let result = sqlx::query(
        "UPDATE analysis_jobs SET status = 'DONE', finished_at = ? \
         WHERE id = ? AND status = 'RUNNING'",
    )
    .bind(now_ts())
    .bind(job_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(anyhow!("job {} is not RUNNING", job_id));
    }
    Ok(())
}

/// Any non-terminal state → ERROR, capturing the failure message.
pub async fn mark_error(pool: &SqlitePool, job_id: &str, message: &str) -> Result<()> {
    let result = sqlx::query(
        "UPDATE analysis_jobs SET status = 'ERROR', error_message = ?, finished_at = ? \
         WHERE id = ? AND status IN ('PENDING', 'RUNNING')",
    )
    .bind(message)
    .bind(now_ts())
    .bind(job_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(anyhow!("job {} is already terminal", job_id));
    }
    Ok(())
}

fn row_to_job(row: &SqliteRow) -> Result<AnalysisJob> {
    let status_str: String = row.try_get("status")?;
    let status = JobStatus::parse(&status_str).map_err(|e| anyhow!(e))?;

    Ok(AnalysisJob {
        id: row.try_get("id")?,
        repository_id: row.try_get("repository_id")?,
        status,
        evidence_json: row.try_get("evidence_json")?,
        error_message: row.try_get("error_message")?,
        created_at: row.try_get("created_at")?,
        finished_at: row.try_get("finished_at")?,
    })
}

// ============ Documents ============

/// Persist the generated markdown for a job. At most one document exists
/// per job (enforced by the schema).
pub async fn insert_document(
    pool: &SqlitePool,
    job_id: &str,
    content_md: &str,
) -> Result<GeneratedDocument> {
    let mut hasher = Sha256::new();
    hasher.update(content_md.as_bytes());
    let content_hash = format!("{:x}", hasher.finalize());

    let doc = GeneratedDocument {
        id: Uuid::new_v4().to_string(),
        job_id: job_id.to_string(),
        content_md: content_md.to_string(),
        content_hash,
        created_at: now_ts(),
    };

    sqlx::query(
        "INSERT INTO documents (id, job_id, content_md, content_hash, created_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&doc.id)
    .bind(&doc.job_id)
    .bind(&doc.content_md)
    .bind(&doc.content_hash)
    .bind(doc.created_at)
    .execute(pool)
    .await?;

    Ok(doc)
}

pub async fn get_document_for_job(
    pool: &SqlitePool,
    job_id: &str,
) -> Result<Option<GeneratedDocument>> {
    let row = sqlx::query(
        "SELECT id, job_id, content_md, content_hash, created_at FROM documents WHERE job_id = ?",
    )
    .bind(job_id)
    .fetch_optional(pool)
    .await?;

    row.map(|r| {
        Ok(GeneratedDocument {
            id: r.try_get("id")?,
            job_id: r.try_get("job_id")?,
            content_md: r.try_get("content_md")?,
            content_hash: r.try_get("content_hash")?,
            created_at: r.try_get("created_at")?,
        })
    })
    .transpose()
}
