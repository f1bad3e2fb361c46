//! Job controller: drives one analysis job to a terminal state.
//!
//! The pipeline runs strictly in sequence: fetch, index, compose, persist
//! evidence, generate, persist document. The first failure from any step
//! marks the job ERROR with the failure's message. Nothing propagates to
//! the caller that triggered the job; observers poll the job record
//! instead.

use anyhow::{anyhow, Context, Result};
use sqlx::SqlitePool;
use std::path::Path;

use crate::config::Config;
use crate::{evidence, fetch, generate, index, store};

/// Run one job through the pipeline. Infallible from the caller's view:
/// every outcome, including internal bookkeeping failures, ends in a
/// terminal job state or a logged line.
pub async fn run_job(config: &Config, pool: &SqlitePool, job_id: &str) {
    // RUNNING is committed before any fallible step so a poller never
    // observes a stale PENDING once work has begun.
    if let Err(e) = store::mark_running(pool, job_id).await {
        eprintln!("job {}: {:#}", job_id, e);
        return;
    }

    let workdir = config.workdir.root.join(job_id);
    let result = execute(config, pool, job_id, &workdir).await;

    // The working directory is removed on every exit path, success or
    // failure, unless configured otherwise for debugging.
    if !config.workdir.keep {
        let _ = std::fs::remove_dir_all(&workdir);
    }

    match result {
        Ok(()) => {
            if let Err(e) = store::mark_done(pool, job_id).await {
                eprintln!("job {}: {:#}", job_id, e);
            }
        }
        Err(e) => {
            let message = format!("{:#}", e);
            eprintln!("job {} failed: {}", job_id, message);
            if let Err(e) = store::mark_error(pool, job_id, &message).await {
                eprintln!("job {}: {:#}", job_id, e);
            }
        }
    }
}

async fn execute(config: &Config, pool: &SqlitePool, job_id: &str, workdir: &Path) -> Result<()> {
    let job = store::get_job(pool, job_id)
        .await?
        .ok_or_else(|| anyhow!("job {} not found", job_id))?;
    let repo = store::get_repository(pool, &job.repository_id)
        .await?
        .ok_or_else(|| anyhow!("repository {} not found", job.repository_id))?;

    let repo_root = fetch::fetch_repository(&config.fetch, &repo.url, workdir).await?;

    let index = index::index_repository(&repo_root, &config.analysis)
        .context("Failed to index repository")?;
    let evidence = evidence::compose_evidence(&index, &repo_root, &config.analysis);

    // Persisted before generation so ERROR jobs keep partial evidence
    // for diagnosis.
    let evidence_json =
        serde_json::to_string(&evidence).context("Failed to serialize evidence")?;
    store::save_evidence(pool, job_id, &evidence_json).await?;

    let markdown = generate::generate_document(&config.generation, &evidence).await?;
    store::insert_document(pool, job_id, &markdown).await?;

    Ok(())
}
