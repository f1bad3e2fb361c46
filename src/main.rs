//! # repo-scribe CLI (`scribe`)
//!
//! The `scribe` binary drives the repository analysis service: database
//! initialization, the HTTP API with its worker pool, one-shot analyses,
//! and job inspection.
//!
//! ## Usage
//!
//! ```bash
//! scribe --config ./config/scribe.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `scribe init` | Create the SQLite database and run schema migrations |
//! | `scribe serve` | Start the worker pool and the HTTP API |
//! | `scribe analyze <url>` | Run one analysis end-to-end and print the document |
//! | `scribe jobs list` | List analysis jobs |
//! | `scribe jobs show <id>` | Show one job in detail |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use repo_scribe::models::JobStatus;
use repo_scribe::{config, db, fetch, migrate, pipeline, server, store};

/// repo-scribe — a repository analysis and technical documentation
/// generation service.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/scribe.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "scribe",
    about = "repo-scribe — repository analysis and technical documentation generation",
    version,
    long_about = "repo-scribe ingests a remote source-code repository, builds a bounded \
    evidence package describing its structure and key contents, and drives that package \
    through a text-generation backend to produce a technical document, tracked as an \
    asynchronous job."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/scribe.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables
    /// (repositories, analysis_jobs, documents). Idempotent — running it
    /// multiple times is safe.
    Init,

    /// Start the HTTP API and the background worker pool.
    ///
    /// Binds to the address configured in `[server].bind`. Analysis jobs
    /// created through the API are queued and processed by the workers.
    Serve,

    /// Analyze one repository end-to-end and print the outcome.
    ///
    /// Registers the repository (reusing an existing record for the same
    /// URL), creates a job, runs the full pipeline inline, and prints the
    /// generated document on success.
    Analyze {
        /// Repository URL (e.g. `https://github.com/owner/repo`).
        url: String,
    },

    /// Inspect analysis jobs.
    Jobs {
        #[command(subcommand)]
        action: JobsAction,
    },
}

/// Job inspection subcommands.
#[derive(Subcommand)]
enum JobsAction {
    /// List all jobs, newest first.
    List,

    /// Show one job in detail, including its error and evidence summary.
    Show {
        /// Job id.
        id: String,
    },
}

fn format_ts(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Analyze { url } => {
            let full_name = fetch::repo_full_name(&url)?;
            let pool = db::connect(&cfg).await?;

            let repo = store::create_repository(&pool, &full_name, &url).await?;
            let job = store::create_job(&pool, &repo.id).await?;

            println!("analyze {}", repo.full_name);
            println!("  job: {}", job.id);

            pipeline::run_job(&cfg, &pool, &job.id).await;

            let job = store::get_job(&pool, &job.id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("job {} disappeared", job.id))?;

            println!("  status: {}", job.status);
            if let Some(message) = &job.error_message {
                println!("  error: {}", message);
            }

            if job.status == JobStatus::Done {
                if let Some(doc) = store::get_document_for_job(&pool, &job.id).await? {
                    println!("---");
                    println!("{}", doc.content_md);
                }
            }

            pool.close().await;
        }
        Commands::Jobs { action } => {
            let pool = db::connect(&cfg).await?;
            match action {
                JobsAction::List => {
                    let jobs = store::list_jobs(&pool).await?;
                    println!(
                        "{:<36} {:<8} {:<20} ERROR",
                        "JOB", "STATUS", "CREATED"
                    );
                    for job in jobs {
                        println!(
                            "{:<36} {:<8} {:<20} {}",
                            job.id,
                            job.status,
                            format_ts(job.created_at),
                            job.error_message.as_deref().unwrap_or("-")
                        );
                    }
                }
                JobsAction::Show { id } => {
                    let job = store::get_job(&pool, &id)
                        .await?
                        .ok_or_else(|| anyhow::anyhow!("job {} not found", id))?;

                    println!("job:        {}", job.id);
                    println!("repository: {}", job.repository_id);
                    println!("status:     {}", job.status);
                    println!("created:    {}", format_ts(job.created_at));
                    if let Some(finished) = job.finished_at {
                        println!("finished:   {}", format_ts(finished));
                    }
                    if let Some(message) = &job.error_message {
                        println!("error:      {}", message);
                    }
                    println!(
                        "evidence:   {}",
                        if job.evidence_json.is_some() {
                            "composed"
                        } else {
                            "absent"
                        }
                    );
                    if let Some(doc) = store::get_document_for_job(&pool, &job.id).await? {
                        println!("document:   {} ({} bytes)", doc.id, doc.content_md.len());
                    } else {
                        println!("document:   absent");
                    }
                }
            }
            pool.close().await;
        }
    }

    Ok(())
}
