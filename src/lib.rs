//! # repo-scribe
//!
//! **A repository analysis and technical documentation generation service.**
//!
//! repo-scribe ingests a remote source-code repository, builds a bounded
//! "evidence package" describing its structure and key contents, and
//! drives that package through a text-generation backend to produce a
//! technical document, tracked as an asynchronous job with explicit state
//! transitions.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────────────────────┐   ┌──────────┐
//! │  Archive  │──▶│  Pipeline                    │──▶│  SQLite   │
//! │  Fetcher  │   │ index → evidence → generate │   │ jobs+docs │
//! └──────────┘   └──────────────────────────────┘   └────┬─────┘
//!                                                        │
//!                                    ┌───────────────────┤
//!                                    ▼                   ▼
//!                               ┌──────────┐       ┌──────────┐
//!                               │   CLI    │       │   HTTP   │
//!                               │ (scribe) │       │   API    │
//!                               └──────────┘       └──────────┘
//! ```
//!
//! ## Data Flow
//!
//! 1. A job is created in `PENDING` state and handed to the bounded
//!    worker queue ([`worker`]); the caller polls for progress.
//! 2. A worker marks the job `RUNNING` and the **archive fetcher**
//!    ([`fetch`]) downloads and extracts the repository's default-branch
//!    zip snapshot into a job-scoped working directory.
//! 3. The **indexer** ([`index`]) walks the tree, pruning ignored
//!    directories, and collects the sorted path list, extension
//!    statistics, and key files.
//! 4. The **evidence composer** ([`evidence`]) bounds that index into a
//!    serializable [`models::EvidencePackage`], persisted immediately so
//!    failed jobs keep partial evidence.
//! 5. The **generation orchestrator** ([`generate`]) renders the fixed
//!    instruction template around the evidence and submits it to the
//!    text-generation backend.
//! 6. The document is persisted and the job reaches `DONE`; any step
//!    failure instead records the message and reaches `ERROR`.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types and the job state machine |
//! | [`fetch`] | Archive download and extraction |
//! | [`index`] | Repository traversal and statistics |
//! | [`evidence`] | Bounded evidence-package composition |
//! | [`generate`] | Text-generation backend orchestration |
//! | [`pipeline`] | Per-job sequencing and failure capture |
//! | [`worker`] | Bounded job queue and worker pool |
//! | [`server`] | HTTP API |
//! | [`store`] | SQLite persistence operations |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod evidence;
pub mod fetch;
pub mod generate;
pub mod index;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod server;
pub mod store;
pub mod worker;
