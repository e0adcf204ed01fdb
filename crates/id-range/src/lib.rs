//! Routes primary-key exhaustion alerts to the teams that own the tables.
//!
//! An id-range alert issue lists tables whose id sequences are running out.
//! For each run the notifier:
//!
//! 1. fetches the issue and ignores it unless the title marks an alert
//! 2. applies the tracking label
//! 3. extracts `host.database.column` references from the body
//! 4. splits them into monolith and non-monolith tables by cluster
//! 5. looks up each monolith table in the ownership directory
//! 6. comments once per owner, and once each for out-of-topology and
//!    unowned tables
//!
//! # Usage
//!
//! ```no_run
//! use id_range::{GitHubIssues, HttpDirectory, Pipeline, Repo, Settings};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let settings = Settings::from_env()?;
//! let repo = Repo::parse("github/github")?;
//! let store = GitHubIssues::new(&settings.github_api_url, "token", repo)?;
//! let directory = HttpDirectory::new(&settings.directory_url, settings.lookup_timeout)?;
//!
//! let report = Pipeline::new(settings)?.run(&store, &directory, 1234).await?;
//! println!("{} comment(s) posted", report.posted.len());
//! # Ok(())
//! # }
//! ```

/// User agent sent to GitHub and the ownership directory.
pub(crate) const CLIENT_USER_AGENT: &str = concat!("id-range/", env!("CARGO_PKG_VERSION"));

pub mod classify;
pub mod config;
pub mod directory;
pub mod error;
pub mod extract;
pub mod github;
pub mod notify;
pub mod pipeline;
pub mod resolve;

pub use classify::{classify, Classification, ClassifiedTable};
pub use config::Settings;
pub use directory::{HttpDirectory, OwnershipDirectory, OwnershipRecord};
pub use error::{ConfigError, GitHubError, LookupError, PipelineError};
pub use extract::{extract, is_relevant, TableMention};
pub use github::{GitHubIssues, Issue, IssueStore, Repo};
pub use notify::{annotation, AnnotationLevel, CommentKind, Dispatcher, PlannedComment};
pub use pipeline::{Pipeline, RunReport, RunStatus};
pub use resolve::{resolve_all, NotificationOutcome, OutcomeStatus, Resolutions};
