//! Error types for the id-range pipeline.

use std::time::Duration;

use thiserror::Error;

/// Errors returned by an ownership directory lookup.
///
/// Everything except [`LookupError::Unresolved`] means the directory could
/// not answer; `Unresolved` means it answered but nobody owns the table.
#[derive(Debug, Error)]
pub enum LookupError {
    /// HTTP request failed before a response arrived
    #[error("ownership directory request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Directory answered with a non-2xx status
    #[error("ownership directory returned {status}")]
    Status { status: u16 },

    /// Lookup did not finish in time
    #[error("ownership lookup timed out after {after:?}")]
    Timeout { after: Duration },

    /// Response body was not the expected JSON
    #[error("invalid ownership directory response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Directory has no service or team registered for the table
    #[error("no owner registered for table `{database}`")]
    Unresolved { database: String },
}

impl LookupError {
    /// Whether this is an ownership gap rather than an infrastructure failure.
    #[must_use]
    pub const fn is_unresolved(&self) -> bool {
        matches!(self, Self::Unresolved { .. })
    }
}

/// Errors from the GitHub issue API.
#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GitHub API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("invalid repository `{0}` (expected owner/repo)")]
    InvalidRepo(String),
}

/// Errors raised while loading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value `{value}` for {key}")]
    Invalid { key: &'static str, value: String },
}

/// Fatal pipeline errors.
///
/// Per-table lookup failures never show up here; they are reported as
/// outcomes. Only failures to read or write the issue abort a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to fetch issue #{issue}: {source}")]
    FetchIssue {
        issue: u64,
        #[source]
        source: GitHubError,
    },

    #[error("failed to label issue #{issue}: {source}")]
    Label {
        issue: u64,
        #[source]
        source: GitHubError,
    },

    #[error("failed to notify on issue #{issue}: {source}")]
    Notify {
        issue: u64,
        #[source]
        source: GitHubError,
    },

    #[error("invalid comment template: {0}")]
    TemplateSyntax(#[from] handlebars::TemplateError),

    #[error("failed to render comment: {0}")]
    Template(#[from] handlebars::RenderError),
}
