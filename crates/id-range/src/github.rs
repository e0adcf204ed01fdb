//! GitHub issue access for the notifier.
//!
//! The pipeline only needs four issue operations; they are grouped in the
//! [`IssueStore`] trait so tests can swap in an in-memory store.

use std::fmt;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::GitHubError;
use crate::CLIENT_USER_AGENT;

/// Page size used when listing issue comments.
const COMMENTS_PER_PAGE: usize = 100;

/// An alert issue. The pipeline reads it and never writes it back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
}

impl Issue {
    /// Issue body, empty when GitHub returns `null`.
    #[must_use]
    pub fn body(&self) -> &str {
        self.body.as_deref().unwrap_or("")
    }
}

/// Repository in `owner/name` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repo {
    pub owner: String,
    pub name: String,
}

impl Repo {
    /// Parse an `owner/name` slug.
    pub fn parse(slug: &str) -> Result<Self, GitHubError> {
        match slug.trim().split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self {
                    owner: owner.to_string(),
                    name: name.to_string(),
                })
            }
            _ => Err(GitHubError::InvalidRepo(slug.to_string())),
        }
    }
}

impl fmt::Display for Repo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Issue operations used by the pipeline.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IssueStore: Send + Sync {
    async fn get_issue(&self, number: u64) -> Result<Issue, GitHubError>;

    async fn add_label(&self, number: u64, label: &str) -> Result<(), GitHubError>;

    async fn add_comment(&self, number: u64, body: &str) -> Result<(), GitHubError>;

    /// Bodies of all existing comments, oldest first.
    async fn list_comments(&self, number: u64) -> Result<Vec<String>, GitHubError>;
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct RawComment {
    #[serde(default)]
    body: Option<String>,
}

/// GitHub REST client scoped to one repository.
#[derive(Debug, Clone)]
pub struct GitHubIssues {
    client: reqwest::Client,
    base_url: String,
    token: String,
    repo: Repo,
}

impl GitHubIssues {
    /// Create a client for `repo` against `base_url` (normally `https://api.github.com`).
    pub fn new(base_url: &str, token: &str, repo: Repo) -> Result<Self, GitHubError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            repo,
        })
    }

    #[must_use]
    pub fn repo(&self) -> &Repo {
        &self.repo
    }

    fn issue_url(&self, number: u64) -> String {
        format!(
            "{}/repos/{}/{}/issues/{number}",
            self.base_url, self.repo.owner, self.repo.name
        )
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, GitHubError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&text)
            .map(|e| e.message)
            .unwrap_or(text);
        Err(GitHubError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl IssueStore for GitHubIssues {
    async fn get_issue(&self, number: u64) -> Result<Issue, GitHubError> {
        let response = self
            .client
            .get(self.issue_url(number))
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .send()
            .await?;

        let issue: Issue = Self::check(response).await?.json().await?;
        debug!(issue = number, title = %issue.title, "Fetched issue");
        Ok(issue)
    }

    async fn add_label(&self, number: u64, label: &str) -> Result<(), GitHubError> {
        let body = serde_json::json!({ "labels": [label] });
        let response = self
            .client
            .post(format!("{}/labels", self.issue_url(number)))
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .json(&body)
            .send()
            .await?;

        Self::check(response).await?;
        info!(issue = number, label = %label, "Added label to issue");
        Ok(())
    }

    async fn add_comment(&self, number: u64, body: &str) -> Result<(), GitHubError> {
        let payload = serde_json::json!({ "body": body });
        let response = self
            .client
            .post(format!("{}/comments", self.issue_url(number)))
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .json(&payload)
            .send()
            .await?;

        Self::check(response).await?;
        info!(issue = number, "Posted issue comment");
        Ok(())
    }

    async fn list_comments(&self, number: u64) -> Result<Vec<String>, GitHubError> {
        let mut bodies = Vec::new();
        let mut page = 1usize;

        loop {
            let response = self
                .client
                .get(format!("{}/comments", self.issue_url(number)))
                .header(AUTHORIZATION, format!("Bearer {}", self.token))
                .query(&[("per_page", COMMENTS_PER_PAGE), ("page", page)])
                .send()
                .await?;

            let comments: Vec<RawComment> = Self::check(response).await?.json().await?;
            let fetched = comments.len();
            bodies.extend(comments.into_iter().filter_map(|c| c.body));

            if fetched < COMMENTS_PER_PAGE {
                break;
            }
            page += 1;
        }

        debug!(issue = number, count = bodies.len(), "Listed issue comments");
        Ok(bodies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repo() {
        let repo = Repo::parse("github/github").unwrap();
        assert_eq!(repo.owner, "github");
        assert_eq!(repo.name, "github");
        assert_eq!(repo.to_string(), "github/github");
    }

    #[test]
    fn test_parse_repo_rejects_bad_slugs() {
        for slug in ["", "github", "/repo", "owner/", "a/b/c"] {
            assert!(
                matches!(Repo::parse(slug), Err(GitHubError::InvalidRepo(_))),
                "{slug} should be rejected"
            );
        }
    }

    #[test]
    fn test_issue_body_defaults_to_empty() {
        let issue: Issue =
            serde_json::from_str(r#"{"number": 7, "title": "t", "body": null}"#).unwrap();
        assert_eq!(issue.body(), "");
    }

    #[test]
    fn test_issue_url() {
        let client = GitHubIssues::new(
            "https://api.github.com/",
            "token",
            Repo::parse("github/alerts").unwrap(),
        )
        .unwrap();
        assert_eq!(
            client.issue_url(42),
            "https://api.github.com/repos/github/alerts/issues/42"
        );
    }
}
