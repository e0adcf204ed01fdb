//! Ownership directory lookups.
//!
//! The directory maps a monolith table to the service that writes it and
//! the team that maintains that service.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LookupError;
use crate::CLIENT_USER_AGENT;

/// Owner of a monolith table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipRecord {
    pub database: String,
    pub service: String,
    pub team: String,
}

/// Source of table ownership data.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OwnershipDirectory: Send + Sync {
    /// Look up the owner of `database`.
    ///
    /// Returns [`LookupError::Unresolved`] when the directory knows the
    /// table but has no service or team for it.
    async fn lookup(&self, database: &str) -> Result<OwnershipRecord, LookupError>;
}

/// Body of `GET /tables/{name}`.
#[derive(Debug, Deserialize)]
struct TableOwnerResponse {
    #[serde(default)]
    service: Option<String>,
    #[serde(default)]
    team: Option<String>,
}

/// HTTP client for the ownership directory.
#[derive(Debug, Clone)]
pub struct HttpDirectory {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDirectory {
    /// Create a directory client with a request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(CLIENT_USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn table_url(&self, database: &str) -> String {
        format!("{}/tables/{database}", self.base_url)
    }
}

#[async_trait]
impl OwnershipDirectory for HttpDirectory {
    async fn lookup(&self, database: &str) -> Result<OwnershipRecord, LookupError> {
        let url = self.table_url(database);
        debug!(database = %database, url = %url, "Looking up table owner");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let parsed: TableOwnerResponse = serde_json::from_str(&body)?;
        owner_from_response(database, parsed)
    }
}

fn owner_from_response(
    database: &str,
    response: TableOwnerResponse,
) -> Result<OwnershipRecord, LookupError> {
    let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

    match (non_empty(response.service), non_empty(response.team)) {
        (Some(service), Some(team)) => Ok(OwnershipRecord {
            database: database.to_string(),
            service,
            team,
        }),
        _ => Err(LookupError::Unresolved {
            database: database.to_string(),
        }),
    }
}
