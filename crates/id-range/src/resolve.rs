//! Ownership resolution for monolith tables.
//!
//! Each table is looked up independently. A failed or stalled lookup only
//! affects its own table; the others still resolve.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{info, warn};

use crate::directory::{OwnershipDirectory, OwnershipRecord};
use crate::error::LookupError;

/// How a table was handled in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Owner found and notified
    Resolved,
    /// Directory has no owner for the table
    Unresolved,
    /// Directory could not be reached or answered with an error
    LookupFailed,
    /// Table lives on an excluded cluster
    OutOfTopology,
}

impl OutcomeStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Resolved => "resolved",
            Self::Unresolved => "unresolved",
            Self::LookupFailed => "lookup_failed",
            Self::OutOfTopology => "out_of_topology",
        }
    }
}

/// Per-table result, used for reporting only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationOutcome {
    pub database: String,
    pub status: OutcomeStatus,
    pub detail: String,
}

/// Aggregated lookup results of one run.
#[derive(Debug, Default)]
pub struct Resolutions {
    /// Successful lookups, sorted by database
    pub owners: Vec<OwnershipRecord>,
    /// Tables the directory knows but nobody owns
    pub unresolved: BTreeSet<String>,
    /// Tables whose lookup failed, with the error text
    pub failed: BTreeMap<String, String>,
}

impl Resolutions {
    /// Flatten into per-table outcomes, sorted by database.
    #[must_use]
    pub fn outcomes(&self) -> Vec<NotificationOutcome> {
        let mut outcomes: Vec<NotificationOutcome> = self
            .owners
            .iter()
            .map(|owner| NotificationOutcome {
                database: owner.database.clone(),
                status: OutcomeStatus::Resolved,
                detail: format!("{} ({})", owner.service, owner.team),
            })
            .chain(self.unresolved.iter().map(|database| NotificationOutcome {
                database: database.clone(),
                status: OutcomeStatus::Unresolved,
                detail: "no owner registered".to_string(),
            }))
            .chain(self.failed.iter().map(|(database, error)| NotificationOutcome {
                database: database.clone(),
                status: OutcomeStatus::LookupFailed,
                detail: error.clone(),
            }))
            .collect();
        outcomes.sort_by(|a, b| a.database.cmp(&b.database));
        outcomes
    }
}

/// Resolve owners for every database, at most `concurrency` at a time.
///
/// Each lookup is bounded by `timeout` regardless of what the directory
/// implementation does internally.
pub async fn resolve_all<D>(
    directory: &D,
    databases: &BTreeSet<String>,
    concurrency: usize,
    timeout: Duration,
) -> Resolutions
where
    D: OwnershipDirectory + ?Sized,
{
    let results: Vec<(String, Result<OwnershipRecord, LookupError>)> =
        stream::iter(databases.iter().cloned())
            .map(|database| async move {
                let result = match tokio::time::timeout(timeout, directory.lookup(&database)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(LookupError::Timeout { after: timeout }),
                };
                (database, result)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

    let mut resolutions = Resolutions::default();

    for (database, result) in results {
        match result {
            Ok(owner) => {
                info!(
                    database = %database,
                    service = %owner.service,
                    team = %owner.team,
                    "Resolved table owner"
                );
                resolutions.owners.push(owner);
            }
            Err(e) if e.is_unresolved() => {
                warn!(database = %database, "No owner registered for table");
                resolutions.unresolved.insert(database);
            }
            Err(e) => {
                warn!(database = %database, error = %e, "Ownership lookup failed");
                resolutions.failed.insert(database, e.to_string());
            }
        }
    }

    resolutions.owners.sort_by(|a, b| a.database.cmp(&b.database));
    resolutions
}
