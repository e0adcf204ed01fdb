//! Topology classification and deduplication of table mentions.
//!
//! Mentions are split by cluster: tables on an excluded host sit outside
//! the monolith and cannot be resolved through the ownership directory.
//! Both partitions are sets of database names, so repeated mentions of a
//! table collapse into one unit of work.

use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::extract::TableMention;

/// Distinct database names partitioned by topology.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Classification {
    /// Databases eligible for ownership lookup
    pub monolith: BTreeSet<String>,
    /// Databases on excluded clusters, routed to manual triage
    pub non_monolith: BTreeSet<String>,
}

/// A distinct database with its topology flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedTable {
    pub database: String,
    pub in_monolith: bool,
}

impl Classification {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.monolith.is_empty() && self.non_monolith.is_empty()
    }

    /// All distinct tables, monolith first, each sorted by name.
    #[must_use]
    pub fn tables(&self) -> Vec<ClassifiedTable> {
        let monolith = self.monolith.iter().map(|database| ClassifiedTable {
            database: database.clone(),
            in_monolith: true,
        });
        let non_monolith = self.non_monolith.iter().map(|database| ClassifiedTable {
            database: database.clone(),
            in_monolith: false,
        });
        monolith.chain(non_monolith).collect()
    }
}

/// Check whether a host belongs to the monolith topology.
#[must_use]
pub fn is_monolith_host(host: &str, excluded_hosts: &BTreeSet<String>) -> bool {
    !excluded_hosts.contains(host)
}

/// Partition mentions into monolith and non-monolith database names.
///
/// A database seen on both a monolith host and an excluded host is kept
/// in `non_monolith` only, whatever the order of the mentions.
#[must_use]
pub fn classify<'a, I>(mentions: I, excluded_hosts: &BTreeSet<String>) -> Classification
where
    I: IntoIterator<Item = &'a TableMention>,
{
    let mut classification = Classification::default();

    for mention in mentions {
        if is_monolith_host(&mention.host, excluded_hosts) {
            classification.monolith.insert(mention.database.clone());
        } else {
            classification.non_monolith.insert(mention.database.clone());
        }
    }

    let conflicts: Vec<String> = classification
        .monolith
        .intersection(&classification.non_monolith)
        .cloned()
        .collect();
    for database in conflicts {
        warn!(
            database = %database,
            "Table mentioned on both monolith and excluded clusters, treating as non-monolith"
        );
        classification.monolith.remove(&database);
    }

    debug!(
        monolith = classification.monolith.len(),
        non_monolith = classification.non_monolith.len(),
        "Classified exhausted tables"
    );

    classification
}
