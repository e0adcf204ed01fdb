//! Table mention extraction from alert issue bodies.
//!
//! Alert bodies list exhausted tables one per line, either as a marker
//! token (`{exhausted_table: host.db.column}`) or as a row of the id-range
//! report (`host.db.column bigint ...`, optionally inside a `|` table cell).
//! Report rows must start the line, so dotted names in prose are ignored.
//! Extraction is line-oriented: a reference broken across two lines is not
//! recognised.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// `host.db.column`, either after the `{exhausted_table:` marker or at the
/// start of a report row followed by a lowercase column type. Report-row
/// hosts start with a letter or underscore.
static TABLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\{exhausted_table:\s*(?P<mhost>\w+)\.(?P<mdb>\w+)\.(?P<mcol>\w+)|^\s*(?:\|\s*)?(?P<host>[A-Za-z_]\w*)\.(?P<db>\w+)\.(?P<col>\w+) [a-z]+",
    )
    .unwrap()
});

/// One `host.database.column` reference found in an issue body.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TableMention {
    /// Cluster hosting the database
    pub host: String,
    /// Database (table) name
    pub database: String,
    /// Primary-key column
    pub column: String,
}

impl TableMention {
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        database: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            database: database.into(),
            column: column.into(),
        }
    }
}

/// Check whether an issue title marks an id-range alert.
#[must_use]
pub fn is_relevant(title: &str, marker: &str) -> bool {
    title.contains(marker)
}

/// Extract the set of table mentions from an issue body.
///
/// Only the first reference on each line is taken. An empty set means the
/// issue has nothing to route.
#[must_use]
pub fn extract(body: &str) -> BTreeSet<TableMention> {
    body.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<TableMention> {
    let caps = TABLE_PATTERN.captures(line)?;

    if let (Some(host), Some(db), Some(col)) =
        (caps.name("mhost"), caps.name("mdb"), caps.name("mcol"))
    {
        return Some(TableMention::new(host.as_str(), db.as_str(), col.as_str()));
    }

    Some(TableMention::new(
        caps.name("host")?.as_str(),
        caps.name("db")?.as_str(),
        caps.name("col")?.as_str(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_relevant() {
        assert!(is_relevant("[pmp-id-range] tables near exhaustion", "pmp-id-range"));
        assert!(!is_relevant("Disk usage alert", "pmp-id-range"));
        assert!(!is_relevant("PMP-ID-RANGE", "pmp-id-range"));
    }

    #[test]
    fn test_extract_marker_form() {
        let body = "Tables:\n{exhausted_table: host1.users.id}\n{exhausted_table: tributary_production.events.id}\n";
        let mentions: Vec<_> = extract(body).into_iter().collect();
        assert_eq!(
            mentions,
            vec![
                TableMention::new("host1", "users", "id"),
                TableMention::new("tributary_production", "events", "id"),
            ]
        );
    }

    #[test]
    fn test_extract_report_row_form() {
        let body = "| mysql1.repositories.id bigint | 71% |\nmysql1.issues.id int 80%";
        let mentions = extract(body);
        assert!(mentions.contains(&TableMention::new("mysql1", "repositories", "id")));
        assert!(mentions.contains(&TableMention::new("mysql1", "issues", "id")));
        assert_eq!(mentions.len(), 2);
    }

    #[test]
    fn test_bare_reference_without_type_is_ignored() {
        // Hostnames and prose with dots must not look like table rows.
        let body = "see www.example.com\nmysql1.users.id\n";
        assert!(extract(body).is_empty());
    }

    #[test]
    fn test_dotted_names_in_prose_are_ignored() {
        let body = "We upgraded to MySQL 8.0.32 last week\n\
                    see config.yml.erb for details\n\
                    8.0.32 release notes\n";
        assert!(extract(body).is_empty());
    }

    #[test]
    fn test_report_row_may_be_indented_or_in_table_cell() {
        let body = "  mysql1.users.id int\n|mysql1.orgs.id bigint|\n";
        let mentions = extract(body);
        assert!(mentions.contains(&TableMention::new("mysql1", "users", "id")));
        assert!(mentions.contains(&TableMention::new("mysql1", "orgs", "id")));
    }

    #[test]
    fn test_repeated_mentions_collapse() {
        let body = "{exhausted_table: host1.users.id}\n".repeat(5);
        assert_eq!(extract(&body).len(), 1);
    }

    #[test]
    fn test_no_matches() {
        assert!(extract("").is_empty());
        assert!(extract("Looks good, nothing to see here.\n").is_empty());
    }

    #[test]
    fn test_reference_split_across_lines_is_not_recognised() {
        let body = "{exhausted_table: host1.\nusers.id}";
        assert!(extract(body).is_empty());
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        assert!(extract("{EXHAUSTED_TABLE: host1.users.id}").is_empty());
    }

    #[test]
    fn test_first_match_per_line() {
        let body = "{exhausted_table: host1.users.id} {exhausted_table: host1.orgs.id}";
        let mentions: Vec<_> = extract(body).into_iter().collect();
        assert_eq!(mentions, vec![TableMention::new("host1", "users", "id")]);
    }
}
