//! Runtime settings for the id-range notifier.
//!
//! Every value has a built-in default and can be overridden through an
//! `ID_RANGE_*` environment variable. Nothing here is global: the pipeline
//! receives a [`Settings`] value and tests build their own.

use std::collections::BTreeSet;
use std::time::Duration;

use crate::error::ConfigError;

/// Default ownership directory base URL.
pub const DEFAULT_DIRECTORY_URL: &str = "https://bones.githubapp.com";

/// Default GitHub REST API base URL.
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Clusters that live outside the monolith and are unknown to the directory.
pub const DEFAULT_EXCLUDED_HOSTS: &[&str] = &[
    "tributary_production",
    "notifications_production",
    "kv_production",
];

/// Label applied to every alert issue the notifier looks at.
pub const DEFAULT_LABEL: &str = "alert:pmp-id-range";

/// Substring that marks an issue title as an id-range alert.
pub const DEFAULT_TITLE_MARKER: &str = "pmp-id-range";

pub const DEFAULT_LOOKUP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_LOOKUP_CONCURRENCY: usize = 4;

pub const DEFAULT_TEAM_ORG: &str = "github";
pub const DEFAULT_FALLBACK_TEAM: &str = "database-infrastructure";
pub const DEFAULT_SUPPORT_CHANNEL: &str = "#app-core";
pub const DEFAULT_CATALOG_URL: &str = "https://catalog.githubapp.com/services";

const ENV_DIRECTORY_URL: &str = "ID_RANGE_DIRECTORY_URL";
const ENV_GITHUB_API_URL: &str = "GITHUB_API_URL";
const ENV_EXCLUDED_HOSTS: &str = "ID_RANGE_EXCLUDED_HOSTS";
const ENV_LABEL: &str = "ID_RANGE_LABEL";
const ENV_TITLE_MARKER: &str = "ID_RANGE_TITLE_MARKER";
const ENV_LOOKUP_TIMEOUT_SECS: &str = "ID_RANGE_LOOKUP_TIMEOUT_SECS";
const ENV_LOOKUP_CONCURRENCY: &str = "ID_RANGE_LOOKUP_CONCURRENCY";
const ENV_TEAM_ORG: &str = "ID_RANGE_TEAM_ORG";
const ENV_FALLBACK_TEAM: &str = "ID_RANGE_FALLBACK_TEAM";
const ENV_SUPPORT_CHANNEL: &str = "ID_RANGE_SUPPORT_CHANNEL";
const ENV_CATALOG_URL: &str = "ID_RANGE_CATALOG_URL";
const ENV_ESCALATE_UNRESOLVED: &str = "ID_RANGE_ESCALATE_UNRESOLVED";

/// Settings for one notifier run.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Ownership directory base URL (`GET {directory_url}/tables/{name}`).
    pub directory_url: String,
    /// GitHub REST API base URL.
    pub github_api_url: String,
    /// Cluster hosts classified as non-monolith.
    pub excluded_hosts: BTreeSet<String>,
    /// Tracking label added to relevant issues.
    pub label: String,
    /// Title substring identifying id-range alerts.
    pub title_marker: String,
    /// Upper bound for a single ownership lookup.
    pub lookup_timeout: Duration,
    /// Maximum number of lookups in flight.
    pub lookup_concurrency: usize,
    /// Organization prefix used in `@org/team` mentions.
    pub team_org: String,
    /// Team addressed by escalation comments.
    pub fallback_team: String,
    /// Support channel named in owner comments.
    pub support_channel: String,
    /// Service catalog base URL.
    pub catalog_url: String,
    /// Post an ownership-gap comment for tables without a registered owner.
    pub escalate_unresolved: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            directory_url: DEFAULT_DIRECTORY_URL.to_string(),
            github_api_url: DEFAULT_GITHUB_API_URL.to_string(),
            excluded_hosts: DEFAULT_EXCLUDED_HOSTS
                .iter()
                .map(ToString::to_string)
                .collect(),
            label: DEFAULT_LABEL.to_string(),
            title_marker: DEFAULT_TITLE_MARKER.to_string(),
            lookup_timeout: Duration::from_secs(DEFAULT_LOOKUP_TIMEOUT_SECS),
            lookup_concurrency: DEFAULT_LOOKUP_CONCURRENCY,
            team_org: DEFAULT_TEAM_ORG.to_string(),
            fallback_team: DEFAULT_FALLBACK_TEAM.to_string(),
            support_channel: DEFAULT_SUPPORT_CHANNEL.to_string(),
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            escalate_unresolved: true,
        }
    }
}

impl Settings {
    /// Load settings from environment variables.
    ///
    /// # Optional Environment Variables
    /// - `ID_RANGE_DIRECTORY_URL`: ownership directory (default: bones)
    /// - `ID_RANGE_EXCLUDED_HOSTS`: comma-separated cluster names; blank keeps the defaults
    /// - `ID_RANGE_LOOKUP_TIMEOUT_SECS`: per-lookup timeout (default: 10)
    /// - `ID_RANGE_LOOKUP_CONCURRENCY`: lookups in flight (default: 4)
    /// - `ID_RANGE_ESCALATE_UNRESOLVED`: `true`/`false` (default: true)
    /// - `GITHUB_API_URL`: GitHub API base (set by GitHub Actions)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load settings from an arbitrary variable source.
    pub fn from_vars<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let text = |key: &str, default: String| {
            var(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
        };

        let excluded_hosts = var(ENV_EXCLUDED_HOSTS)
            .map(|raw| parse_host_list(&raw))
            .filter(|hosts| !hosts.is_empty())
            .unwrap_or(defaults.excluded_hosts);

        let lookup_timeout = match var(ENV_LOOKUP_TIMEOUT_SECS) {
            Some(raw) => Duration::from_secs(parse_number(ENV_LOOKUP_TIMEOUT_SECS, &raw)?),
            None => defaults.lookup_timeout,
        };

        let lookup_concurrency = match var(ENV_LOOKUP_CONCURRENCY) {
            Some(raw) => match parse_number(ENV_LOOKUP_CONCURRENCY, &raw)? {
                0 => {
                    return Err(ConfigError::Invalid {
                        key: ENV_LOOKUP_CONCURRENCY,
                        value: raw,
                    })
                }
                n => usize::try_from(n).unwrap_or(usize::MAX),
            },
            None => defaults.lookup_concurrency,
        };

        let escalate_unresolved = match var(ENV_ESCALATE_UNRESOLVED) {
            Some(raw) => parse_flag(ENV_ESCALATE_UNRESOLVED, &raw)?,
            None => defaults.escalate_unresolved,
        };

        Ok(Self {
            directory_url: text(ENV_DIRECTORY_URL, defaults.directory_url),
            github_api_url: text(ENV_GITHUB_API_URL, defaults.github_api_url),
            excluded_hosts,
            label: text(ENV_LABEL, defaults.label),
            title_marker: text(ENV_TITLE_MARKER, defaults.title_marker),
            lookup_timeout,
            lookup_concurrency,
            team_org: text(ENV_TEAM_ORG, defaults.team_org),
            fallback_team: text(ENV_FALLBACK_TEAM, defaults.fallback_team),
            support_channel: text(ENV_SUPPORT_CHANNEL, defaults.support_channel),
            catalog_url: text(ENV_CATALOG_URL, defaults.catalog_url),
            escalate_unresolved,
        })
    }
}

/// Split a comma-separated host list, dropping blanks.
#[must_use]
pub fn parse_host_list(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn parse_number(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: raw.to_string(),
    })
}

fn parse_flag(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_set() {
        let settings = Settings::from_vars(vars(&[])).unwrap();
        assert_eq!(settings.directory_url, DEFAULT_DIRECTORY_URL);
        assert_eq!(settings.excluded_hosts.len(), 3);
        assert!(settings.excluded_hosts.contains("tributary_production"));
        assert_eq!(settings.lookup_timeout, Duration::from_secs(10));
        assert_eq!(settings.lookup_concurrency, 4);
        assert!(settings.escalate_unresolved);
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_vars(vars(&[
            ("ID_RANGE_DIRECTORY_URL", "http://localhost:3000"),
            ("ID_RANGE_EXCLUDED_HOSTS", " a_production, ,b_production "),
            ("ID_RANGE_LOOKUP_TIMEOUT_SECS", "3"),
            ("ID_RANGE_LOOKUP_CONCURRENCY", "1"),
            ("ID_RANGE_ESCALATE_UNRESOLVED", "false"),
            ("ID_RANGE_FALLBACK_TEAM", "dba"),
        ]))
        .unwrap();

        assert_eq!(settings.directory_url, "http://localhost:3000");
        assert_eq!(
            settings.excluded_hosts.into_iter().collect::<Vec<_>>(),
            vec!["a_production".to_string(), "b_production".to_string()]
        );
        assert_eq!(settings.lookup_timeout, Duration::from_secs(3));
        assert_eq!(settings.lookup_concurrency, 1);
        assert!(!settings.escalate_unresolved);
        assert_eq!(settings.fallback_team, "dba");
    }

    #[test]
    fn test_blank_text_falls_back_to_default() {
        let settings = Settings::from_vars(vars(&[("ID_RANGE_LABEL", "  ")])).unwrap();
        assert_eq!(settings.label, DEFAULT_LABEL);
    }

    #[test]
    fn test_blank_host_list_keeps_default_clusters() {
        for raw in ["", "   ", " , ,"] {
            let settings =
                Settings::from_vars(vars(&[("ID_RANGE_EXCLUDED_HOSTS", raw)])).unwrap();
            assert_eq!(settings.excluded_hosts, Settings::default().excluded_hosts);
        }
    }

    #[test]
    fn test_rejects_bad_numbers() {
        assert!(Settings::from_vars(vars(&[("ID_RANGE_LOOKUP_TIMEOUT_SECS", "soon")])).is_err());
        assert!(Settings::from_vars(vars(&[("ID_RANGE_LOOKUP_CONCURRENCY", "0")])).is_err());
        assert!(Settings::from_vars(vars(&[("ID_RANGE_ESCALATE_UNRESOLVED", "maybe")])).is_err());
    }
}
