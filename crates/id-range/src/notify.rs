//! Notification rendering and delivery.
//!
//! Three kinds of comments can be posted on an alert issue:
//! - one owner comment per resolved table, addressed to the owning team
//! - one topology escalation listing every table on an excluded cluster
//! - one ownership-gap escalation listing tables nobody owns
//!
//! Every comment starts with a hidden marker. Before posting, existing
//! comments are scanned and any comment whose marker is already present is
//! skipped, which makes re-running the notifier on the same issue safe.

use std::collections::BTreeSet;
use std::fmt;

use handlebars::Handlebars;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

use crate::config::Settings;
use crate::directory::OwnershipRecord;
use crate::error::PipelineError;
use crate::github::IssueStore;

const MARKER_PREFIX: &str = "<!-- id-range:";

const OWNER_TEMPLATE: &str = r"{{marker}}
:wave: Hi @{{org}}/{{team}},

The [`{{service}}` service]({{catalog_url}}/{{service}}), which you maintain, owns the `{{database}}` table, which **has exhausted over 70% of its id range**. As id exhaustion can cause availability incidents, it is important that you track and prioritize work to remediate this situation. Please feel free to reach out to {{support_channel}} for support and next steps.

If your team does not maintain the table, please update the ownership information in `db/tableowners.yaml` and mention the correct team in this issue.

Thanks for your help! :heart:
";

const TOPOLOGY_TEMPLATE: &str = r"{{marker}}
:wave: Hi @{{org}}/{{team}},

The following tables have exhausted over 70% of their id range, but they live on clusters outside the monolith, so their owners could not be looked up:

{{#each databases}}
- `{{this}}`
{{/each}}

Please route them to the right teams and update the excluded cluster list of the id-range notifier if the topology has changed.
";

const OWNERSHIP_GAP_TEMPLATE: &str = r"{{marker}}
:wave: Hi @{{org}}/{{team}},

The following monolith tables have exhausted over 70% of their id range, but no service or team is registered as their owner:

{{#each databases}}
- `{{this}}`
{{/each}}

Please find the owning teams and register them in `db/tableowners.yaml` so future alerts reach them directly.
";

/// Kind of notification comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentKind {
    Owner,
    Topology,
    OwnershipGap,
}

impl CommentKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Topology => "topology",
            Self::OwnershipGap => "ownership-gap",
        }
    }
}

/// A rendered comment, ready to post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedComment {
    pub kind: CommentKind,
    /// Hidden marker identifying this notification on the issue
    pub marker: String,
    /// Team the comment is addressed to
    pub team: String,
    /// Tables covered by the comment
    pub databases: Vec<String>,
    pub body: String,
}

/// Result of delivering planned comments.
#[derive(Debug, Default, Serialize)]
pub struct Delivery {
    pub posted: Vec<PlannedComment>,
    /// Comments already present on the issue
    pub skipped: Vec<PlannedComment>,
}

/// Build the idempotency marker for a comment.
#[must_use]
pub fn marker(kind: CommentKind, databases: &[String]) -> String {
    format!("{MARKER_PREFIX}{}:{} -->", kind.as_str(), databases.join(","))
}

/// Check whether any existing comment already carries `marker`.
#[must_use]
pub fn already_posted(existing: &[String], marker: &str) -> bool {
    existing.iter().any(|body| body.contains(marker))
}

/// Renders and posts notification comments.
pub struct Dispatcher {
    templates: Handlebars<'static>,
    org: String,
    fallback_team: String,
    support_channel: String,
    catalog_url: String,
    escalate_unresolved: bool,
}

impl Dispatcher {
    /// Create a dispatcher with the built-in comment templates.
    pub fn new(settings: &Settings) -> Result<Self, PipelineError> {
        let mut templates = Handlebars::new();
        templates.set_strict_mode(true);
        templates.register_escape_fn(handlebars::no_escape);
        templates.register_template_string("owner", OWNER_TEMPLATE)?;
        templates.register_template_string("topology", TOPOLOGY_TEMPLATE)?;
        templates.register_template_string("ownership-gap", OWNERSHIP_GAP_TEMPLATE)?;

        Ok(Self {
            templates,
            org: settings.team_org.clone(),
            fallback_team: settings.fallback_team.clone(),
            support_channel: settings.support_channel.clone(),
            catalog_url: settings.catalog_url.trim_end_matches('/').to_string(),
            escalate_unresolved: settings.escalate_unresolved,
        })
    }

    /// Render the comment for one resolved owner.
    pub fn owner_comment(&self, owner: &OwnershipRecord) -> Result<PlannedComment, PipelineError> {
        let databases = vec![owner.database.clone()];
        let marker = marker(CommentKind::Owner, &databases);
        let body = self.templates.render(
            "owner",
            &json!({
                "marker": marker,
                "org": self.org,
                "team": owner.team,
                "service": owner.service,
                "database": owner.database,
                "catalog_url": self.catalog_url,
                "support_channel": self.support_channel,
            }),
        )?;

        Ok(PlannedComment {
            kind: CommentKind::Owner,
            marker,
            team: owner.team.clone(),
            databases,
            body,
        })
    }

    /// Render a batched escalation comment, or `None` when there is nothing to list.
    pub fn escalation_comment(
        &self,
        kind: CommentKind,
        databases: &BTreeSet<String>,
    ) -> Result<Option<PlannedComment>, PipelineError> {
        if databases.is_empty() {
            return Ok(None);
        }

        let databases: Vec<String> = databases.iter().cloned().collect();
        let marker = marker(kind, &databases);
        let body = self.templates.render(
            kind.as_str(),
            &json!({
                "marker": marker,
                "org": self.org,
                "team": self.fallback_team,
                "databases": databases,
            }),
        )?;

        Ok(Some(PlannedComment {
            kind,
            marker,
            team: self.fallback_team.clone(),
            databases,
            body,
        }))
    }

    /// Render every comment for a run, in posting order.
    pub fn plan(
        &self,
        owners: &[OwnershipRecord],
        non_monolith: &BTreeSet<String>,
        unresolved: &BTreeSet<String>,
    ) -> Result<Vec<PlannedComment>, PipelineError> {
        let mut planned = owners
            .iter()
            .map(|owner| self.owner_comment(owner))
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(comment) = self.escalation_comment(CommentKind::Topology, non_monolith)? {
            planned.push(comment);
        }

        if self.escalate_unresolved {
            if let Some(comment) =
                self.escalation_comment(CommentKind::OwnershipGap, unresolved)?
            {
                planned.push(comment);
            }
        }

        Ok(planned)
    }

    /// Post planned comments that are not already on the issue.
    ///
    /// With `dry_run` existing comments are still read but nothing is
    /// written; comments that would be posted are reported as posted.
    pub async fn deliver<S>(
        &self,
        store: &S,
        issue: u64,
        planned: Vec<PlannedComment>,
        dry_run: bool,
    ) -> Result<Delivery, PipelineError>
    where
        S: IssueStore + ?Sized,
    {
        let mut delivery = Delivery::default();
        if planned.is_empty() {
            return Ok(delivery);
        }

        let existing = store
            .list_comments(issue)
            .await
            .map_err(|source| PipelineError::Notify { issue, source })?;

        for comment in planned {
            if already_posted(&existing, &comment.marker) {
                debug!(
                    issue,
                    kind = comment.kind.as_str(),
                    databases = ?comment.databases,
                    "Notification already on issue, skipping"
                );
                delivery.skipped.push(comment);
                continue;
            }

            if dry_run {
                info!(
                    issue,
                    kind = comment.kind.as_str(),
                    team = %comment.team,
                    "Dry run, not posting notification"
                );
                delivery.posted.push(comment);
                continue;
            }

            store
                .add_comment(issue, &comment.body)
                .await
                .map_err(|source| PipelineError::Notify { issue, source })?;
            info!(
                issue,
                kind = comment.kind.as_str(),
                team = %comment.team,
                databases = ?comment.databases,
                "Notification posted"
            );
            delivery.posted.push(comment);
        }

        Ok(delivery)
    }
}

/// Severity of a workflow-command annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationLevel {
    Notice,
    Warning,
    Error,
}

impl fmt::Display for AnnotationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Notice => write!(f, "notice"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Encode a workflow-command message so it stays on one line.
#[must_use]
pub fn escape_annotation_data(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Encode a workflow-command property value.
#[must_use]
pub fn escape_annotation_property(value: &str) -> String {
    escape_annotation_data(value)
        .replace(':', "%3A")
        .replace(',', "%2C")
}

/// Render a GitHub Actions annotation (`::warning title=..::message`).
#[must_use]
pub fn annotation(level: AnnotationLevel, title: &str, message: &str) -> String {
    format!(
        "::{level} title={}::{}",
        escape_annotation_property(title),
        escape_annotation_data(message)
    )
}
