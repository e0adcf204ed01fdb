//! One notifier run over one alert issue.
//!
//! fetch issue -> relevance check -> label -> extract -> classify ->
//! resolve owners -> post notifications.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use crate::classify::{classify, Classification};
use crate::config::Settings;
use crate::directory::OwnershipDirectory;
use crate::error::PipelineError;
use crate::extract::{extract, is_relevant};
use crate::github::IssueStore;
use crate::notify::{Dispatcher, PlannedComment};
use crate::resolve::{resolve_all, NotificationOutcome, OutcomeStatus};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Title is not an id-range alert; nothing was touched
    Irrelevant,
    /// Issue was labeled but lists no tables
    NothingToDo,
    /// Tables were classified, resolved and notified
    Processed,
}

/// Summary of a run.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub issue: u64,
    pub status: RunStatus,
    pub label_applied: bool,
    /// Distinct table mentions found in the body
    pub mentions: usize,
    pub classification: Classification,
    /// Per-table outcomes, sorted by database
    pub outcomes: Vec<NotificationOutcome>,
    pub posted: Vec<PlannedComment>,
    pub skipped: Vec<PlannedComment>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    fn empty(issue: u64, status: RunStatus, label_applied: bool) -> Self {
        Self {
            issue,
            status,
            label_applied,
            mentions: 0,
            classification: Classification::default(),
            outcomes: Vec::new(),
            posted: Vec::new(),
            skipped: Vec::new(),
            finished_at: Utc::now(),
        }
    }

    /// Outcomes with the given status.
    pub fn with_status(&self, status: OutcomeStatus) -> impl Iterator<Item = &NotificationOutcome> {
        self.outcomes.iter().filter(move |o| o.status == status)
    }
}

/// The exhausted-table notification pipeline.
pub struct Pipeline {
    settings: Settings,
    dispatcher: Dispatcher,
    dry_run: bool,
}

impl Pipeline {
    pub fn new(settings: Settings) -> Result<Self, PipelineError> {
        let dispatcher = Dispatcher::new(&settings)?;
        Ok(Self {
            settings,
            dispatcher,
            dry_run: false,
        })
    }

    /// Render notifications without labeling or commenting.
    #[must_use]
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Process one issue.
    ///
    /// Lookup failures are recorded in the report. Only failures to read
    /// the issue, label it, or post a comment are returned as errors.
    #[instrument(skip(self, store, directory))]
    pub async fn run<S, D>(
        &self,
        store: &S,
        directory: &D,
        issue_number: u64,
    ) -> Result<RunReport, PipelineError>
    where
        S: IssueStore + ?Sized,
        D: OwnershipDirectory + ?Sized,
    {
        let issue = store
            .get_issue(issue_number)
            .await
            .map_err(|source| PipelineError::FetchIssue {
                issue: issue_number,
                source,
            })?;

        if !is_relevant(&issue.title, &self.settings.title_marker) {
            info!(title = %issue.title, "Not an id-range alert, skipping");
            return Ok(RunReport::empty(issue_number, RunStatus::Irrelevant, false));
        }

        let label_applied = if self.dry_run {
            false
        } else {
            store
                .add_label(issue_number, &self.settings.label)
                .await
                .map_err(|source| PipelineError::Label {
                    issue: issue_number,
                    source,
                })?;
            true
        };

        let mentions = extract(issue.body());
        if mentions.is_empty() {
            info!("Looks good! No exhausted tables found in the issue");
            return Ok(RunReport::empty(
                issue_number,
                RunStatus::NothingToDo,
                label_applied,
            ));
        }

        let classification = classify(&mentions, &self.settings.excluded_hosts);
        info!(
            mentions = mentions.len(),
            monolith = ?classification.monolith,
            non_monolith = ?classification.non_monolith,
            "Classified exhausted tables"
        );

        let resolutions = resolve_all(
            directory,
            &classification.monolith,
            self.settings.lookup_concurrency,
            self.settings.lookup_timeout,
        )
        .await;

        let planned = self.dispatcher.plan(
            &resolutions.owners,
            &classification.non_monolith,
            &resolutions.unresolved,
        )?;
        let delivery = self
            .dispatcher
            .deliver(store, issue_number, planned, self.dry_run)
            .await?;

        let mut outcomes = resolutions.outcomes();
        outcomes.extend(
            classification
                .non_monolith
                .iter()
                .map(|database| NotificationOutcome {
                    database: database.clone(),
                    status: OutcomeStatus::OutOfTopology,
                    detail: "cluster outside the monolith".to_string(),
                }),
        );
        outcomes.sort_by(|a, b| a.database.cmp(&b.database));

        info!(
            resolved = resolutions.owners.len(),
            unresolved = resolutions.unresolved.len(),
            failed = resolutions.failed.len(),
            posted = delivery.posted.len(),
            skipped = delivery.skipped.len(),
            "Run complete"
        );

        Ok(RunReport {
            issue: issue_number,
            status: RunStatus::Processed,
            label_applied,
            mentions: mentions.len(),
            classification,
            outcomes,
            posted: delivery.posted,
            skipped: delivery.skipped,
            finished_at: Utc::now(),
        })
    }
}
