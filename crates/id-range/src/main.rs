//! CLI for the id-range alert notifier
//!
//! Run `id-range --help` for usage information. In GitHub Actions the
//! repository, issue and token come from `REPO`, `ISSUE_NUMBER` and
//! `GITHUB_TOKEN`.

// CLI binaries legitimately need println! for user output
#![allow(clippy::disallowed_macros)]

use anyhow::{Context, Result};
use clap::Parser;
use id_range::{
    annotation, AnnotationLevel, GitHubIssues, HttpDirectory, OutcomeStatus, Pipeline, Repo,
    RunReport, RunStatus, Settings,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "id-range")]
#[command(about = "Route primary-key exhaustion alerts to the teams owning the tables")]
#[command(version)]
struct Cli {
    /// Repository in owner/repo format
    #[arg(short, long, env = "REPO")]
    repo: String,

    /// Alert issue number
    #[arg(short, long, env = "ISSUE_NUMBER")]
    issue: u64,

    /// GitHub token used to read and comment on the issue
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: String,

    /// Ownership directory base URL (overrides ID_RANGE_DIRECTORY_URL)
    #[arg(long)]
    directory_url: Option<String>,

    /// Render comments that would be posted, without labeling or posting anything
    #[arg(short, long)]
    dry_run: bool,

    /// Print GitHub Actions annotations for tables that need attention
    #[arg(short, long)]
    annotate: bool,

    /// Output format: json, text
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Log format: json, text
    #[arg(long, default_value = "text")]
    log_format: OutputFormat,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the report and annotations.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    match cli.log_format {
        OutputFormat::Text => registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init(),
        OutputFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }

    let mut settings = Settings::from_env().context("Invalid id-range settings")?;
    if let Some(url) = cli.directory_url {
        settings.directory_url = url;
    }

    let repo = Repo::parse(&cli.repo)?;
    let store = GitHubIssues::new(&settings.github_api_url, &cli.token, repo)
        .context("Failed to create GitHub client")?;
    let directory = HttpDirectory::new(&settings.directory_url, settings.lookup_timeout)
        .context("Failed to create ownership directory client")?;

    let pipeline = Pipeline::new(settings)?.dry_run(cli.dry_run);
    let report = pipeline
        .run(&store, &directory, cli.issue)
        .await
        .with_context(|| format!("id-range run failed for {}#{}", cli.repo, cli.issue))?;

    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_report(&report, cli.dry_run),
    }

    if cli.annotate {
        print_annotations(&report);
    }

    Ok(())
}

fn print_report(report: &RunReport, dry_run: bool) {
    match report.status {
        RunStatus::Irrelevant => {
            println!("Issue #{} is not an id-range alert, nothing to do", report.issue);
            return;
        }
        RunStatus::NothingToDo => {
            println!("Looks good! Issue #{} lists no exhausted tables", report.issue);
            return;
        }
        RunStatus::Processed => {}
    }

    println!(
        "Issue #{}: {} table(s) from {} mention(s)\n",
        report.issue,
        report.outcomes.len(),
        report.mentions
    );
    for outcome in &report.outcomes {
        println!(
            "  {:<32} {:<16} {}",
            outcome.database,
            outcome.status.as_str(),
            outcome.detail
        );
    }
    println!();

    if dry_run {
        for comment in &report.posted {
            println!("=== Dry run: would post {} comment ===\n", comment.kind.as_str());
            println!("{}", comment.body);
        }
        println!("{} comment(s) already present", report.skipped.len());
        return;
    }

    println!(
        "Posted {} comment(s), {} already present",
        report.posted.len(),
        report.skipped.len()
    );
}

fn print_annotations(report: &RunReport) {
    for outcome in &report.outcomes {
        let (level, reason) = match outcome.status {
            OutcomeStatus::Resolved => continue,
            OutcomeStatus::Unresolved => (AnnotationLevel::Warning, "no owner registered"),
            OutcomeStatus::OutOfTopology => {
                (AnnotationLevel::Warning, "cluster outside the monolith")
            }
            OutcomeStatus::LookupFailed => (AnnotationLevel::Error, "ownership lookup failed"),
        };
        let title = format!("{}: {reason}", outcome.database);
        let message = format!(
            "Table `{}` has exhausted over 70% of its id range.\n{}",
            outcome.database, outcome.detail
        );
        println!("{}", annotation(level, &title, &message));
    }
}
