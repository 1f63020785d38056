//! MedSync - EHR/pharmacy integration CLI
//!
//! The `medsync` command exposes the reconciliation and retry engines for
//! scripting and local inspection.
//!
//! ## Commands
//!
//! - `diff`: Compare two medication list files
//! - `retry`: Show the backoff schedule for failed event ids
//! - `suggest`: Suggest catalogue mappings for a source code
//! - `demo`: Run the seeded integration dashboard scenario
//! - `login` / `whoami`: Issue and inspect session tokens

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, Level};

use medsync_core::{
    parse_medication_list, suggest_mappings, system_clock, Authenticator, EventDirection,
    IngestRequest, IntegrationKpis, IntegrationService, LoginRequest, MappingSuggestion,
    MedicationDiff, MedicationDiffEngine, MedicationItem, MedsyncConfig, RetryEntry,
    RetryScheduler, Session, DISPENSE_PUSH, METRICS,
};

#[derive(Parser)]
#[command(name = "medsync")]
#[command(author = "MedSync Cloud")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "MedSync EHR/pharmacy integration toolkit", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile a medication list against a previous one
    Diff {
        /// Previous medication list (JSON array of {code, dose})
        previous: PathBuf,

        /// New medication list (JSON array of {code, dose})
        next: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Record failures for event ids, in order, and print the retry queue
    Retry {
        /// Event ids; repeat an id to record another failure
        #[arg(required = true)]
        event_ids: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Suggest pharmacy catalogue targets for a source drug code
    Suggest {
        source_code: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the seeded dashboard scenario: manual sync, a failure, a diff
    Demo {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Log in as a demo user and print a session token
    Login {
        #[arg(long)]
        email: String,

        #[arg(long)]
        password: String,
    },

    /// Resolve a session token
    Whoami { token: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    medsync_core::init_tracing(cli.json_logs, level);

    let config = MedsyncConfig::from_env().context("Invalid MEDSYNC_* configuration")?;

    let result = match cli.command {
        Commands::Diff {
            previous,
            next,
            json,
        } => cmd_diff(&previous, &next, json),
        Commands::Retry { event_ids, json } => cmd_retry(&config, &event_ids, json),
        Commands::Suggest { source_code, json } => cmd_suggest(&source_code, json),
        Commands::Demo { json } => cmd_demo(config, json).await,
        Commands::Login { email, password } => cmd_login(&config, &email, &password),
        Commands::Whoami { token } => cmd_whoami(&config, &token),
    };

    if cli.verbose {
        METRICS.flush();
    }
    result
}

fn read_medication_file(path: &Path) -> Result<Vec<MedicationItem>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read medication list: {:?}", path))?;
    parse_medication_list(&content).with_context(|| format!("Invalid medication list in {:?}", path))
}

fn cmd_diff(previous: &Path, next: &Path, json: bool) -> Result<()> {
    let previous = read_medication_file(previous)?;
    let next = read_medication_file(next)?;

    let mut engine = MedicationDiffEngine::new(previous);
    let diff = engine.compute_diff(&next);

    if json {
        println!("{}", serde_json::to_string_pretty(&diff)?);
    } else {
        println!("{}", render_diff_text(&diff));
    }
    Ok(())
}

fn cmd_retry(config: &MedsyncConfig, event_ids: &[String], json: bool) -> Result<()> {
    let mut retries = RetryScheduler::new(config.retry, system_clock());
    for id in event_ids {
        retries.schedule_retry(id);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(retries.entries())?);
    } else {
        println!("{}", render_retry_queue_text(retries.entries()));
    }
    Ok(())
}

fn cmd_suggest(source_code: &str, json: bool) -> Result<()> {
    let suggestion = suggest_mappings(source_code);
    if json {
        println!("{}", serde_json::to_string_pretty(&suggestion)?);
    } else {
        println!("{}", render_suggestion_text(&suggestion));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct DemoReport {
    manual_sync_job: String,
    failed_event: String,
    diff: MedicationDiff,
    kpis: IntegrationKpis,
    retry_queue: Vec<RetryEntry>,
}

async fn run_demo(config: MedsyncConfig) -> DemoReport {
    let svc = IntegrationService::with_seed_data(config, system_clock());

    let sync = svc.trigger_manual_sync().await;
    info!(job_id = %sync.job_id, "manual sync finished");

    let failed = svc.ingest_failure_event(
        IngestRequest::new(DISPENSE_PUSH, EventDirection::Out)
            .with_payload(serde_json::json!({ "target": "pharmacy" })),
        "pharmacy endpoint returned 503",
    );

    let diff = svc.compute_medication_diff(&[
        MedicationItem::new("RXNORM:111", "20mg"),
        MedicationItem::new("RXNORM:333", "1mg"),
    ]);

    DemoReport {
        manual_sync_job: sync.job_id.to_string(),
        failed_event: failed.id.to_string(),
        diff,
        kpis: svc.kpis(),
        retry_queue: svc.retry_queue(),
    }
}

async fn cmd_demo(config: MedsyncConfig, json: bool) -> Result<()> {
    let report = run_demo(config).await;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", render_demo_text(&report));
    }
    Ok(())
}

fn cmd_login(config: &MedsyncConfig, email: &str, password: &str) -> Result<()> {
    let auth = Authenticator::with_demo_users(config, system_clock())?;
    let (token, session) = auth
        .authenticate(&LoginRequest::new(email, password))
        .context("Login failed")?;
    info!(user_id = %session.user_id, role = %session.role, "logged in");
    println!("{}", token);
    Ok(())
}

fn cmd_whoami(config: &MedsyncConfig, token: &str) -> Result<()> {
    let auth = Authenticator::new(config, system_clock());
    let session = auth.resolve(token).context("Token rejected")?;
    println!("{}", render_session_text(&session));
    Ok(())
}

fn render_diff_text(diff: &MedicationDiff) -> String {
    let mut out = String::new();
    out.push_str("Medication Diff\n");
    out.push_str("===============\n");
    out.push_str(&format!("added: {}\n", diff.added.len()));
    out.push_str(&format!("removed: {}\n", diff.removed.len()));
    out.push_str(&format!("changed: {}\n", diff.changed.len()));

    if !diff.added.is_empty() {
        out.push_str("\nAdded:\n");
        for item in &diff.added {
            out.push_str(&format!("  + {} {}\n", item.code, item.dose));
        }
    }
    if !diff.removed.is_empty() {
        out.push_str("\nRemoved:\n");
        for item in &diff.removed {
            out.push_str(&format!("  - {} {}\n", item.code, item.dose));
        }
    }
    if !diff.changed.is_empty() {
        out.push_str("\nChanged:\n");
        for change in &diff.changed {
            out.push_str(&format!(
                "  ~ {} {} -> {}\n",
                change.to.code, change.from.dose, change.to.dose
            ));
        }
    }

    out.trim_end().to_string()
}

fn render_retry_queue_text(entries: &[RetryEntry]) -> String {
    if entries.is_empty() {
        return "Retry queue is empty".to_string();
    }
    let mut out = String::new();
    out.push_str(&format!("{:<38} {:>8}  {}\n", "EVENT", "ATTEMPTS", "NEXT ATTEMPT"));
    for entry in entries {
        out.push_str(&format!(
            "{:<38} {:>8}  {}\n",
            entry.event_id,
            entry.attempts,
            entry.next_attempt_at.to_rfc3339()
        ));
    }
    out.trim_end().to_string()
}

fn render_suggestion_text(suggestion: &MappingSuggestion) -> String {
    let mut out = format!("Suggestions for {}\n", suggestion.source_code);
    for candidate in &suggestion.candidates {
        out.push_str(&format!(
            "  {:<14} {:>5.0}%  {}\n",
            candidate.target_id,
            candidate.confidence * 100.0,
            candidate.label
        ));
    }
    out.trim_end().to_string()
}

fn render_demo_text(report: &DemoReport) -> String {
    format!(
        "Manual sync job: {}\nFailed event: {}\n\n{}\n\nKPIs\n====\nsuccess_rate: {:.1}%\navg_latency_ms: {}\npending_mappings: {}\nretry_queue: {}\n\n{}",
        report.manual_sync_job,
        report.failed_event,
        render_diff_text(&report.diff),
        report.kpis.success_rate * 100.0,
        report.kpis.avg_latency_ms,
        report.kpis.pending_mappings,
        report.kpis.retry_queue,
        render_retry_queue_text(&report.retry_queue),
    )
}

fn render_session_text(session: &Session) -> String {
    format!(
        "user_id: {}\nrole: {}\nexpires_at: {}",
        session.user_id,
        session.role,
        session.expires_at.to_rfc3339()
    )
}
