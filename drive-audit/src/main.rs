//! drive-audit: list every file of a Google Workspace domain together with who
//! can access it, and remove a person's direct grants everywhere.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use drive_audit_core::capture::Capturer;
use drive_audit_core::config::Config;
use drive_audit_core::google::GoogleWorkspace;
use drive_audit_core::report;
use drive_audit_core::revocation::{self, RevocationStatus};
use drive_audit_core::store::SnapshotStore;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "drive-audit")]
#[command(about = "A utility to assist in the audit of Google Drive")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture all files of all users, with permissions, into the database
    Audit {
        /// Domain name to audit
        #[arg(short, long)]
        domain: Option<String>,

        /// Email address of a domain administrator
        #[arg(short, long)]
        admin_email: Option<String>,

        /// Database file
        #[arg(short = 'b', long)]
        database: Option<PathBuf>,

        /// Service account credentials file
        #[arg(short, long)]
        credentials: Option<PathBuf>,

        /// Maximum number of listings running at once
        #[arg(long)]
        concurrency: Option<usize>,

        /// Do not show progress
        #[arg(short, long)]
        quiet: bool,
    },

    /// Write the database as CSV, one row per file and person
    Report {
        /// Database file
        #[arg(short = 'b', long)]
        database: Option<PathBuf>,

        /// Output file, `-` for stdout
        #[arg(short, long, default_value = "-")]
        output: String,
    },

    /// Remove all direct permissions of a user on every file in the database
    Unshare {
        /// User email to remove permissions from
        #[arg(short, long)]
        user: String,

        /// Database file
        #[arg(short = 'b', long)]
        database: Option<PathBuf>,

        /// Service account credentials file
        #[arg(short, long)]
        credentials: Option<PathBuf>,

        /// Print actions instead of performing them
        #[arg(short = 'n', long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;

    match cli.command {
        Commands::Audit {
            domain,
            admin_email,
            database,
            credentials,
            concurrency,
            quiet,
        } => {
            config.domain = domain.or(config.domain);
            config.admin_email = admin_email.or(config.admin_email);
            override_path(&mut config.database_path, database);
            override_path(&mut config.credentials_path, credentials);
            if let Some(n) = concurrency {
                config.max_concurrency = n;
            }
            run_audit(&config, !quiet).await
        }
        Commands::Report { database, output } => {
            override_path(&mut config.database_path, database);
            run_report(&config, &output)
        }
        Commands::Unshare {
            user,
            database,
            credentials,
            dry_run,
        } => {
            override_path(&mut config.database_path, database);
            override_path(&mut config.credentials_path, credentials);
            run_unshare(&config, &user, dry_run).await
        }
    }
}

fn override_path(target: &mut PathBuf, value: Option<PathBuf>) {
    if let Some(v) = value {
        *target = v;
    }
}

fn workspace(config: &Config, admin_email: &str) -> Result<GoogleWorkspace> {
    GoogleWorkspace::from_credentials(&config.credentials_path, admin_email, config.page_size)
        .with_context(|| {
            format!(
                "loading credentials from {}",
                config.credentials_path.display()
            )
        })
}

async fn run_audit(config: &Config, show_progress: bool) -> Result<()> {
    let domain = config
        .domain
        .as_deref()
        .ok_or_else(|| anyhow!("--domain (or DRIVE_AUDIT_DOMAIN) is required"))?;
    let admin_email = config
        .admin_email
        .as_deref()
        .ok_or_else(|| anyhow!("--admin-email (or DRIVE_AUDIT_ADMIN_EMAIL) is required"))?;
    let google = workspace(config, admin_email)?;

    let capturer = Capturer::new(&google, config.max_concurrency);
    let progress = show_progress.then(|| {
        let mut updates = WatchStream::new(capturer.subscribe());
        tokio::spawn(async move {
            while let Some(count) = updates.next().await {
                eprint!("\u{1B}[2K\rFiles processed: {count}");
            }
            eprintln!();
        })
    });

    let result = capturer.capture_domain(&google, domain).await;
    drop(capturer);
    if let Some(handle) = progress {
        if let Err(e) = handle.await {
            warn!(error = %e, "progress reporter stopped abnormally");
        }
    }
    let snapshot = result?;

    SnapshotStore::new(&config.database_path).save(&snapshot)?;
    info!(
        files = snapshot.len(),
        database = %config.database_path.display(),
        "audit complete"
    );
    Ok(())
}

fn run_report(config: &Config, output: &str) -> Result<()> {
    let snapshot = SnapshotStore::new(&config.database_path)
        .load()
        .with_context(|| format!("loading {}", config.database_path.display()))?;
    let rows = if output == "-" {
        let stdout = std::io::stdout();
        report::write_csv(&snapshot, stdout.lock())?
    } else {
        let file = std::fs::File::create(output)
            .with_context(|| format!("creating {output}"))?;
        let mut writer = BufWriter::new(file);
        let rows = report::write_csv(&snapshot, &mut writer)?;
        writer.flush()?;
        rows
    };
    info!(rows, "report written");
    Ok(())
}

async fn run_unshare(config: &Config, user: &str, dry_run: bool) -> Result<()> {
    let snapshot = SnapshotStore::new(&config.database_path)
        .load()
        .with_context(|| format!("loading {}", config.database_path.display()))?;
    let targets = revocation::plan(&snapshot, user);
    info!(user, targets = targets.len(), dry_run, "planned permission removals");
    if targets.is_empty() {
        return Ok(());
    }

    // Deletes only impersonate file owners; the admin subject is never used.
    let google = workspace(config, "")?;
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    let report = revocation::execute(&google, &targets, dry_run, &cancel).await;
    let mut stdout = std::io::stdout().lock();
    for outcome in &report.outcomes {
        let status = match &outcome.status {
            RevocationStatus::Revoked => "revoked".to_string(),
            RevocationStatus::DryRun => "dry run".to_string(),
            RevocationStatus::Failed(e) => format!("failed: {e}"),
            RevocationStatus::Cancelled => "cancelled".to_string(),
        };
        writeln!(
            stdout,
            "{}\t{}\towner={}\t{}",
            outcome.target.file_id, outcome.target.permission_id, outcome.target.owner_email, status
        )?;
    }

    let failed = report.failed_count();
    let cancelled = report.cancelled_count();
    if failed > 0 || cancelled > 0 {
        bail!("{failed} permission deletes failed, {cancelled} not attempted");
    }
    Ok(())
}
