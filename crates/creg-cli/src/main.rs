use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use creg_config::UnusedKeyPolicy;
use creg_schemas::{ReviewVerdict, ValidationSource};
use uuid::Uuid;

mod commands;

#[derive(Parser)]
#[command(name = "creg")]
#[command(about = "Client registration submission pipeline CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env overlays...)
        #[arg(required = true)]
        paths: Vec<String>,

        /// Fail instead of warning when a config key is not read by any code
        #[arg(long, default_value_t = false)]
        strict: bool,
    },

    /// Validate a draft JSON file against the standard rules, offline
    Validate {
        /// Path to the submission draft (JSON)
        file: String,

        /// Intake channel (STAFF | EXTERNAL)
        #[arg(long, default_value = "EXTERNAL")]
        source: String,
    },

    /// Run drafts through the full pipeline (Postgres store, system-of-record API)
    Process {
        /// Draft JSON files, submitted in order
        #[arg(required = true)]
        files: Vec<String>,

        #[arg(long, default_value = "EXTERNAL")]
        source: String,

        /// Layered config paths in merge order
        #[arg(long = "config", default_value = "config/base.yaml")]
        config_paths: Vec<String>,

        /// Give up waiting for submissions to settle after this many seconds
        #[arg(long, default_value_t = 120)]
        wait_secs: u64,
    },

    /// Record a reviewer verdict for a submission in NEEDS_REVIEW
    Review {
        #[arg(long)]
        submission_id: String,

        /// APPROVE | REJECT
        #[arg(long)]
        verdict: String,

        #[arg(long)]
        reviewer: String,

        #[arg(long)]
        note: Option<String>,

        #[arg(long = "config", default_value = "config/base.yaml")]
        config_paths: Vec<String>,

        #[arg(long, default_value_t = 120)]
        wait_secs: u64,
    },

    /// Re-drive sync for a submission a failed sync left in AUTO_APPROVED
    Resync {
        #[arg(long)]
        submission_id: String,

        #[arg(long = "config", default_value = "config/base.yaml")]
        config_paths: Vec<String>,
    },

    /// Audit trail utilities
    Audit {
        #[command(subcommand)]
        cmd: AuditCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,
    /// Apply SQL migrations.
    Migrate,
}

#[derive(Subcommand)]
enum AuditCmd {
    /// Verify the hash chain of an audit JSONL file
    Verify {
        /// Path to audit JSONL
        path: String,
    },
    /// Print every record for one submission
    History {
        path: String,
        #[arg(long)]
        submission_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = creg_db::connect_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    let s = creg_db::status(&pool).await?;
                    println!("db_ok={} has_submissions_table={}", s.ok, s.has_submissions_table);
                    if s.has_submissions_table {
                        for (status, n) in creg_db::count_by_status(&pool).await? {
                            println!("{status}={n}");
                        }
                    }
                }
                DbCmd::Migrate => {
                    creg_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::ConfigHash { paths, strict } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = creg_config::load_layered_yaml(&path_refs)?;
            let policy = if strict {
                UnusedKeyPolicy::Fail
            } else {
                UnusedKeyPolicy::Warn
            };
            let report = creg_config::report_unused_keys(&loaded.config_json, policy)?;
            for p in &report.unused_leaf_pointers {
                eprintln!("WARN unused config key: {p}");
            }
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Validate { file, source } => {
            let source = parse_source(&source)?;
            commands::validate::run(&file, source).await?;
        }

        Commands::Process {
            files,
            source,
            config_paths,
            wait_secs,
        } => {
            let source = parse_source(&source)?;
            commands::pipeline::process(&files, source, &config_paths, wait_secs).await?;
        }

        Commands::Review {
            submission_id,
            verdict,
            reviewer,
            note,
            config_paths,
            wait_secs,
        } => {
            let id = Uuid::parse_str(&submission_id).context("invalid submission_id uuid")?;
            let verdict = parse_verdict(&verdict)?;
            commands::pipeline::review(id, verdict, &reviewer, note, &config_paths, wait_secs)
                .await?;
        }

        Commands::Resync {
            submission_id,
            config_paths,
        } => {
            let id = Uuid::parse_str(&submission_id).context("invalid submission_id uuid")?;
            commands::pipeline::resync(id, &config_paths).await?;
        }

        Commands::Audit { cmd } => match cmd {
            AuditCmd::Verify { path } => commands::audit::verify(&path)?,
            AuditCmd::History {
                path,
                submission_id,
            } => {
                let id = Uuid::parse_str(&submission_id).context("invalid submission_id uuid")?;
                commands::audit::history(&path, id)?;
            }
        },
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn parse_source(s: &str) -> Result<ValidationSource> {
    ValidationSource::parse(s)
        .with_context(|| format!("invalid --source '{s}'. expected one of: STAFF | EXTERNAL"))
}

fn parse_verdict(s: &str) -> Result<ReviewVerdict> {
    match s.trim().to_ascii_uppercase().as_str() {
        "APPROVE" => Ok(ReviewVerdict::Approve),
        "REJECT" => Ok(ReviewVerdict::Reject),
        other => anyhow::bail!("invalid --verdict '{other}'. expected one of: APPROVE | REJECT"),
    }
}
