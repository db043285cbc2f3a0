use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

mod changes;
mod db;
mod evidence;
mod models;
mod report;
mod resolve;

use models::RosterSnapshot;

#[derive(Parser)]
#[command(name = "clan-activity-engine")]
#[command(about = "Roster change detection and activity classification for clan snapshots", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data (two snapshots one day apart)
    Seed,
    /// Ingest a roster snapshot from a JSON file
    Ingest {
        #[arg(long)]
        json: PathBuf,
    },
    /// Detect changes between the two most recent snapshots
    Changes {
        #[arg(long)]
        clan_tag: String,
        /// Persist detected events to the change log
        #[arg(long, default_value_t = false)]
        save: bool,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Resolve per-member activity verdicts
    Activity {
        #[arg(long)]
        clan_tag: String,
        /// Restrict output to one member tag
        #[arg(long)]
        member: Option<String>,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Generate a markdown report
    Report {
        #[arg(long)]
        clan_tag: String,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Export per-member verdicts as CSV
    Export {
        #[arg(long)]
        clan_tag: String,
        #[arg(long, default_value = "verdicts.csv")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Ingest { json } => {
            let raw = std::fs::read_to_string(&json)
                .with_context(|| format!("failed to read {}", json.display()))?;
            let snapshot: RosterSnapshot = serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse {}", json.display()))?;
            db::insert_snapshot(&pool, &snapshot).await?;
            println!(
                "Ingested snapshot of {} ({} members, captured {}).",
                snapshot.clan_tag,
                snapshot.members.len(),
                snapshot.captured_at.format("%Y-%m-%d %H:%M UTC")
            );
        }
        Commands::Changes {
            clan_tag,
            save,
            json,
        } => {
            let (previous, current) = load_pair(&pool, &clan_tag).await?;
            let previous = previous.context(
                "only one snapshot stored for this clan; ingest another to detect changes",
            )?;
            let events = changes::detect_changes(&previous, &current);

            if json {
                println!("{}", serde_json::to_string_pretty(&events)?);
            } else if events.is_empty() {
                println!("No changes between the last two snapshots.");
            } else {
                println!(
                    "{} changes between {} and {}:",
                    events.len(),
                    previous.captured_at.format("%Y-%m-%d %H:%M"),
                    current.captured_at.format("%Y-%m-%d %H:%M")
                );
                for event in events.iter() {
                    println!("- [{}] {}", event.kind.type_label(), event.description);
                }
            }

            if save {
                let written = db::record_changes(&pool, &clan_tag, Utc::now(), &events).await?;
                println!("Recorded {written} events to the change log.");
            }
        }
        Commands::Activity {
            clan_tag,
            member,
            json,
        } => {
            let (previous, current) = load_pair(&pool, &clan_tag).await?;
            let now = Utc::now();
            let (_, mut assessments) = resolve::assess_roster(previous.as_ref(), &current, now);

            if let Some(tag) = member {
                assessments.retain(|a| a.member_tag == tag);
                if assessments.is_empty() {
                    println!("No member {tag} in the latest snapshot.");
                    return Ok(());
                }
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&assessments)?);
            } else {
                for assessment in assessments.iter() {
                    match &assessment.verdict {
                        Some(verdict) => println!(
                            "- {} ({}): {} [{}] {} ({} days since activity)",
                            assessment.member_name,
                            assessment.member_tag,
                            verdict.activity_level,
                            verdict.confidence,
                            verdict.evidence.join("; "),
                            verdict.days_since_activity
                        ),
                        None => println!(
                            "- {} ({}): unknown (no evidence)",
                            assessment.member_name, assessment.member_tag
                        ),
                    }
                }
            }
        }
        Commands::Report { clan_tag, out } => {
            let (previous, current) = load_pair(&pool, &clan_tag).await?;
            let now = Utc::now();
            let (events, assessments) = resolve::assess_roster(previous.as_ref(), &current, now);
            let report = report::build_report(
                &current.clan_name,
                &current.clan_tag,
                now,
                current.captured_at,
                &events,
                &assessments,
            );
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export { clan_tag, out } => {
            let (previous, current) = load_pair(&pool, &clan_tag).await?;
            let now = Utc::now();
            let (_, assessments) = resolve::assess_roster(previous.as_ref(), &current, now);
            let file = std::fs::File::create(&out)
                .with_context(|| format!("failed to create {}", out.display()))?;
            let written = report::write_verdicts_csv(file, &assessments)?;
            println!("Exported {written} verdicts to {}.", out.display());
        }
    }

    Ok(())
}

/// The two most recent snapshots for a clan: (previous, current). The engine
/// still runs with a single snapshot; only change detection needs both.
async fn load_pair(
    pool: &PgPool,
    clan_tag: &str,
) -> anyhow::Result<(Option<RosterSnapshot>, RosterSnapshot)> {
    let mut snapshots = db::latest_snapshots(pool, clan_tag, 2).await?;
    if snapshots.is_empty() {
        anyhow::bail!("no snapshots stored for clan {clan_tag}; run ingest first");
    }
    let current = snapshots.remove(0);
    let previous = snapshots.pop();
    Ok((previous, current))
}
