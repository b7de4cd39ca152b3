mod catalog;
mod db;
mod fetcher;
mod github;
mod parser;
mod settings;
mod sources;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;

use catalog::CatalogDocument;
use parser::SkipReason;
use settings::Settings;

#[derive(Parser)]
#[command(
    name = "project_catalog",
    about = "Build projects.json from metadata embedded in GitHub READMEs"
)]
struct Cli {
    /// Project list, one owner/name per line (default: projects-list.txt)
    #[arg(long, global = true)]
    list: Option<PathBuf>,
    /// Catalog output path (default: projects.json)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,
    /// Snapshot database path (default: data/catalog.sqlite)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch README and repo info for every listed project
    Fetch {
        /// Max repos to fetch (default: all)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Build the catalog from fetched snapshots
    Build,
    /// Fetch + build in one pipeline
    Run {
        /// Max repos to fetch and build (default: all)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Validate the metadata block of a local README
    Check {
        file: PathBuf,
    },
    /// Show snapshot statistics
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let mut settings = Settings::load()?;
    if let Some(list) = cli.list {
        settings.projects_list = list;
    }
    if let Some(output) = cli.output {
        settings.output_path = output;
    }
    if let Some(db_path) = cli.db {
        settings.db_path = db_path;
    }

    let result = match cli.command {
        Commands::Fetch { limit } => {
            let repos = sources::read_source_list(&settings.projects_list)?;
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            fetch(&settings, &conn, limited(&repos, limit)).await
        }
        Commands::Build => {
            let repos = sources::read_source_list(&settings.projects_list)?;
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            build(&settings, &conn, &repos)
        }
        Commands::Run { limit } => {
            let repos = sources::read_source_list(&settings.projects_list)?;
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let repos = limited(&repos, limit);
            println!("Found {} repositories to process", repos.len());
            fetch(&settings, &conn, repos).await?;
            build(&settings, &conn, repos)
        }
        Commands::Check { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            match parser::extract_record(&text) {
                Ok(record) => {
                    println!("{}", serde_json::to_string_pretty(&record)?);
                    if record.get("number").is_none() {
                        println!("\nNote: no `number`, this project will be listed last.");
                    }
                    Ok(())
                }
                Err(reason) => bail!("{}: {}", file.display(), reason),
            }
        }
        Commands::Stats => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Snapshots:   {}", s.snapshots);
            println!("Repos:       {}", s.repos);
            println!("With README: {}", s.with_readme);
            println!("Errors:      {}", s.errors);
            match s.last_build {
                Some(b) => println!(
                    "Last build:  {} ({} projects, {} skipped) -> {}",
                    b.generated_at, b.total_count, b.skipped, b.output_path
                ),
                None => println!("Last build:  never"),
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// First `limit` repos of the list, or all of them.
fn limited(repos: &[String], limit: Option<usize>) -> &[String] {
    &repos[..limit.map_or(repos.len(), |n| n.min(repos.len()))]
}

async fn fetch(
    settings: &Settings,
    conn: &rusqlite::Connection,
    repos: &[String],
) -> anyhow::Result<()> {
    if repos.is_empty() {
        println!("No repositories to fetch.");
        return Ok(());
    }
    let client = github::GitHubClient::new(settings)?;
    println!("Fetching {} repositories...", repos.len());
    let stats = fetcher::fetch_all(conn, &client, repos).await?;
    println!(
        "Done: {} fetched ({} ok, {} without README).",
        stats.total, stats.ok, stats.missing
    );
    Ok(())
}

fn build(settings: &Settings, conn: &rusqlite::Connection, repos: &[String]) -> anyhow::Result<()> {
    let (doc, skipped) = build_catalog(conn, repos)?;
    doc.write(&settings.output_path)?;
    db::record_build(
        conn,
        &db::BuildRow {
            generated_at: doc.generated_at.clone(),
            total_count: doc.total_count,
            skipped,
            output_path: settings.output_path.display().to_string(),
        },
    )?;
    println!(
        "Generated {} with {} projects ({} skipped).",
        settings.output_path.display(),
        doc.total_count,
        skipped
    );
    Ok(())
}

/// Run every snapshot through the parser, in list order. Returns the catalog
/// and the number of skipped repos.
fn build_catalog(
    conn: &rusqlite::Connection,
    repos: &[String],
) -> anyhow::Result<(CatalogDocument, usize)> {
    let mut entries = Vec::new();
    let mut skipped = 0usize;

    for repo in repos {
        info!("Processing: {}", repo);
        let outcome = match db::latest_snapshot(conn, repo)? {
            Some(db::Snapshot {
                readme: Some(readme),
                provenance,
            }) => parser::process_document(&readme, repo, &provenance),
            _ => Err(SkipReason::NotFound),
        };
        match outcome {
            Ok(entry) => {
                info!("  Added: {}", entry.title().unwrap_or(repo));
                entries.push(entry);
            }
            Err(reason) => {
                info!("  Skipping {} ({})", repo, reason);
                skipped += 1;
            }
        }
    }

    Ok((CatalogDocument::build_now(entries), skipped))
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
