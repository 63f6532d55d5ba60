//! CLI for inspecting and cleaning an IdeaLab store directory.
//!
//! Usage:
//!   idealab [--store-dir DIR] [--config FILE] scan [--items] [--json]
//!   idealab clean-orphans [--yes]
//!   idealab optimize
//!   idealab backup export --project ID [--output FILE] [--gzip] [--store]

mod format;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use idealab::{BackupDocument, LabConfig, StoreKind, Workspace};

#[derive(Parser, Debug)]
#[command(
    name = "idealab",
    about = "Inspect, clean and back up an IdeaLab project store",
    version
)]
struct Args {
    /// Store directory (overrides the config file)
    #[arg(short = 'd', long, env = "IDEALAB_STORE_DIR", global = true)]
    store_dir: Option<PathBuf>,

    /// TOML config file
    #[arg(short = 'c', long, env = "IDEALAB_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show usage per category, orphans and optimization candidates
    Scan {
        /// List every item
        #[arg(long)]
        items: bool,
        /// Print the scan report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete media no project references
    CleanOrphans {
        /// Actually delete (otherwise only list)
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Recompress large images in place
    Optimize,
    /// Delete one stored item
    Delete {
        key: String,
        /// Item lives in the key-value store
        #[arg(long)]
        kv: bool,
    },
    /// Restore a stored item (backup, state blob or snapshot) as a project
    Load {
        key: String,
        /// Item lives in the key-value store
        #[arg(long)]
        kv: bool,
    },
    /// Move the legacy whole-state blob into its own project snapshot
    Migrate,
    #[command(subcommand)]
    Backup(BackupCommand),
    #[command(subcommand)]
    Projects(ProjectsCommand),
    /// Write the Markdown production report of a project
    Report {
        id: String,
        /// Report date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum BackupCommand {
    /// Export a project as a backup document
    Export {
        #[arg(short, long)]
        project: String,
        /// Output file (defaults to the generated backup file name)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Gzip the document
        #[arg(long)]
        gzip: bool,
        /// Also keep the backup in the key-value store
        #[arg(long)]
        store: bool,
    },
    /// Import a backup file (plain or gzipped) and save it as a project
    Import { file: PathBuf },
}

#[derive(Subcommand, Debug)]
enum ProjectsCommand {
    /// List stored projects
    List,
    /// Delete a project snapshot
    Delete { id: String },
    /// Delete every project snapshot except one
    Rescue {
        #[arg(long)]
        keep: String,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => LabConfig::load(path)?,
        None => LabConfig::default(),
    };
    if let Some(dir) = &args.store_dir {
        config.store_dir = dir.clone();
    }

    let default_filter = if args.verbose { "debug" } else { config.log_filter.as_str() };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut ws = Workspace::open_dir(config).context("Failed to open store directory")?;

    match args.command {
        Command::Scan { items, json } => {
            let report = ws.refresh()?;
            if json {
                println!("{}", serde_json::to_string_pretty(report)?);
            } else {
                format::print_scan(report, items);
            }
        }

        Command::CleanOrphans { yes } => {
            let report = ws.refresh()?.clone();
            let orphans = report.orphans();
            if orphans.count == 0 {
                println!("No orphaned media.");
                return Ok(());
            }
            if !yes {
                println!("{} orphaned items ({}):", orphans.count, format::bytes(orphans.size));
                for item in report.orphan_items() {
                    println!("  {:<40} {:>10}", item.key, format::bytes(item.size));
                }
                println!("\nRe-run with --yes to delete them.");
                return Ok(());
            }
            let batch = ws.clean_orphans()?;
            format::print_batch("Orphan Cleanup", &batch, args.verbose);
            if batch.failed() > 0 {
                std::process::exit(1);
            }
        }

        Command::Optimize => {
            let candidates = ws.refresh()?.optimizable();
            if candidates.count == 0 {
                println!("Nothing to optimize.");
                return Ok(());
            }
            let pb = ProgressBar::new(candidates.count);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
                    .progress_chars("=>-"),
            );
            let batch = ws.optimize(|current, _| pb.set_position(current as u64))?;
            pb.finish_with_message("Done");
            format::print_batch("Optimization", &batch, args.verbose);
            if batch.failed() > 0 {
                std::process::exit(1);
            }
        }

        Command::Delete { key, kv } => {
            ws.delete_item(store_of(kv), &key)?;
            println!("Deleted {}", key);
        }

        Command::Load { key, kv } => {
            let state = ws.load_item(store_of(kv), &key)?.get_state()?;
            let saved = ws.save_current()?;
            println!(
                "Restored '{}' ({} cuts) from {} -> {}",
                title(&state.series_name, &state.episode_name),
                state.script.len(),
                key,
                saved
            );
        }

        Command::Migrate => match ws.migrate_legacy()? {
            Some(id) => println!("Migrated legacy project -> project-{}", id),
            None => println!("Nothing to migrate."),
        },

        Command::Backup(BackupCommand::Export {
            project,
            output,
            gzip,
            store,
        }) => {
            ws.load_project(&project)?;
            let doc = ws.export_backup()?;
            let (bytes, default_name) = if gzip {
                (doc.to_gzip()?, format!("{}.gz", doc.filename()))
            } else {
                (doc.to_json()?.into_bytes(), doc.filename())
            };
            let path = output.unwrap_or_else(|| PathBuf::from(default_name));
            std::fs::write(&path, &bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote {} ({})", path.display(), format::bytes(bytes.len() as u64));
            if store {
                let key = ws.store_backup(&doc)?;
                println!("Stored as {}", key);
            }
        }

        Command::Backup(BackupCommand::Import { file }) => {
            let raw = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let doc = BackupDocument::from_bytes(raw)?;
            let timestamp = doc.timestamp.clone();
            ws.import_backup(doc)?;
            let key = ws.save_current()?;
            println!("Imported backup from {} -> {}", timestamp, key);
        }

        Command::Projects(ProjectsCommand::List) => {
            let projects = ws.list_projects()?;
            if projects.is_empty() {
                println!("No projects.");
            }
            for p in projects {
                let updated = chrono::DateTime::from_timestamp_millis(p.updated_at)
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                println!(
                    "  {}  {:<30} {:>3} cuts  {:>10}  {}",
                    p.id,
                    title(&p.series_name, &p.episode_name),
                    p.cut_count,
                    format::bytes(p.size),
                    updated
                );
            }
        }

        Command::Projects(ProjectsCommand::Delete { id }) => {
            if !ws.delete_project(&id)? {
                anyhow::bail!("No project {}", id);
            }
            println!("Deleted project-{}", id);
        }

        Command::Projects(ProjectsCommand::Rescue { keep }) => {
            ws.load_project(&keep)?;
            let batch = ws.rescue_cleanup()?;
            format::print_batch("Rescue Cleanup", &batch, args.verbose);
        }

        Command::Report { id, date, output } => {
            let state = ws.load_project(&id)?.get_state()?;
            let date = date.unwrap_or_else(|| Utc::now().date_naive());
            let (filename, markdown) = idealab::report::production_report(&state, date);
            let path = output.join(filename);
            std::fs::write(&path, markdown)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
    }

    Ok(())
}

fn store_of(kv: bool) -> StoreKind {
    if kv {
        StoreKind::KeyValue
    } else {
        StoreKind::Structured
    }
}

fn title(series: &str, episode: &str) -> String {
    match (series.is_empty(), episode.is_empty()) {
        (false, false) => format!("{} / {}", series, episode),
        (false, true) => series.to_string(),
        (true, false) => episode.to_string(),
        (true, true) => "(untitled)".to_string(),
    }
}
