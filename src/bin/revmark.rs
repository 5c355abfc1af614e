//! revmark CLI
//!
//! Loads a TOML changelog, adds audit revisions and writes the SQL an update
//! or rollback would run.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use tracing_subscriber::EnvFilter;

use revmark::config::RevmarkConfig;
use revmark::filter::RuntimeEnvironment;
use revmark::history::JsonFileHistory;
use revmark::parser::expression::Expression;
use revmark::runner::OfflineRunner;
use revmark::{Changelog, ChangelogLoader, RevisionLoader, TomlChangelogLoader};

#[derive(Parser)]
#[command(name = "revmark", version, about = "Audit revision markers for tagged changelogs")]
struct Cli {
    /// Config file (default: ./revmark.toml, then the user config dir)
    #[arg(long, global = true, env = "REVMARK_CONFIG")]
    config: Option<PathBuf>,

    /// Active contexts, comma separated
    #[arg(long, global = true)]
    contexts: Option<String>,

    /// Label expression
    #[arg(long, global = true)]
    labels: Option<String>,

    /// Target database product
    #[arg(long, global = true)]
    dbms: Option<String>,

    /// History file
    #[arg(long, global = true)]
    history: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the SQL an update would run and record it in the history
    UpdateSql {
        changelog: PathBuf,
        /// Write SQL here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write the SQL rolling back the most recent change sets
    RollbackSql {
        changelog: PathBuf,
        #[arg(short, long, default_value_t = 1)]
        count: usize,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show which change sets the next update would consider
    Status { changelog: PathBuf },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("revmark=info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = RevmarkConfig::resolve(cli.config.as_deref()).context("Failed to load config")?;
    let env = environment(&cli, &config)?;
    let history_path = cli.history.clone().unwrap_or_else(|| config.history.path.clone());

    match &cli.command {
        Commands::UpdateSql { changelog, output } => {
            let changelog = load(changelog)?;
            let history = open_history(&history_path)?;
            let mut runner = OfflineRunner::new(env, history, sink(output.as_deref())?);
            let summary = runner.update(&changelog).context("Update failed")?;
            eprintln!(
                "{} {} change set(s) written, {} revision(s) held back, {} filtered",
                "✓".green(),
                summary.executed.len(),
                summary.skipped.len(),
                summary.filtered
            );
        }
        Commands::RollbackSql {
            changelog,
            count,
            output,
        } => {
            let changelog = load(changelog)?;
            let history = open_history(&history_path)?;
            let mut runner = OfflineRunner::new(env, history, sink(output.as_deref())?);
            let summary = runner.rollback(&changelog, *count).context("Rollback failed")?;
            if summary.rolled_back.is_empty() {
                eprintln!("{}", "No change sets to roll back.".green());
            } else {
                eprintln!(
                    "{} {} change set(s) rolled back",
                    "✓".green(),
                    summary.rolled_back.len()
                );
            }
        }
        Commands::Status { changelog } => {
            let changelog = load(changelog)?;
            let history = open_history(&history_path)?;
            let runner = OfflineRunner::new(env, history, io::sink());
            print_status(&runner, &changelog)?;
        }
    }
    Ok(())
}

fn environment(cli: &Cli, config: &RevmarkConfig) -> Result<RuntimeEnvironment> {
    let mut config = config.clone();
    if let Some(dbms) = &cli.dbms {
        config.runtime.dbms = dbms.clone();
    }
    if let Some(contexts) = &cli.contexts {
        config.runtime.contexts = contexts.split(',').map(str::to_string).collect();
    }
    let mut env = config.environment().context("Invalid runtime configuration")?;
    if let Some(labels) = &cli.labels {
        env.labels = Expression::parse_optional(labels).context("Invalid --labels expression")?;
    }
    Ok(env)
}

fn load(path: &Path) -> Result<Changelog> {
    let root = path.parent().unwrap_or_else(|| Path::new(""));
    let file = path.file_name().map(Path::new).unwrap_or(path);
    let loader = RevisionLoader::new(TomlChangelogLoader::new(root));
    loader
        .load(file)
        .with_context(|| format!("Failed to load changelog {}", path.display()))
}

fn open_history(path: &Path) -> Result<JsonFileHistory> {
    JsonFileHistory::open(path)
        .with_context(|| format!("Failed to open history {}", path.display()))
}

fn sink(output: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    })
}

fn print_status<W: Write>(
    runner: &OfflineRunner<JsonFileHistory, W>,
    changelog: &Changelog,
) -> Result<()> {
    println!("{}", "📋 Changelog Status".cyan().bold());
    println!("  Changelog: {}", changelog.physical_path.yellow());
    println!("  History: {}", runner.history().path().display().to_string().yellow());
    println!();

    let entries = runner.status(changelog).context("Failed to evaluate filters")?;
    let pending = entries.iter().filter(|e| e.rejected_by.is_none()).count();
    for entry in &entries {
        let marker = if entry.is_revision { " (revision)".dimmed() } else { "".normal() };
        match &entry.rejected_by {
            None => println!("  {} {}{}", "○".green(), entry.key, marker),
            Some((filter, reason)) => println!(
                "  {} {}{} {}",
                "•".dimmed(),
                entry.key.to_string().dimmed(),
                marker,
                format!("[{}: {}]", filter, reason).dimmed()
            ),
        }
    }
    println!();
    println!("  {} change set(s) pending", pending.to_string().cyan());
    Ok(())
}
