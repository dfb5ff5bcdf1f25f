//! CLI binary for vantage.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use vantage::{AppConfig, knowledge_file};
use vantage_search::{InMemoryKnowledge, KnowledgeStore, SearchOptions, SearchResponse};

/// Vantage: multi-query parallel web search.
#[derive(Parser)]
#[command(name = "vantage", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Command,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Search the web for a query.
    Search(SearchArgs),

    /// Inspect or create the configuration file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args)]
struct SearchArgs {
    /// Query text.
    #[arg(required = true, num_args = 1..)]
    query: Vec<String>,

    /// Maximum number of results to print.
    #[arg(short = 'n', long, default_value_t = 10)]
    max_results: usize,

    /// Preferred result language (e.g. `en`, `fa`).
    #[arg(short, long)]
    lang: Option<String>,

    /// Only accept sources published within this many days.
    #[arg(long)]
    fresh_days: Option<u32>,

    /// Ignore any cached answer.
    #[arg(long)]
    force_refresh: bool,

    /// Store the results in the local knowledge file.
    #[arg(long)]
    save: bool,

    /// Answer from local knowledge only.
    #[arg(long)]
    offline: bool,

    /// Print the full response as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a default configuration file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration (API key masked).
    Show,
    /// Print the configuration file path.
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries results; logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("vantage=info,vantage_search=info")),
        )
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(AppConfig::default_config_path);

    match cli.command {
        Command::Search(args) => run_search(&config_path, args).await,
        Command::Config { action } => run_config(&config_path, action),
    }
}

fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::load_or_default(path)
        .with_context(|| format!("loading {}", path.display()))?;
    config.apply_env();
    Ok(config)
}

async fn run_search(config_path: &Path, args: SearchArgs) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let knowledge_path = config.knowledge_path();
    let knowledge = Arc::new(
        knowledge_file::load(&knowledge_path)
            .with_context(|| format!("loading {}", knowledge_path.display()))?,
    );
    let engine = vantage::build_engine(&config, Arc::clone(&knowledge), args.offline)?;

    let query = args.query.join(" ");
    let options = SearchOptions {
        language: args.lang,
        freshness_days: args.fresh_days,
        max_results: args.max_results,
        force_refresh: args.force_refresh,
        // Saved below, before exit, rather than by a background task.
        save_to_knowledge_base: false,
    };
    let response = engine.search(query.as_str(), &options).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_response(&response);
    }

    if args.save && !response.offline && !response.results.is_empty() {
        save_results(&knowledge, &knowledge_path, &query, &response).await?;
    }
    Ok(())
}

async fn save_results(
    knowledge: &InMemoryKnowledge,
    path: &Path,
    query: &str,
    response: &SearchResponse,
) -> anyhow::Result<()> {
    knowledge.store_search(query, &response.results).await?;
    knowledge_file::save(path, knowledge)
        .with_context(|| format!("saving {}", path.display()))?;
    tracing::info!(
        stored = response.results.len(),
        path = %path.display(),
        "results saved to knowledge file"
    );
    Ok(())
}

fn print_response(response: &SearchResponse) {
    let source = if response.cache_hit {
        "cache"
    } else if response.offline {
        "offline"
    } else {
        "online"
    };
    println!(
        "{} result(s) for \"{}\" [{source}, {} ms]",
        response.results.len(),
        response.query,
        response.elapsed.as_millis(),
    );
    if response.failed_variants > 0 {
        println!("  ({} variant(s) failed)", response.failed_variants);
    }
    for (i, ranked) in response.results.iter().enumerate() {
        let result = &ranked.result;
        println!();
        println!("{:>2}. {} ({:.2})", i + 1, result.title, ranked.composite_score);
        println!("    {}", result.link);
        if !result.summary.is_empty() {
            println!("    {}", result.summary);
        }
        if ranked.merged_duplicate {
            println!("    found by {} variants", ranked.duplicate_count);
        }
    }
}

fn run_config(path: &Path, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                );
            }
            AppConfig::default()
                .save_to_file(path)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("wrote {}", path.display());
        }
        ConfigAction::Show => {
            let config = load_config(path)?;
            print!("{}", config.redacted().to_toml()?);
        }
        ConfigAction::Path => println!("{}", path.display()),
    }
    Ok(())
}
