//! lspmap CLI - map a source tree into a symbol knowledge graph.
//!
//! Usage:
//!   lspmap map <PATH>                 # Map PATH, write knowledge_map.json
//!   lspmap map <PATH> -o out.json     # Choose the output file
//!   lspmap map <PATH> --gitignore     # Also honour .gitignore
//!   lspmap stats [FILE]               # Counts of a written map
//!   lspmap languages                  # Configured language table

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lspmap::{map_directory, Config, KnowledgeGraph, LspMapError, DEFAULT_OUTPUT};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lspmap")]
#[command(about = "lspmap - symbol knowledge graphs from language servers", long_about = None)]
struct Cli {
    /// Verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Map a directory into a node-link JSON graph
    Map {
        /// Root directory to map
        path: PathBuf,

        /// Output file (default: from config, else knowledge_map.json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Config file (default: <PATH>/lspmap.toml if present)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Skip files ignored by .gitignore
        #[arg(long)]
        gitignore: bool,
    },

    /// Show counts for a written graph
    Stats {
        /// Graph file
        #[arg(default_value = DEFAULT_OUTPUT)]
        file: PathBuf,
    },

    /// List configured languages and their engines
    Languages {
        /// Config file (default: ./lspmap.toml if present)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Map {
            path,
            output,
            config,
            gitignore,
        } => cmd_map(&path, output, config.as_deref(), gitignore),
        Commands::Stats { file } => cmd_stats(&file),
        Commands::Languages { config } => cmd_languages(config.as_deref()),
    }
}

fn load_config(explicit: Option<&Path>, root: &Path) -> Result<Config> {
    let config = match explicit {
        Some(path) => Config::load(path),
        None => Config::discover(root),
    };
    Ok(config?)
}

fn cmd_map(root: &Path, output: Option<PathBuf>, config: Option<&Path>, gitignore: bool) -> Result<()> {
    if !root.is_dir() {
        return Err(LspMapError::InvalidRoot(root.to_path_buf()).into());
    }

    let mut config = load_config(config, root)?;
    if gitignore {
        config.respect_gitignore = true;
    }
    let output = output.unwrap_or_else(|| config.output.clone());

    eprintln!("Mapping {}...", root.display());
    let (graph, summary) = map_directory(root, config)?;
    graph
        .save(&output)
        .with_context(|| format!("writing {}", output.display()))?;

    println!("✓ Graph written to {}", output.display());
    println!("  Files:    {}", summary.files_seen);
    println!("  Engine:   {}", summary.files_by_engine);
    println!("  Fallback: {}", summary.files_by_fallback);
    println!("  Skipped:  {}", summary.files_skipped);
    println!("  Nodes:    {}", summary.nodes);
    println!("  Edges:    {}", summary.edges);
    Ok(())
}

fn cmd_stats(file: &Path) -> Result<()> {
    let graph = KnowledgeGraph::load(file)?;
    let stats = graph.stats();

    println!("{}", file.display());
    println!("  Files:   {}", stats.file_count);
    println!("  Symbols: {}", stats.symbol_count);
    println!("  Edges:   {}", stats.edge_count);
    Ok(())
}

fn cmd_languages(config: Option<&Path>) -> Result<()> {
    let config = load_config(config, Path::new("."))?;

    for (name, language) in &config.languages {
        let fallback = match language.fallback {
            Some(kind) => format!(" (fallback: {:?})", kind),
            None => String::new(),
        };
        println!(
            "{:<12} {:<28} {}{}",
            name,
            language.extensions.join(" "),
            language.command.join(" "),
            fallback
        );
    }
    Ok(())
}
